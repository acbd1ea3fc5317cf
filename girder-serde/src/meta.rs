use serde::{Deserialize, Serialize};

/// Who may call an endpoint.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Public,
    Auth,
    Private,
}

/// Kind of a single path segment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Literal,
    Param,
    Wildcard,
    Fallback,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SegmentMeta {
    pub kind: SegmentKind,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PathMeta {
    pub segments: Vec<SegmentMeta>,
}

/// A registered API endpoint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EndpointMeta {
    pub name: String,
    pub service: String,
    pub access: AccessKind,
    pub raw: bool,
    pub path: PathMeta,
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub doc: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MiddlewareMeta {
    pub name: String,
    pub global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub target: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthHandlerMeta {
    pub name: String,
    pub service: String,
    /// `true` for the legacy bearer-token form taking a plain string.
    pub token_param: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GatewayMeta {
    pub name: String,
    pub has_auth: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TopicMeta {
    pub name: String,
    pub service: String,
    pub message_type: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SubscriptionMeta {
    pub name: String,
    pub topic: String,
    pub service: String,
}

/// One service of the application, rooted in the filesystem.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ServiceMeta {
    pub name: String,
    pub root: String,
    pub num: u32,
    pub endpoints: Vec<EndpointMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub middleware: Vec<MiddlewareMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_struct: Option<String>,
}

/// A generated file emitted by the compiler.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OverlayMeta {
    pub source_path: String,
    pub bytes: usize,
}

/// The full application description, as emitted by `girderc meta`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppMeta {
    pub services: Vec<ServiceMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub gateways: Vec<GatewayMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub global_middleware: Vec<MiddlewareMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_handler: Option<AuthHandlerMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub topics: Vec<TopicMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subscriptions: Vec<SubscriptionMeta>,
    /// The generated files a compile of this application produces.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub overlays: Vec<OverlayMeta>,
}

#[cfg(test)]
mod meta_tests {
    use super::*;

    fn endpoint() -> EndpointMeta {
        EndpointMeta {
            name: "List".into(),
            service: "blog".into(),
            access: AccessKind::Public,
            raw: false,
            path: PathMeta {
                segments: vec![SegmentMeta {
                    kind: SegmentKind::Literal,
                    value: "blog".into(),
                    value_type: None,
                }],
            },
            methods: vec!["GET".into()],
            tags: vec![],
            doc: String::new(),
        }
    }

    #[test]
    fn empty_collections_are_omitted() {
        let meta = AppMeta {
            services: vec![ServiceMeta {
                name: "blog".into(),
                root: "blog".into(),
                num: 1,
                endpoints: vec![endpoint()],
                middleware: vec![],
                service_struct: None,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("gateways").is_none());
        assert!(json.get("auth_handler").is_none());
        let svc = &json["services"][0];
        assert!(svc.get("middleware").is_none());
        assert_eq!(svc["endpoints"][0]["access"], "public");
    }

    #[test]
    fn meta_round_trips() {
        let meta = AppMeta {
            services: vec![],
            gateways: vec![GatewayMeta {
                name: "api-gateway".into(),
                has_auth: true,
            }],
            global_middleware: vec![],
            auth_handler: Some(AuthHandlerMeta {
                name: "auth".into(),
                service: "user".into(),
                token_param: true,
            }),
            topics: vec![],
            subscriptions: vec![],
            overlays: vec![OverlayMeta {
                source_path: "blog/girder_gen_api.rs".into(),
                bytes: 512,
            }],
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: AppMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
