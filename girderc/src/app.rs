//! The application descriptor: services discovered from the filesystem,
//! their endpoints and middleware, and the app-wide framework pieces.

pub mod discover;
pub mod validate;

use crate::resources::{
    AuthHandler, AuthParam, Endpoint, Middleware, ServiceStruct,
    Subscription, Topic,
};
use crate::respath::Segment;

use girder_serde::{
    AccessKind, AppMeta, AuthHandlerMeta, EndpointMeta, GatewayMeta,
    MiddlewareMeta, PathMeta, SegmentKind, SegmentMeta, ServiceMeta,
    SubscriptionMeta, TopicMeta,
};

use std::path::{Path, PathBuf};

/// The name given to the gateway created when an auth handler exists.
pub const DEFAULT_GATEWAY_NAME: &str = "api-gateway";

/// A filesystem-rooted deployable unit.
#[derive(Clone, Debug)]
pub struct Service {
    pub name: String,
    /// Root directory, relative to the application root.
    pub fs_root: PathBuf,
    /// 1-based, assigned in lexicographic `fs_root` order.
    pub num: u32,
    pub endpoints: Vec<Endpoint>,
    pub middleware: Vec<Middleware>,
    pub service_struct: Option<ServiceStruct>,
}

#[derive(Clone, Debug)]
pub struct Gateway {
    pub name: String,
    pub has_auth: bool,
}

/// Everything the compiler knows about the application.
#[derive(Clone, Debug, Default)]
pub struct AppDesc {
    pub services: Vec<Service>,
    pub gateways: Vec<Gateway>,
    pub global_middleware: Vec<Middleware>,
    pub auth_handler: Option<AuthHandler>,
    pub topics: Vec<Topic>,
    pub subscriptions: Vec<Subscription>,
}

impl AppDesc {
    /// All endpoints with their services, in service order.
    pub fn endpoints(&self) -> impl Iterator<Item = (&Service, &Endpoint)> {
        self.services
            .iter()
            .flat_map(|svc| svc.endpoints.iter().map(move |ep| (svc, ep)))
    }

    /// The middleware applying to an endpoint: global middleware first,
    /// then the enclosing service's, each in declaration order.
    pub fn matching_middleware<'a>(
        &'a self,
        service: &'a Service,
        ep: &Endpoint,
    ) -> Vec<&'a Middleware> {
        self.global_middleware
            .iter()
            .chain(service.middleware.iter())
            .filter(|mw| mw.target.selects(&ep.tags))
            .collect()
    }

    /// The service owning a file path, by longest `fs_root` prefix.
    pub fn service_for_path(&self, rel_path: &Path) -> Option<&Service> {
        self.services
            .iter()
            .filter(|svc| rel_path.starts_with(&svc.fs_root))
            .max_by_key(|svc| svc.fs_root.components().count())
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|svc| svc.name == name)
    }

    /// The serializable form emitted by `girderc meta`.
    pub fn to_meta(&self) -> AppMeta {
        AppMeta {
            overlays: Vec::new(),
            services: self.services.iter().map(service_meta).collect(),
            gateways: self
                .gateways
                .iter()
                .map(|g| GatewayMeta {
                    name: g.name.clone(),
                    has_auth: g.has_auth,
                })
                .collect(),
            global_middleware: self
                .global_middleware
                .iter()
                .map(middleware_meta)
                .collect(),
            auth_handler: self.auth_handler.as_ref().map(|auth| {
                AuthHandlerMeta {
                    name: auth.name.clone(),
                    service: auth.service.clone(),
                    token_param: auth.param == AuthParam::Token,
                }
            }),
            topics: self
                .topics
                .iter()
                .map(|t| TopicMeta {
                    name: t.name.clone(),
                    service: t.service.clone().unwrap_or_default(),
                    message_type: t.message_type.clone(),
                })
                .collect(),
            subscriptions: self
                .subscriptions
                .iter()
                .map(|s| SubscriptionMeta {
                    name: s.name.clone(),
                    topic: s.topic.clone(),
                    service: s.service.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

fn service_meta(svc: &Service) -> ServiceMeta {
    ServiceMeta {
        name: svc.name.clone(),
        root: svc.fs_root.display().to_string(),
        num: svc.num,
        endpoints: svc.endpoints.iter().map(endpoint_meta).collect(),
        middleware: svc.middleware.iter().map(middleware_meta).collect(),
        service_struct: svc.service_struct.as_ref().map(|s| s.name.clone()),
    }
}

fn endpoint_meta(ep: &Endpoint) -> EndpointMeta {
    EndpointMeta {
        name: ep.name.clone(),
        service: ep.service.clone(),
        access: match ep.access {
            crate::resources::Access::Public => AccessKind::Public,
            crate::resources::Access::Auth => AccessKind::Auth,
            crate::resources::Access::Private => AccessKind::Private,
        },
        raw: ep.raw,
        path: path_meta(&ep.path),
        methods: ep.methods.iter().map(|m| m.to_string()).collect(),
        tags: ep
            .tags
            .iter()
            .map(|sel| sel.to_string())
            .collect(),
        doc: ep.doc.clone(),
    }
}

fn path_meta(path: &crate::respath::Path) -> PathMeta {
    PathMeta {
        segments: path
            .segments
            .iter()
            .map(|seg| match seg {
                Segment::Literal(lit) => SegmentMeta {
                    kind: SegmentKind::Literal,
                    value: lit.clone(),
                    value_type: None,
                },
                Segment::Param { name, typ } => SegmentMeta {
                    kind: SegmentKind::Param,
                    value: name.clone(),
                    value_type: Some(typ.to_string()),
                },
                Segment::Wildcard { name } => SegmentMeta {
                    kind: SegmentKind::Wildcard,
                    value: name.clone(),
                    value_type: None,
                },
                Segment::Fallback { name } => SegmentMeta {
                    kind: SegmentKind::Fallback,
                    value: name.clone(),
                    value_type: None,
                },
            })
            .collect(),
    }
}

fn middleware_meta(mw: &Middleware) -> MiddlewareMeta {
    MiddlewareMeta {
        name: mw.name.clone(),
        global: mw.global,
        service: mw.service.clone(),
        target: mw.target.iter().map(|sel| sel.to_string()).collect(),
    }
}

#[cfg(test)]
mod app_tests {
    use super::*;

    use crate::directive::{Selector, SelectorSet};
    use crate::respath;
    use girder_diag::srcloc::{LocKind, Pos, SrcFile, SrcLocation};
    use rstest::*;

    fn dummy_loc() -> SrcLocation {
        SrcLocation {
            file: SrcFile::new("x.rs", "/x.rs", ""),
            start: Pos::new(1, 1),
            end: Pos::new(1, 2),
            kind: LocKind::Error,
            text: None,
        }
    }

    fn endpoint(name: &str, tags: &[&str]) -> Endpoint {
        let mut set = SelectorSet::new();
        for tag in tags {
            set.add(Selector::Tag((*tag).to_string()));
        }
        Endpoint {
            name: name.to_string(),
            service: String::from("blog"),
            access: crate::resources::Access::Public,
            raw: false,
            path: respath::parse(&format!("/{}", name)).unwrap(),
            methods: vec![crate::respath::Method::Get],
            tags: set,
            request: None,
            response: None,
            recv: None,
            doc: String::new(),
            file: SrcFile::new("x.rs", "/x.rs", ""),
            name_loc: dummy_loc(),
            line: 1,
        }
    }

    fn middleware(name: &str, global: bool, target: &[&str]) -> Middleware {
        let mut set = SelectorSet::new();
        for sel in target {
            if *sel == "all" {
                set.add(Selector::All);
            } else {
                set.add(Selector::Tag((*sel).to_string()));
            }
        }
        Middleware {
            name: name.to_string(),
            global,
            target: set,
            recv: None,
            service: None,
            doc: String::new(),
            file: SrcFile::new("x.rs", "/x.rs", ""),
            name_loc: dummy_loc(),
            line: 1,
        }
    }

    fn service(name: &str, root: &str, num: u32) -> Service {
        Service {
            name: name.to_string(),
            fs_root: PathBuf::from(root),
            num,
            endpoints: vec![],
            middleware: vec![],
            service_struct: None,
        }
    }

    #[rstest]
    fn middleware_matches_global_then_service_order() {
        let mut svc = service("blog", "blog", 1);
        svc.middleware.push(middleware("svc_cache", false, &["cache"]));
        svc.middleware.push(middleware("svc_all", false, &["all"]));
        let desc = AppDesc {
            services: vec![svc],
            global_middleware: vec![middleware("global_all", true, &["all"])],
            ..Default::default()
        };

        let ep = endpoint("list", &["cache"]);
        let names: Vec<&str> = desc
            .matching_middleware(&desc.services[0], &ep)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["global_all", "svc_cache", "svc_all"]);

        let untagged = endpoint("other", &[]);
        let names: Vec<&str> = desc
            .matching_middleware(&desc.services[0], &untagged)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["global_all", "svc_all"]);
    }

    #[rstest]
    fn service_lookup_uses_longest_prefix() {
        let desc = AppDesc {
            services: vec![
                service("root", "", 1),
                service("blog", "blog", 2),
            ],
            ..Default::default()
        };
        assert_eq!(
            desc.service_for_path(Path::new("blog/api.rs")).unwrap().name,
            "blog"
        );
        assert_eq!(
            desc.service_for_path(Path::new("other/x.rs")).unwrap().name,
            "root"
        );
    }

    #[rstest]
    fn meta_reflects_path_parameter_types() {
        let mut ep = endpoint("get", &[]);
        ep.path = respath::parse("/blog/:id/*rest").unwrap();
        ep.path
            .set_param_types(&[crate::respath::ParamType::Uint64]);
        let meta = endpoint_meta(&ep);
        assert_eq!(meta.path.segments[1].kind, SegmentKind::Param);
        assert_eq!(
            meta.path.segments[1].value_type.as_deref(),
            Some("uint64")
        );
        assert_eq!(meta.path.segments[2].kind, SegmentKind::Wildcard);
        assert!(meta.path.segments[2].value_type.is_none());
    }
}
