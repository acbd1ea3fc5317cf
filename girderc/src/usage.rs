//! Resource usage linking: finds call sites referencing bound resources,
//! classifies them and builds the endpoint call graph.

use crate::app::AppDesc;

use girder_diag::srcloc::{LocKind, SrcFile, SrcLocation};
use girder_diag::{DiagList, ErrInSrc, ErrTemplate};

use petgraph::graph::{DiGraph, NodeIndex};

use std::collections::HashMap;
use std::sync::Arc;

use syn::spanned::Spanned;
use syn::visit::Visit;

pub const ERR_CROSS_SERVICE_SUBSCRIPTION: ErrTemplate = ErrTemplate {
    code: 3201,
    title: "cross-service subscription reference",
    summary: "subscriptions may only be referenced from their own service",
    detail: None,
    internal: false,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UsageKind {
    EndpointCall,
    TopicPublish,
    SubscriptionRef,
}

/// One reference the generator must rewrite.
#[derive(Clone, Debug)]
pub struct Usage {
    pub kind: UsageKind,
    /// The referenced bind's declared name.
    pub bind_name: String,
    /// Service owning the referenced resource.
    pub resource_service: Option<String>,
    /// Service containing the referencing file.
    pub user_service: Option<String>,
    pub loc: SrcLocation,
}

/// Usages plus the service call graph derived from endpoint calls.
#[derive(Debug, Default)]
pub struct UsageMap {
    pub usages: Vec<Usage>,
    pub call_graph: DiGraph<String, ()>,
}

impl UsageMap {
    /// Services called by `service`, in stable node order.
    pub fn callees(&self, service: &str) -> Vec<&str> {
        let from = match self.node(service) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        let mut out: Vec<&str> = self
            .call_graph
            .neighbors(from)
            .map(|idx| self.call_graph[idx].as_str())
            .collect();
        out.sort_unstable();
        out
    }

    fn node(&self, service: &str) -> Option<NodeIndex> {
        self.call_graph
            .node_indices()
            .find(|&idx| self.call_graph[idx] == service)
    }
}

/// Walks every file and collects references to the descriptor's binds.
pub fn link(
    desc: &AppDesc,
    files: &[(Arc<SrcFile>, syn::File)],
    errs: &mut DiagList,
) -> UsageMap {
    // Resolution is by identifier; binds are package-level declarations
    // and the framework requires their names to be unique app-wide.
    let mut endpoints: HashMap<&str, &str> = HashMap::new();
    for (svc, ep) in desc.endpoints() {
        endpoints.insert(ep.name.as_str(), svc.name.as_str());
    }
    let mut topics: HashMap<&str, Option<&str>> = HashMap::new();
    for topic in &desc.topics {
        topics.insert(topic.bind_name.as_str(), topic.service.as_deref());
    }
    let mut subs: HashMap<&str, Option<&str>> = HashMap::new();
    for sub in &desc.subscriptions {
        subs.insert(sub.handler.as_str(), sub.service.as_deref());
    }

    let mut map = UsageMap::default();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
    for svc in &desc.services {
        let idx = map.call_graph.add_node(svc.name.clone());
        nodes.insert(svc.name.clone(), idx);
    }

    for (file, ast) in files {
        let user_service = desc
            .service_for_path(&file.rel_path)
            .map(|svc| svc.name.clone());
        let mut visitor = RefVisitor {
            file,
            user_service: user_service.as_deref(),
            endpoints: &endpoints,
            topics: &topics,
            subs: &subs,
            usages: &mut map.usages,
            edges: Vec::new(),
            errs,
        };
        visitor.visit_file(ast);
        let edges = visitor.edges;
        for (from, to) in edges {
            if let (Some(&a), Some(&b)) = (nodes.get(&from), nodes.get(&to))
            {
                if map.call_graph.find_edge(a, b).is_none() {
                    map.call_graph.add_edge(a, b, ());
                }
            }
        }
    }

    map
}

struct RefVisitor<'a> {
    file: &'a Arc<SrcFile>,
    user_service: Option<&'a str>,
    endpoints: &'a HashMap<&'a str, &'a str>,
    topics: &'a HashMap<&'a str, Option<&'a str>>,
    subs: &'a HashMap<&'a str, Option<&'a str>>,
    usages: &'a mut Vec<Usage>,
    edges: Vec<(String, String)>,
    errs: &'a mut DiagList,
}

impl<'a> RefVisitor<'a> {
    fn loc(&self, span: proc_macro2::Span) -> SrcLocation {
        SrcLocation::from_span(self.file, span, LocKind::Error, None)
    }

    fn record(
        &mut self,
        kind: UsageKind,
        bind_name: &str,
        resource_service: Option<&str>,
        span: proc_macro2::Span,
    ) {
        self.usages.push(Usage {
            kind,
            bind_name: bind_name.to_string(),
            resource_service: resource_service.map(String::from),
            user_service: self.user_service.map(String::from),
            loc: self.loc(span),
        });
    }
}

fn path_ident(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Path(p) => {
            p.path.segments.last().map(|seg| seg.ident.to_string())
        }
        _ => None,
    }
}

impl<'a, 'ast> Visit<'ast> for RefVisitor<'a> {
    fn visit_expr(&mut self, expr: &'ast syn::Expr) {
        match expr {
            syn::Expr::Call(call) => {
                if let Some(ident) = path_ident(&call.func) {
                    if let Some(&svc) = self.endpoints.get(ident.as_str()) {
                        self.record(
                            UsageKind::EndpointCall,
                            &ident,
                            Some(svc),
                            expr.span(),
                        );
                        if let Some(user) = self.user_service {
                            if user != svc {
                                self.edges.push((
                                    user.to_string(),
                                    svc.to_string(),
                                ));
                            }
                        }
                        // Walk the arguments; the callee is consumed.
                        for arg in &call.args {
                            self.visit_expr(arg);
                        }
                        return;
                    }
                }
            }
            syn::Expr::MethodCall(mc) => {
                if mc.method == "publish" {
                    if let Some(ident) = path_ident(&mc.receiver) {
                        if let Some(&svc) = self.topics.get(ident.as_str()) {
                            self.record(
                                UsageKind::TopicPublish,
                                &ident,
                                svc,
                                expr.span(),
                            );
                            for arg in &mc.args {
                                self.visit_expr(arg);
                            }
                            return;
                        }
                    }
                }
            }
            syn::Expr::Path(_) => {
                if let Some(ident) = path_ident(expr) {
                    if let Some(&svc) = self.subs.get(ident.as_str()) {
                        self.record(
                            UsageKind::SubscriptionRef,
                            &ident,
                            svc,
                            expr.span(),
                        );
                        if svc.is_some() && self.user_service != svc {
                            self.errs.push(
                                ErrInSrc::new(
                                    &ERR_CROSS_SERVICE_SUBSCRIPTION,
                                )
                                .summary(format!(
                                    "subscription handler '{}' belongs to \
                                     service '{}'",
                                    ident,
                                    svc.unwrap_or_default()
                                ))
                                .at(self.loc(expr.span())),
                            );
                        }
                        return;
                    }
                }
            }
            _ => {}
        }
        syn::visit::visit_expr(self, expr);
    }
}

#[cfg(test)]
mod usage_tests {
    use super::*;

    use crate::app::Service;
    use crate::directive::SelectorSet;
    use crate::resources::{Access, Endpoint, Topic};
    use crate::respath::{self, Method};
    use girder_diag::srcloc::Pos;
    use std::path::PathBuf;

    use rstest::*;

    fn dummy_loc(file: &Arc<SrcFile>) -> SrcLocation {
        SrcLocation {
            file: Arc::clone(file),
            start: Pos::new(1, 1),
            end: Pos::new(1, 2),
            kind: LocKind::Error,
            text: None,
        }
    }

    fn desc() -> AppDesc {
        let blog_file = SrcFile::new("blog/api.rs", "/app/blog/api.rs", "");
        let ep = Endpoint {
            name: String::from("get_post"),
            service: String::from("blog"),
            access: Access::Public,
            raw: false,
            path: respath::parse("/blog/:id").unwrap(),
            methods: vec![Method::Get],
            tags: SelectorSet::new(),
            request: None,
            response: None,
            recv: None,
            doc: String::new(),
            file: Arc::clone(&blog_file),
            name_loc: dummy_loc(&blog_file),
            line: 1,
        };
        let topic = Topic {
            name: String::from("signups"),
            bind_name: String::from("SIGNUPS"),
            message_type: String::from("SignupEvent"),
            service: Some(String::from("user")),
            doc: String::new(),
            file: Arc::clone(&blog_file),
            name_loc: dummy_loc(&blog_file),
            line: 2,
        };
        AppDesc {
            services: vec![
                Service {
                    name: String::from("blog"),
                    fs_root: PathBuf::from("blog"),
                    num: 1,
                    endpoints: vec![ep],
                    middleware: vec![],
                    service_struct: None,
                },
                Service {
                    name: String::from("user"),
                    fs_root: PathBuf::from("user"),
                    num: 2,
                    endpoints: vec![],
                    middleware: vec![],
                    service_struct: None,
                },
            ],
            topics: vec![topic],
            ..Default::default()
        }
    }

    fn parse_file(rel: &str, src: &str) -> (Arc<SrcFile>, syn::File) {
        let file = SrcFile::new(rel, format!("/app/{}", rel), src);
        let ast = syn::parse_file(src).unwrap();
        (file, ast)
    }

    #[rstest]
    fn endpoint_calls_build_the_call_graph() {
        let desc = desc();
        let files = vec![parse_file(
            "user/signup.rs",
            "fn signup(ctx: Context) {\n\
                 let post = get_post(ctx, 7);\n\
             }\n",
        )];
        let mut errs = DiagList::new();
        let map = link(&desc, &files, &mut errs);

        assert!(errs.is_empty());
        assert_eq!(map.usages.len(), 1);
        let usage = &map.usages[0];
        assert_eq!(usage.kind, UsageKind::EndpointCall);
        assert_eq!(usage.bind_name, "get_post");
        assert_eq!(usage.user_service.as_deref(), Some("user"));
        assert_eq!(usage.resource_service.as_deref(), Some("blog"));
        assert_eq!(map.callees("user"), vec!["blog"]);
        assert!(map.callees("blog").is_empty());
    }

    #[rstest]
    fn topic_publishes_are_classified() {
        let desc = desc();
        let files = vec![parse_file(
            "user/signup.rs",
            "fn notify() {\n\
                 SIGNUPS.publish(SignupEvent { id: 1 });\n\
             }\n",
        )];
        let mut errs = DiagList::new();
        let map = link(&desc, &files, &mut errs);

        assert_eq!(map.usages.len(), 1);
        assert_eq!(map.usages[0].kind, UsageKind::TopicPublish);
        assert_eq!(map.usages[0].bind_name, "SIGNUPS");
    }

    #[rstest]
    fn unrelated_code_produces_no_usages() {
        let desc = desc();
        let files = vec![parse_file(
            "blog/other.rs",
            "fn helper() -> u32 { other_call(3) + 4 }\n",
        )];
        let mut errs = DiagList::new();
        let map = link(&desc, &files, &mut errs);
        assert!(map.usages.is_empty());
    }
}
