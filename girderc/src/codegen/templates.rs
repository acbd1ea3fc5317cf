//! The pluggable code templates. Render back-ends are interchangeable;
//! the default renders registration glue against the girder runtime.

use crate::app::{AppDesc, Service};
use crate::resources::{AuthHandler, AuthParam, Endpoint};

/// A render back-end: pure functions from the descriptor to code
/// fragments.
pub trait Templates {
    fn service_init(&self, desc: &AppDesc, svc: &Service) -> String;
    fn endpoint_glue(
        &self,
        desc: &AppDesc,
        svc: &Service,
        ep: &Endpoint,
    ) -> String;
    fn auth_glue(&self, desc: &AppDesc, auth: &AuthHandler) -> String;
    fn main_entry(&self, desc: &AppDesc) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTemplates;

impl Templates for DefaultTemplates {
    fn service_init(&self, _desc: &AppDesc, svc: &Service) -> String {
        let mut out = format!(
            "pub fn __girder_service() -> ::girder::runtime::ServiceDesc {{\n\
             \x20   ::girder::runtime::ServiceDesc {{\n\
             \x20       name: {name:?},\n\
             \x20       num: {num},\n",
            name = svc.name,
            num = svc.num,
        );
        match svc.service_struct.as_ref().and_then(|s| s.init_fn.as_ref()) {
            Some(init) => out.push_str(&format!(
                "        init: Some(|| {init}().map(Box::new)),\n",
                init = init
            )),
            None => out.push_str("        init: None,\n"),
        }
        out.push_str("    }\n}\n\n");
        out
    }

    fn endpoint_glue(
        &self,
        desc: &AppDesc,
        svc: &Service,
        ep: &Endpoint,
    ) -> String {
        let methods: Vec<String> = ep
            .methods
            .iter()
            .map(|m| format!("{:?}", m.to_string()))
            .collect();
        let middleware: Vec<String> = desc
            .matching_middleware(svc, ep)
            .iter()
            .map(|mw| format!("{:?}", mw.name))
            .collect();
        let handler = match &ep.recv {
            Some(recv) => format!("{}::{}", recv, ep.name),
            None => ep.name.clone(),
        };
        format!(
            "::girder::runtime::register_endpoint(\
             ::girder::runtime::EndpointDesc {{\n\
             \x20   service: {service:?},\n\
             \x20   name: {name:?},\n\
             \x20   path: {path:?},\n\
             \x20   methods: &[{methods}],\n\
             \x20   raw: {raw},\n\
             \x20   access: {access:?},\n\
             \x20   middleware: &[{middleware}],\n\
             \x20   handler: ::girder::runtime::handler!({handler}),\n\
             }});\n\n",
            service = ep.service,
            name = ep.name,
            path = ep.path.to_string(),
            methods = methods.join(", "),
            raw = ep.raw,
            access = ep.access.to_string(),
            middleware = middleware.join(", "),
            handler = handler,
        )
    }

    fn auth_glue(&self, _desc: &AppDesc, auth: &AuthHandler) -> String {
        let kind = match auth.param {
            AuthParam::Token => "Token",
            AuthParam::Struct(_) => "Params",
        };
        format!(
            "::girder::runtime::register_auth_handler(\
             ::girder::runtime::AuthDesc {{\n\
             \x20   name: {name:?},\n\
             \x20   service: {service:?},\n\
             \x20   kind: ::girder::runtime::AuthKind::{kind},\n\
             \x20   handler: ::girder::runtime::auth_handler!({name}),\n\
             }});\n\n",
            name = auth.name,
            service = auth.service,
            kind = kind,
        )
    }

    fn main_entry(&self, desc: &AppDesc) -> String {
        let mut out = String::from(
            "fn main() -> ::girder::runtime::Result<()> {\n\
             \x20   let mut app = ::girder::runtime::App::new();\n",
        );
        for svc in &desc.services {
            out.push_str(&format!(
                "    app.add_service({name:?});\n",
                name = svc.name
            ));
        }
        for gw in &desc.gateways {
            out.push_str(&format!(
                "    app.add_gateway({name:?});\n",
                name = gw.name
            ));
        }
        out.push_str("    app.serve()\n}\n");
        out
    }
}
