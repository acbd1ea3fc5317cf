//! Per-directive resource parsers. Each parser consumes one validated
//! directive plus the declaration it is attached to, and produces a
//! typed resource or diagnostics.

pub mod auth_handler;
pub mod endpoint;
pub mod middleware;
pub mod pubsub;
pub mod service_struct;

pub use auth_handler::{AuthHandler, AuthParam};
pub use endpoint::{Access, Endpoint};
pub use middleware::Middleware;
pub use pubsub::{Subscription, Topic};
pub use service_struct::ServiceStruct;

use girder_diag::srcloc::{SrcFile, SrcLocation};
use girder_diag::DiagList;

use std::sync::Arc;

/// A typed resource created by one directive.
#[derive(Clone, Debug)]
pub enum Resource {
    Endpoint(Endpoint),
    Middleware(Middleware),
    AuthHandler(AuthHandler),
    ServiceStruct(ServiceStruct),
    Topic(Topic),
    Subscription(Subscription),
}

impl Resource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Resource::Endpoint(_) => "endpoint",
            Resource::Middleware(_) => "middleware",
            Resource::AuthHandler(_) => "auth handler",
            Resource::ServiceStruct(_) => "service struct",
            Resource::Topic(_) => "topic",
            Resource::Subscription(_) => "subscription",
        }
    }
}

/// A package-level declaration binding a resource to a name.
#[derive(Clone, Debug)]
pub struct Bind {
    /// The declared identifier (function, type or static name).
    pub name: String,
    pub resource: Resource,
    pub file: Arc<SrcFile>,
    pub loc: SrcLocation,
    pub line: u32,
}

/// Shared state handed to every resource parser.
pub struct ParseCtx<'a> {
    pub file: &'a Arc<SrcFile>,
    /// The package (directory) name, used for defaults.
    pub pkg: &'a str,
    pub errs: &'a mut DiagList,
}
