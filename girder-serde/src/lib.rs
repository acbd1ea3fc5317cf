//! girder-serde
//! ========
//!
//! This crate provides definitions to serialize compiler diagnostics and
//! the computed application metadata.

#![forbid(unsafe_code)]

mod diagnostic;
mod meta;

pub use diagnostic::{
    DiagnosticParams, DiagnosticWire, LocationKind, StackFrame, WireLocation,
};
pub use meta::{
    AccessKind, AppMeta, AuthHandlerMeta, EndpointMeta, GatewayMeta,
    MiddlewareMeta, OverlayMeta, PathMeta, SegmentMeta, SegmentKind,
    ServiceMeta, SubscriptionMeta, TopicMeta,
};
