//! Errors carrying structured metadata, merged along the cause chain.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde_json::Value;

/// Chain walks stop after this many unwraps; cyclic cause chains exist
/// in the wild and must not hang recovery.
const MAX_CHAIN_WALK: usize = 100;

pub type Meta = BTreeMap<String, Value>;

/// An error annotated with the module that raised it and a metadata map.
#[derive(Debug)]
pub struct MetaError {
    module: &'static str,
    msg: String,
    meta: Meta,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl MetaError {
    pub fn new(module: &'static str, msg: impl Into<String>, meta: Meta) -> Self {
        MetaError {
            module,
            msg: msg.into(),
            meta,
            cause: None,
        }
    }

    pub fn wrap(
        cause: impl Error + Send + Sync + 'static,
        module: &'static str,
        msg: impl Into<String>,
        meta: Meta,
    ) -> Self {
        MetaError {
            module,
            msg: msg.into(),
            meta,
            cause: Some(Box::new(cause)),
        }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.module, self.msg)
    }
}

impl Error for MetaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn Error + 'static))
    }
}

/// Collects metadata from every `MetaError` in the chain. Keys written by
/// shallower (outer) errors win over deeper ones; the walk is bounded.
pub fn meta_from(err: &(dyn Error + 'static)) -> Meta {
    let mut merged = Meta::new();
    let mut current: Option<&(dyn Error + 'static)> = Some(err);
    for _ in 0..MAX_CHAIN_WALK {
        let e = match current {
            Some(e) => e,
            None => break,
        };
        if let Some(me) = e.downcast_ref::<MetaError>() {
            for (k, v) in &me.meta {
                merged.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        current = e.source();
    }
    merged
}

/// Builds a metadata map from key/value pairs.
pub fn meta(pairs: &[(&str, Value)]) -> Meta {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
