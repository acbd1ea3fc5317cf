//! The structured diagnostic type and its template registry.

use crate::srcloc::SrcLocation;
use crate::stack::{self, StackFrame};

use girder_serde::{DiagnosticParams, DiagnosticWire};

use std::error::Error;
use std::fmt;

/// A diagnostic template: a stable code plus default text.
///
/// Templates are declared as consts next to the code that emits them;
/// the compiler crates own their codes, this crate owns the mechanism.
#[derive(Clone, Copy, Debug)]
pub struct ErrTemplate {
    pub code: u32,
    pub title: &'static str,
    pub summary: &'static str,
    pub detail: Option<&'static str>,
    /// Internal invariant violations always capture a stack trace.
    pub internal: bool,
}

pub const INTERNAL_ERROR: ErrTemplate = ErrTemplate {
    code: 9000,
    title: "internal compiler error",
    summary: "the compiler violated one of its own invariants",
    detail: Some(
        "This is a bug in girder, not in your application. \
         Please report it upstream.",
    ),
    internal: true,
};

/// A structured error anchored in user source.
///
/// Two diagnostics compare equal when their titles match.
#[derive(Debug)]
pub struct ErrInSrc {
    pub code: u32,
    pub title: String,
    pub summary: String,
    pub detail: Option<String>,
    pub cause: Option<Box<dyn Error + Send + Sync + 'static>>,
    pub locations: Vec<SrcLocation>,
    pub stack: Vec<StackFrame>,
}

impl ErrInSrc {
    pub fn new(tpl: &ErrTemplate) -> Self {
        let stack = if tpl.internal || cfg!(debug_assertions) {
            stack::capture()
        } else {
            Vec::new()
        };
        ErrInSrc {
            code: tpl.code,
            title: tpl.title.to_string(),
            summary: tpl.summary.to_string(),
            detail: tpl.detail.map(String::from),
            cause: None,
            locations: Vec::new(),
            stack,
        }
    }

    /// Replaces the template summary with a message built by the caller.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn caused_by(
        mut self,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn at(mut self, location: SrcLocation) -> Self {
        self.locations.push(location);
        self
    }

    pub fn at_all(
        mut self,
        locations: impl IntoIterator<Item = SrcLocation>,
    ) -> Self {
        self.locations.extend(locations);
        self
    }

    /// A diagnostic is a warning when every location is warning-level.
    /// Locationless diagnostics are always errors.
    pub fn is_warning(&self) -> bool {
        !self.locations.is_empty()
            && self
                .locations
                .iter()
                .all(|l| l.kind == crate::srcloc::LocKind::Warning)
    }

    pub fn to_wire(&self) -> DiagnosticWire {
        DiagnosticWire {
            params: DiagnosticParams {
                code: self.code,
                title: self.title.clone(),
                summary: self.summary.clone(),
                detail: self.detail.clone(),
                locations: self.locations.iter().map(|l| l.to_wire()).collect(),
            },
            stack: self.stack.clone(),
        }
    }
}

impl PartialEq for ErrInSrc {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
    }
}

impl Eq for ErrInSrc {}

impl fmt::Display for ErrInSrc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.summary)
    }
}

impl Error for ErrInSrc {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn Error + 'static))
    }
}
