//! Selectors filter which endpoints a middleware applies to.

use regex::Regex;

use std::fmt;
use std::sync::OnceLock;

fn tag_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z]([-_a-z0-9]*[a-z0-9])?$").expect("tag value regex")
    })
}

/// Either every endpoint, or the endpoints carrying a given tag.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Selector {
    All,
    Tag(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Tag(value) => write!(f, "tag:{}", value),
        }
    }
}

/// A deduplicated, insertion-ordered collection of selectors.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SelectorSet {
    items: Vec<Selector>,
}

impl SelectorSet {
    pub fn new() -> Self {
        SelectorSet::default()
    }

    /// Returns `false` when the selector was already present.
    pub fn add(&mut self, selector: Selector) -> bool {
        if self.items.contains(&selector) {
            return false;
        }
        self.items.push(selector);
        true
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.items.contains(selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether this set selects an endpoint carrying `tags`: it does when
    /// it contains `all` or any of the endpoint's tags.
    pub fn selects(&self, tags: &SelectorSet) -> bool {
        if self.contains(&Selector::All) {
            return true;
        }
        self.items.iter().any(|s| tags.contains(s))
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, sel) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", sel)?;
        }
        Ok(())
    }
}

/// A selector parse failure pointing at the offending byte range.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectorError {
    pub msg: String,
    pub offset: usize,
    pub len: usize,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for SelectorError {}

/// Parses `all` or `tag:value`.
pub fn parse(raw: &str) -> Result<Selector, SelectorError> {
    if raw == "all" {
        return Ok(Selector::All);
    }
    match raw.find(':') {
        Some(colon) => {
            let (typ, value) = (&raw[..colon], &raw[colon + 1..]);
            if typ != "tag" {
                return Err(SelectorError {
                    msg: format!("unknown selector type '{}'", typ),
                    offset: 0,
                    len: typ.len(),
                });
            }
            if !tag_value_re().is_match(value) {
                return Err(SelectorError {
                    msg: format!("invalid tag value '{}'", value),
                    offset: colon + 1,
                    len: value.len(),
                });
            }
            Ok(Selector::Tag(value.to_string()))
        }
        None => Err(SelectorError {
            msg: format!("unknown selector '{}'", raw),
            offset: 0,
            len: raw.len(),
        }),
    }
}
