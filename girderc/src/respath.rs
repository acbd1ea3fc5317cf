//! URL path templates: parsing, canonical rendering and the
//! conflict-detecting registry.

pub mod registry;

use std::fmt;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

/// HTTP methods an endpoint can register under. `Star` matches every
/// concrete method.
#[derive(
    Clone, Copy, Debug, Display, EnumString, Eq, Hash, Ord, PartialEq,
    PartialOrd,
)]
pub enum Method {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
    #[strum(serialize = "PUT")]
    Put,
    #[strum(serialize = "DELETE")]
    Delete,
    #[strum(serialize = "PATCH")]
    Patch,
    #[strum(serialize = "HEAD")]
    Head,
    #[strum(serialize = "OPTIONS")]
    Options,
    #[strum(serialize = "*")]
    Star,
}

impl Method {
    pub fn all_concrete() -> &'static [Method] {
        &[
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
            Method::Head,
            Method::Options,
        ]
    }
}

/// The builtin types a path parameter can decode into.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ParamType {
    String,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uuid,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    Literal(String),
    Param { name: String, typ: ParamType },
    Wildcard { name: String },
    Fallback { name: String },
}

impl Segment {
    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }

    /// The parameter name, for non-literal segments.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param { name, .. }
            | Segment::Wildcard { name }
            | Segment::Fallback { name } => Some(name),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Segment::Literal(lit) => write!(f, "{}", lit),
            Segment::Param { name, .. } => write!(f, ":{}", name),
            Segment::Wildcard { name } => write!(f, "*{}", name),
            Segment::Fallback { name } => write!(f, "!{}", name),
        }
    }
}

/// A parsed path template such as `/blog/:id/*rest`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Path {
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Path { segments: vec![] }
    }

    pub fn has_fallback(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Fallback { .. }))
    }

    pub fn num_params(&self) -> usize {
        self.params().count()
    }

    /// Non-literal segments in declaration order. The order is
    /// significant for code generation.
    pub fn params(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| !s.is_literal())
    }

    /// Assigns value types to the parameter segments, in order.
    pub fn set_param_types(&mut self, types: &[ParamType]) {
        let mut it = types.iter();
        for seg in &mut self.segments {
            if let Segment::Param { typ, .. } = seg {
                match it.next() {
                    Some(t) => *typ = *t,
                    None => return,
                }
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for seg in &self.segments {
            write!(f, "/{}", seg)?;
        }
        Ok(())
    }
}

/// A parse failure, pointing at the offending byte range of the input.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    pub msg: String,
    pub offset: usize,
    pub len: usize,
}

impl ParseError {
    fn new(msg: impl Into<String>, offset: usize, len: usize) -> Self {
        ParseError {
            msg: msg.into(),
            offset,
            len,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for ParseError {}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Path, ParseError> {
        parse(raw)
    }
}

/// Parses a path template, enforcing the segment grammar.
pub fn parse(raw: &str) -> Result<Path, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::new("path must not be empty", 0, 0));
    }
    if !raw.starts_with('/') {
        return Err(ParseError::new("path must begin with '/'", 0, 1));
    }
    if let Some(off) = raw.find(|c: char| c == '?' || c.is_control()) {
        return Err(ParseError::new(
            "path must not contain '?' or control characters",
            off,
            1,
        ));
    }
    if raw == "/" {
        return Ok(Path::root());
    }
    if raw.ends_with('/') {
        return Err(ParseError::new(
            "path must not end with a trailing '/'",
            raw.len() - 1,
            1,
        ));
    }

    let mut segments = Vec::new();
    let mut seen_names: Vec<String> = Vec::new();
    let mut offset: usize = 1;
    let count = raw[1..].split('/').count();
    for (i, part) in raw[1..].split('/').enumerate() {
        if part.is_empty() {
            return Err(ParseError::new(
                "path must not contain '//'",
                offset.saturating_sub(1),
                2,
            ));
        }
        let last = i + 1 == count;
        let seg = parse_segment(part, offset, last)?;
        if let Some(name) = seg.param_name() {
            if seen_names.iter().any(|n| n == name) {
                return Err(ParseError::new(
                    format!("duplicate path parameter '{}'", name),
                    offset,
                    part.len(),
                ));
            }
            seen_names.push(name.to_string());
        }
        segments.push(seg);
        offset += part.len() + 1;
    }
    Ok(Path { segments })
}

fn parse_segment(
    part: &str,
    offset: usize,
    last: bool,
) -> Result<Segment, ParseError> {
    let (marker, rest) = match part.chars().next() {
        Some(c @ ':') | Some(c @ '*') | Some(c @ '!') => (Some(c), &part[1..]),
        _ => (None, part),
    };
    match marker {
        None => Ok(Segment::Literal(part.to_string())),
        Some(marker) => {
            if rest.is_empty() {
                return Err(ParseError::new(
                    format!("'{}' segment must be named", marker),
                    offset,
                    part.len(),
                ));
            }
            if !is_ident(rest) {
                return Err(ParseError::new(
                    format!("invalid segment name '{}'", rest),
                    offset + 1,
                    rest.len(),
                ));
            }
            match marker {
                ':' => Ok(Segment::Param {
                    name: rest.to_string(),
                    typ: ParamType::String,
                }),
                '*' | '!' => {
                    if !last {
                        return Err(ParseError::new(
                            format!(
                                "'{}' is only allowed in the final segment",
                                marker
                            ),
                            offset,
                            part.len(),
                        ));
                    }
                    if marker == '*' {
                        Ok(Segment::Wildcard {
                            name: rest.to_string(),
                        })
                    } else {
                        Ok(Segment::Fallback {
                            name: rest.to_string(),
                        })
                    }
                }
                _ => unreachable!(),
            }
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod respath_tests {
    use super::*;

    use rstest::*;

    #[rstest(
        raw,
        case("/"),
        case("/foo"),
        case("/foo/bar"),
        case("/foo/:id"),
        case("/foo/:id/*rest"),
        case("/:a/:b/:c"),
        case("/static/!fallback")
    )]
    fn parse_round_trips(raw: &str) {
        let path = parse(raw).unwrap();
        assert_eq!(path.to_string(), raw);
    }

    #[rstest(
        raw,
        msg_part,
        case("", "must not be empty"),
        case("foo", "must begin with '/'"),
        case("/foo/", "trailing '/'"),
        case("/foo//bar", "'//'"),
        case("/foo?x=1", "'?'"),
        case("/foo/*", "must be named"),
        case("/foo/!", "must be named"),
        case("/foo/:1abc", "invalid segment name"),
        case("/*rest/foo", "only allowed in the final segment"),
        case("/!fb/foo", "only allowed in the final segment"),
        case("/:id/:id", "duplicate path parameter")
    )]
    fn parse_rejects(raw: &str, msg_part: &str) {
        let err = parse(raw).unwrap_err();
        assert!(
            err.msg.contains(msg_part),
            "message {:?} should contain {:?}",
            err.msg,
            msg_part
        );
    }

    #[rstest]
    fn parse_error_points_at_the_substring() {
        let err = parse("/ok/:1abc").unwrap_err();
        assert_eq!(&"/ok/:1abc"[err.offset..err.offset + err.len], "1abc");
    }

    #[rstest]
    fn params_iterate_in_order() {
        let path = parse("/x/:a/y/:b/*rest").unwrap();
        let names: Vec<&str> =
            path.params().filter_map(|s| s.param_name()).collect();
        assert_eq!(names, vec!["a", "b", "rest"]);
        assert_eq!(path.num_params(), 3);
        assert!(!path.has_fallback());
        assert!(parse("/x/!fb").unwrap().has_fallback());
    }

    #[rstest]
    fn param_types_assign_in_order() {
        let mut path = parse("/:a/:b").unwrap();
        path.set_param_types(&[ParamType::Int32, ParamType::Bool]);
        let types: Vec<ParamType> = path
            .params()
            .filter_map(|s| match s {
                Segment::Param { typ, .. } => Some(*typ),
                _ => None,
            })
            .collect();
        assert_eq!(types, vec![ParamType::Int32, ParamType::Bool]);
    }

    #[rstest]
    fn methods_parse_from_strings() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("*".parse::<Method>().unwrap(), Method::Star);
        assert!("BOGUS".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
