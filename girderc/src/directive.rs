//! `//girder:*` comment directives: tokenization and shape validation.

pub mod selector;
mod tokenize;

pub use selector::{Selector, SelectorSet};

use crate::directive::tokenize::Tokenizer;

use girder_diag::srcloc::{LocKind, Pos, SrcFile, SrcLocation};
use girder_diag::{DiagList, ErrInSrc, ErrTemplate};

use std::sync::Arc;

/// The comment prefix all directives share: `//girder:<name> ...`.
pub const PREFIX: &str = "girder";

pub const ERR_INVALID_DIRECTIVE: ErrTemplate = ErrTemplate {
    code: 1001,
    title: "invalid directive",
    summary: "the directive could not be parsed",
    detail: None,
    internal: false,
};

pub const ERR_UNKNOWN_OPTION: ErrTemplate = ErrTemplate {
    code: 1002,
    title: "unknown directive option",
    summary: "the directive does not accept this option",
    detail: None,
    internal: false,
};

pub const ERR_UNKNOWN_FIELD: ErrTemplate = ErrTemplate {
    code: 1003,
    title: "unknown directive field",
    summary: "the directive does not accept this field",
    detail: None,
    internal: false,
};

pub const ERR_DUPLICATE_TOKEN: ErrTemplate = ErrTemplate {
    code: 1004,
    title: "duplicate directive token",
    summary: "the token appears more than once",
    detail: None,
    internal: false,
};

pub const ERR_EMPTY_FIELD_VALUE: ErrTemplate = ErrTemplate {
    code: 1005,
    title: "empty field value",
    summary: "directive fields require a non-empty value",
    detail: None,
    internal: false,
};

pub const ERR_LEGACY_TAG_LIST: ErrTemplate = ErrTemplate {
    code: 1006,
    title: "legacy tag list",
    summary: "comma-separated lists are no longer accepted",
    detail: Some("Separate tokens with spaces instead: `tag:a tag:b`."),
    internal: false,
};

pub const ERR_MULTIPLE_DIRECTIVES: ErrTemplate = ErrTemplate {
    code: 1007,
    title: "multiple directives",
    summary: "a declaration accepts at most one directive",
    detail: None,
    internal: false,
};

pub const ERR_TAGS_NOT_ALLOWED: ErrTemplate = ErrTemplate {
    code: 1008,
    title: "tags not allowed",
    summary: "this directive does not accept tags",
    detail: None,
    internal: false,
};

pub const ERR_INVALID_SELECTOR: ErrTemplate = ErrTemplate {
    code: 1009,
    title: "invalid selector",
    summary: "the selector could not be parsed",
    detail: None,
    internal: false,
};

/// A single directive token, anchored in the source line.
#[derive(Clone, Debug)]
pub struct Token {
    pub value: String,
    pub loc: SrcLocation,
}

/// A `key=value` token.
#[derive(Clone, Debug)]
pub struct Field {
    pub key: Token,
    pub value: Token,
}

/// One parsed directive comment. At most one directive may be attached
/// to a declaration.
#[derive(Clone, Debug)]
pub struct Directive {
    pub name: String,
    pub options: Vec<Token>,
    pub fields: Vec<Field>,
    pub tags: Vec<Token>,
    pub loc: SrcLocation,
    pub line: u32,
}

impl Directive {
    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }

    pub fn option(&self, name: &str) -> Option<&Token> {
        self.options.iter().find(|t| t.value == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key.value == name)
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.value.as_str())
    }
}

/// Whether a trimmed comment line opens a directive.
pub fn is_directive_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") && {
        let rest = &trimmed[2..];
        rest.starts_with(PREFIX)
            && rest[PREFIX.len()..].starts_with(':')
    }
}

/// Parses the directive on `raw_line` (1-based `line_no` in `file`).
pub fn parse(
    file: &Arc<SrcFile>,
    line_no: u32,
    raw_line: &str,
) -> Result<Directive, Box<ErrInSrc>> {
    let comment_off = match raw_line.find("//") {
        Some(off) => off,
        None => {
            return Err(invalid(
                file,
                line_no,
                raw_line,
                0,
                raw_line.len(),
                "directives are comments starting with '//'",
            ))
        }
    };
    let body_off = comment_off + 2;
    let body = &raw_line[body_off..];

    let after_prefix = match body.strip_prefix(PREFIX) {
        Some(rest) if rest.starts_with(':') => &rest[1..],
        _ => {
            return Err(invalid(
                file,
                line_no,
                raw_line,
                comment_off,
                body.len() + 2,
                format!("expected '//{}:<name>'", PREFIX),
            ))
        }
    };
    let name_off = body_off + PREFIX.len() + 1;

    let name_len = after_prefix
        .char_indices()
        .take_while(|&(i, c)| {
            if i == 0 {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric()
            }
        })
        .count();
    if name_len == 0 {
        return Err(invalid(
            file,
            line_no,
            raw_line,
            name_off,
            1,
            "directive name must start with a letter",
        ));
    }
    let name = &after_prefix[..name_len];
    let rest_off = name_off + name_len;
    let rest = &raw_line[rest_off..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(invalid(
            file,
            line_no,
            raw_line,
            rest_off,
            1,
            "directive name must be followed by whitespace",
        ));
    }

    let mut dir = Directive {
        name: name.to_string(),
        options: Vec::new(),
        fields: Vec::new(),
        tags: Vec::new(),
        loc: line_span(file, line_no, raw_line, comment_off, raw_line.len() - comment_off),
        line: line_no,
    };

    for tok in Tokenizer::new(rest) {
        let tok = match tok {
            Ok(t) => t,
            Err(unterminated) => {
                return Err(invalid(
                    file,
                    line_no,
                    raw_line,
                    rest_off + unterminated.offset,
                    1,
                    "unterminated quote",
                ))
            }
        };
        let tok_off = rest_off + tok.offset;
        classify_token(file, line_no, raw_line, &mut dir, tok.text, tok_off)?;
    }

    Ok(dir)
}

fn classify_token(
    file: &Arc<SrcFile>,
    line_no: u32,
    raw_line: &str,
    dir: &mut Directive,
    text: &str,
    offset: usize,
) -> Result<(), Box<ErrInSrc>> {
    if let Some(value) = text.strip_prefix("tag:") {
        if value.contains(',') {
            return Err(Box::new(
                ErrInSrc::new(&ERR_LEGACY_TAG_LIST)
                    .summary(format!(
                        "'{}' uses the legacy comma-separated form; \
                         tags are space-separated",
                        text
                    ))
                    .at(line_span(file, line_no, raw_line, offset, text.len())),
            ));
        }
        match selector::parse(text) {
            Ok(Selector::Tag(tag)) => {
                dir.tags.push(Token {
                    value: tag,
                    loc: line_span(
                        file,
                        line_no,
                        raw_line,
                        offset + 4,
                        value.len(),
                    ),
                });
                Ok(())
            }
            Ok(Selector::All) | Err(_) => Err(Box::new(
                ErrInSrc::new(&ERR_INVALID_SELECTOR)
                    .summary(format!("invalid tag value '{}'", value))
                    .at(line_span(
                        file,
                        line_no,
                        raw_line,
                        offset + 4,
                        value.len().max(1),
                    )),
            )),
        }
    } else if let Some(eq) = text.find('=') {
        let (key, raw_value) = (&text[..eq], &text[eq + 1..]);
        if !is_name(key) {
            return Err(invalid(
                file,
                line_no,
                raw_line,
                offset,
                key.len().max(1),
                format!("invalid field name '{}'", key),
            ));
        }
        let value = unquote(raw_value);
        if value.is_empty() {
            return Err(Box::new(
                ErrInSrc::new(&ERR_EMPTY_FIELD_VALUE)
                    .summary(format!("field '{}' has an empty value", key))
                    .at(line_span(file, line_no, raw_line, offset, text.len())),
            ));
        }
        dir.fields.push(Field {
            key: Token {
                value: key.to_string(),
                loc: line_span(file, line_no, raw_line, offset, key.len()),
            },
            value: Token {
                value: value.to_string(),
                loc: line_span(
                    file,
                    line_no,
                    raw_line,
                    offset + eq + 1,
                    raw_value.len().max(1),
                ),
            },
        });
        Ok(())
    } else {
        if text.contains(',') {
            return Err(Box::new(
                ErrInSrc::new(&ERR_LEGACY_TAG_LIST)
                    .summary(format!(
                        "'{}' uses the legacy comma-separated form; \
                         tokens are space-separated",
                        text
                    ))
                    .at(line_span(file, line_no, raw_line, offset, text.len())),
            ));
        }
        if !is_name(text) {
            return Err(invalid(
                file,
                line_no,
                raw_line,
                offset,
                text.len(),
                format!("invalid option '{}'", text),
            ));
        }
        dir.options.push(Token {
            value: text.to_string(),
            loc: line_span(file, line_no, raw_line, offset, text.len()),
        });
        Ok(())
    }
}

/// The static shape of one directive kind.
pub struct DirectiveSpec<'a> {
    pub name: &'a str,
    pub allowed_options: &'a [&'a str],
    pub allowed_fields: &'a [&'a str],
    pub allow_tags: bool,
    /// Per-field value check, keyed by field name.
    pub validate_field:
        Option<&'a dyn Fn(&str, &Token) -> Option<ErrInSrc>>,
}

/// Checks a directive against its spec, appending diagnostics. Returns
/// `true` when the directive is well formed.
pub fn validate(
    dir: &Directive,
    spec: &DirectiveSpec<'_>,
    errs: &mut DiagList,
) -> bool {
    let before = errs.len();

    let mut seen_options: Vec<&str> = Vec::new();
    for opt in &dir.options {
        if !spec.allowed_options.contains(&opt.value.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_UNKNOWN_OPTION)
                    .summary(format!(
                        "directive '{}' does not accept option '{}'",
                        spec.name, opt.value
                    ))
                    .detail(allowed_list("options", spec.allowed_options))
                    .at(opt.loc.clone()),
            );
            continue;
        }
        if seen_options.contains(&opt.value.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_DUPLICATE_TOKEN)
                    .summary(format!(
                        "option '{}' appears more than once",
                        opt.value
                    ))
                    .at(opt.loc.clone()),
            );
        } else {
            seen_options.push(&opt.value);
        }
    }

    let mut seen_fields: Vec<&str> = Vec::new();
    for field in &dir.fields {
        if !spec.allowed_fields.contains(&field.key.value.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_UNKNOWN_FIELD)
                    .summary(format!(
                        "directive '{}' does not accept field '{}'",
                        spec.name, field.key.value
                    ))
                    .detail(allowed_list("fields", spec.allowed_fields))
                    .at(field.key.loc.clone()),
            );
            continue;
        }
        if seen_fields.contains(&field.key.value.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_DUPLICATE_TOKEN)
                    .summary(format!(
                        "field '{}' appears more than once",
                        field.key.value
                    ))
                    .at(field.key.loc.clone()),
            );
            continue;
        }
        seen_fields.push(&field.key.value);
        if let Some(check) = spec.validate_field {
            if let Some(err) = check(&field.key.value, &field.value) {
                errs.push(err);
            }
        }
    }

    let mut seen_tags: Vec<&str> = Vec::new();
    for tag in &dir.tags {
        if !spec.allow_tags {
            errs.push(
                ErrInSrc::new(&ERR_TAGS_NOT_ALLOWED)
                    .summary(format!(
                        "directive '{}' does not accept tags",
                        spec.name
                    ))
                    .at(tag.loc.clone()),
            );
            continue;
        }
        if seen_tags.contains(&tag.value.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_DUPLICATE_TOKEN)
                    .summary(format!(
                        "tag '{}' appears more than once",
                        tag.value
                    ))
                    .at(tag.loc.clone()),
            );
        } else {
            seen_tags.push(&tag.value);
        }
    }

    errs.len() == before
}

fn allowed_list(what: &str, allowed: &[&str]) -> String {
    if allowed.is_empty() {
        format!("This directive accepts no {}.", what)
    } else {
        format!("Allowed {}: {}.", what, allowed.join(", "))
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// A single-line location covering `len` bytes starting at `byte_off`.
fn line_span(
    file: &Arc<SrcFile>,
    line_no: u32,
    raw_line: &str,
    byte_off: usize,
    len: usize,
) -> SrcLocation {
    let start_col = raw_line[..byte_off].chars().count() as u32 + 1;
    let width = raw_line[byte_off..]
        .char_indices()
        .take_while(|&(i, _)| i < len)
        .count() as u32;
    SrcLocation {
        file: Arc::clone(file),
        start: Pos::new(line_no, start_col),
        end: Pos::new(line_no, start_col + width.max(1)),
        kind: LocKind::Error,
        text: None,
    }
}

fn invalid(
    file: &Arc<SrcFile>,
    line_no: u32,
    raw_line: &str,
    byte_off: usize,
    len: usize,
    summary: impl Into<String>,
) -> Box<ErrInSrc> {
    Box::new(
        ErrInSrc::new(&ERR_INVALID_DIRECTIVE)
            .summary(summary)
            .at(line_span(file, line_no, raw_line, byte_off, len)),
    )
}
