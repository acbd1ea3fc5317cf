//! The `//girder:api` endpoint parser.

use crate::directive::{self, Directive, DirectiveSpec, SelectorSet};
use crate::resources::ParseCtx;
use crate::respath::{self, Method, Path, Segment};
use crate::schema::{FnOutput, FuncDecl, StructDecl, Ty};

use girder_diag::srcloc::{LocKind, Pos, SrcLocation};
use girder_diag::{ErrInSrc, ErrTemplate};

use std::collections::HashMap;
use std::sync::Arc;

use strum_macros::{Display, EnumString};

pub const ERR_ACCESS_OPTIONS: ErrTemplate = ErrTemplate {
    code: 2001,
    title: "conflicting access options",
    summary: "an endpoint takes at most one of public, private and auth",
    detail: None,
    internal: false,
};

pub const ERR_INVALID_METHOD: ErrTemplate = ErrTemplate {
    code: 2002,
    title: "invalid method",
    summary: "the method list could not be parsed",
    detail: Some("Methods are comma-separated, e.g. `method=GET,POST`."),
    internal: false,
};

pub const ERR_INVALID_PATH: ErrTemplate = ErrTemplate {
    code: 2003,
    title: "invalid path",
    summary: "the path template could not be parsed",
    detail: None,
    internal: false,
};

pub const ERR_ENDPOINT_SIGNATURE: ErrTemplate = ErrTemplate {
    code: 2004,
    title: "invalid endpoint signature",
    summary: "the function signature does not match the endpoint shape",
    detail: None,
    internal: false,
};

/// Who may call an endpoint.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum Access {
    Public,
    Auth,
    Private,
}

/// A function registered as an API handler.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub name: String,
    /// Assigned when services are discovered.
    pub service: String,
    pub access: Access,
    pub raw: bool,
    pub path: Path,
    pub methods: Vec<Method>,
    pub tags: SelectorSet,
    pub request: Option<Ty>,
    pub response: Option<Ty>,
    pub recv: Option<String>,
    pub doc: String,
    pub file: Arc<girder_diag::srcloc::SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

const SPEC: DirectiveSpec<'static> = DirectiveSpec {
    name: "api",
    allowed_options: &["public", "private", "auth", "raw"],
    allowed_fields: &["method", "path"],
    allow_tags: true,
    validate_field: None,
};

/// Parses one endpoint declaration. Diagnostics go to `ctx.errs`; `None`
/// means the endpoint was dropped. `structs` holds the package's struct
/// declarations, used to classify the request as body or query-only.
pub fn parse(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    dir: &Directive,
    doc: &str,
    structs: &HashMap<String, StructDecl>,
) -> Option<Endpoint> {
    if !directive::validate(dir, &SPEC, ctx.errs) {
        return None;
    }

    let access = parse_access(ctx, dir)?;
    let raw = dir.has_option("raw");
    let mut methods = parse_methods(ctx, dir)?;
    let mut path = parse_path(ctx, dir, func)?;

    let name_loc =
        SrcLocation::from_span(ctx.file, func.name_span, LocKind::Error, None);

    let (request, response) = if raw {
        check_raw_signature(ctx, func)?;
        (None, None)
    } else {
        check_typed_signature(ctx, func, &mut path)?
    };

    if methods.is_empty() {
        methods = default_methods(raw, &path, request.as_ref(), structs);
    }

    let mut tags = SelectorSet::new();
    for tag in &dir.tags {
        tags.add(directive::Selector::Tag(tag.value.clone()));
    }

    Some(Endpoint {
        name: func.name.clone(),
        service: String::new(),
        access,
        raw,
        path,
        methods,
        tags,
        request,
        response,
        recv: func.recv.clone(),
        doc: doc.to_string(),
        file: Arc::clone(ctx.file),
        name_loc,
        line: dir.line,
    })
}

/// The methods an endpoint registers when the directive names none:
/// `POST` with a request body, `GET` when the request is carried by the
/// path or by an all-encoded (query-only) struct, otherwise every
/// method.
fn default_methods(
    raw: bool,
    path: &Path,
    request: Option<&Ty>,
    structs: &HashMap<String, StructDecl>,
) -> Vec<Method> {
    if raw {
        return vec![Method::Star];
    }
    if let Some(request) = request {
        if request_has_body(request, structs) {
            return vec![Method::Post];
        }
        return vec![Method::Get];
    }
    if path.params().next().is_some() {
        return vec![Method::Get];
    }
    vec![Method::Star]
}

/// Whether any request field travels in the body. Fields without a
/// header/query/cookie encoding are body fields; a struct declared in
/// another package cannot be inspected and counts as a body.
fn request_has_body(
    request: &Ty,
    structs: &HashMap<String, StructDecl>,
) -> bool {
    match request.deref_named().and_then(|name| structs.get(name)) {
        Some(decl) => {
            decl.fields.iter().any(|f| f.encodings.is_empty())
        }
        None => true,
    }
}

fn parse_access(ctx: &mut ParseCtx<'_>, dir: &Directive) -> Option<Access> {
    let present: Vec<&directive::Token> = ["public", "private", "auth"]
        .iter()
        .filter_map(|name| dir.option(name))
        .collect();
    match present.len() {
        0 => Some(Access::Private),
        1 => match present[0].value.as_str() {
            "public" => Some(Access::Public),
            "auth" => Some(Access::Auth),
            _ => Some(Access::Private),
        },
        _ => {
            ctx.errs.push(
                ErrInSrc::new(&ERR_ACCESS_OPTIONS)
                    .at_all(present.iter().map(|t| t.loc.clone())),
            );
            None
        }
    }
}

fn parse_methods(
    ctx: &mut ParseCtx<'_>,
    dir: &Directive,
) -> Option<Vec<Method>> {
    let field = match dir.field("method") {
        Some(f) => f,
        None => return Some(Vec::new()),
    };
    let mut methods = Vec::new();
    for part in field.value.value.split(',') {
        match part.parse::<Method>() {
            Ok(method) => {
                if methods.contains(&method) {
                    ctx.errs.push(
                        ErrInSrc::new(&ERR_INVALID_METHOD)
                            .summary(format!(
                                "method '{}' is listed twice",
                                part
                            ))
                            .at(field.value.loc.clone()),
                    );
                    return None;
                }
                methods.push(method);
            }
            Err(_) => {
                ctx.errs.push(
                    ErrInSrc::new(&ERR_INVALID_METHOD)
                        .summary(format!("unknown method '{}'", part))
                        .at(field.value.loc.clone()),
                );
                return None;
            }
        }
    }
    Some(methods)
}

fn parse_path(
    ctx: &mut ParseCtx<'_>,
    dir: &Directive,
    func: &FuncDecl,
) -> Option<Path> {
    match dir.field("path") {
        Some(field) => match respath::parse(&field.value.value) {
            Ok(path) => Some(path),
            Err(err) => {
                let loc = offset_loc(&field.value.loc, err.offset, err.len);
                ctx.errs.push(
                    ErrInSrc::new(&ERR_INVALID_PATH)
                        .summary(err.msg)
                        .at(loc),
                );
                None
            }
        },
        None => {
            // The default path is a single literal segment.
            let raw = format!("/{}.{}", ctx.pkg, func.name);
            match respath::parse(&raw) {
                Ok(path) => Some(path),
                Err(err) => {
                    ctx.errs.push(
                        ErrInSrc::new(&ERR_INVALID_PATH)
                            .summary(format!(
                                "default path '{}' is invalid: {}",
                                raw, err.msg
                            ))
                            .at(dir.loc.clone()),
                    );
                    None
                }
            }
        }
    }
}

/// Shifts a single-line location to a sub-range of itself.
fn offset_loc(base: &SrcLocation, offset: usize, len: usize) -> SrcLocation {
    let start = Pos::new(base.start.line, base.start.col + offset as u32);
    let end = Pos::new(start.line, start.col + (len as u32).max(1));
    SrcLocation {
        file: Arc::clone(&base.file),
        start,
        end,
        kind: base.kind,
        text: base.text.clone(),
    }
}

fn signature_err(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    summary: String,
) -> Option<(Option<Ty>, Option<Ty>)> {
    let loc =
        SrcLocation::from_span(ctx.file, func.sig_span, LocKind::Error, None);
    ctx.errs
        .push(ErrInSrc::new(&ERR_ENDPOINT_SIGNATURE).summary(summary).at(loc));
    None
}

fn check_raw_signature(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
) -> Option<()> {
    let ok = func.params.len() == 2
        && func.params[0].ty.is_named("ResponseWriter")
        && func.params[1].ty.is_named("Request");
    if !ok {
        signature_err(
            ctx,
            func,
            String::from(
                "raw endpoints take (ResponseWriter, Request) and return \
                 nothing",
            ),
        )?;
        return None;
    }
    Some(())
}

fn check_typed_signature(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    path: &mut Path,
) -> Option<(Option<Ty>, Option<Ty>)> {
    match func.params.first() {
        Some(first) if first.ty.is_named("Context") => {}
        _ => {
            return signature_err(
                ctx,
                func,
                String::from(
                    "the first endpoint parameter must be girder::Context",
                ),
            )
        }
    }

    let path_params: Vec<&Segment> = path.params().collect();
    let want = path_params.len();
    if func.params.len() < 1 + want {
        return signature_err(
            ctx,
            func,
            format!(
                "the path declares {} parameter(s) but the function takes \
                 {}",
                want,
                func.params.len().saturating_sub(1)
            ),
        );
    }

    let mut param_types = Vec::new();
    for (i, seg) in path_params.iter().enumerate() {
        let fn_param = &func.params[1 + i];
        let builtin = match fn_param.ty.builtin() {
            Some(b) => b,
            None => {
                return signature_err(
                    ctx,
                    func,
                    format!(
                        "path parameter '{}' must be a builtin type",
                        seg.param_name().unwrap_or_default()
                    ),
                )
            }
        };
        match seg {
            Segment::Param { .. } => match builtin.param_type() {
                Some(pt) => param_types.push(pt),
                None => {
                    return signature_err(
                        ctx,
                        func,
                        format!(
                            "type '{}' cannot decode a path parameter",
                            builtin
                        ),
                    )
                }
            },
            Segment::Wildcard { .. } | Segment::Fallback { .. } => {
                if builtin != crate::schema::Builtin::String {
                    return signature_err(
                        ctx,
                        func,
                        String::from(
                            "wildcard and fallback parameters must be \
                             String",
                        ),
                    );
                }
            }
            Segment::Literal(_) => {}
        }
    }
    path.set_param_types(&param_types);

    let rest = &func.params[1 + want..];
    let request = match rest {
        [] => None,
        [req] => match req.ty.deref_named() {
            Some(_) => Some(req.ty.clone()),
            None => {
                return signature_err(
                    ctx,
                    func,
                    String::from("the request parameter must be a struct"),
                )
            }
        },
        _ => {
            return signature_err(
                ctx,
                func,
                String::from("too many endpoint parameters"),
            )
        }
    };

    let response = match &func.output {
        FnOutput::Result { ok } => match ok {
            Ty::Unit => None,
            other => Some(other.clone()),
        },
        _ => {
            return signature_err(
                ctx,
                func,
                String::from("endpoints must return Result"),
            )
        }
    };

    Some((request, response))
}
