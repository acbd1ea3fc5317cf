//! The `//girder:authhandler` parser. An application has at most one
//! auth handler; uniqueness is checked when the descriptor is built.

use crate::directive::{self, Directive, DirectiveSpec};
use crate::resources::ParseCtx;
use crate::schema::{Builtin, FnOutput, FuncDecl, StructDecl, Ty};

use girder_diag::srcloc::{LocKind, SrcFile, SrcLocation};
use girder_diag::{ErrInSrc, ErrTemplate};

use std::collections::HashMap;
use std::sync::Arc;

pub const ERR_AUTH_SIGNATURE: ErrTemplate = ErrTemplate {
    code: 2201,
    title: "invalid auth handler signature",
    summary: "auth handlers take (Context, params) and return \
              Result<UserID, _> or Result<(UserID, AuthData), _>",
    detail: None,
    internal: false,
};

pub const ERR_AUTH_PARAMS: ErrTemplate = ErrTemplate {
    code: 2202,
    title: "invalid auth params",
    summary: "auth parameters must be a String token or a struct whose \
              fields carry header, query or cookie attributes",
    detail: None,
    internal: false,
};

/// How the handler receives its credentials.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthParam {
    /// The legacy bearer-token form: a plain `String`.
    Token,
    /// A struct of header/query/cookie parameters.
    Struct(String),
}

#[derive(Clone, Debug)]
pub struct AuthHandler {
    pub name: String,
    /// Assigned when services are discovered.
    pub service: String,
    pub param: AuthParam,
    pub auth_data: Option<Ty>,
    pub recv: Option<String>,
    pub doc: String,
    pub file: Arc<SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

const SPEC: DirectiveSpec<'static> = DirectiveSpec {
    name: "authhandler",
    allowed_options: &[],
    allowed_fields: &[],
    allow_tags: false,
    validate_field: None,
};

pub fn parse(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    dir: &Directive,
    doc: &str,
    structs: &HashMap<String, StructDecl>,
) -> Option<AuthHandler> {
    if !directive::validate(dir, &SPEC, ctx.errs) {
        return None;
    }

    let sig_loc =
        SrcLocation::from_span(ctx.file, func.sig_span, LocKind::Error, None);

    if func.params.len() != 2 || !func.params[0].ty.is_named("Context") {
        ctx.errs
            .push(ErrInSrc::new(&ERR_AUTH_SIGNATURE).at(sig_loc.clone()));
        return None;
    }

    let param = match &func.params[1].ty {
        Ty::Builtin(Builtin::String) => AuthParam::Token,
        other => match other.deref_named() {
            Some(name) => {
                let decl = match structs.get(name) {
                    Some(decl) => decl,
                    None => {
                        ctx.errs.push(
                            ErrInSrc::new(&ERR_AUTH_PARAMS)
                                .summary(format!(
                                    "auth params struct '{}' must be \
                                     declared in the same package",
                                    name
                                ))
                                .at(sig_loc.clone()),
                        );
                        return None;
                    }
                };
                if !check_param_fields(ctx, decl) {
                    return None;
                }
                AuthParam::Struct(name.to_string())
            }
            None => {
                ctx.errs
                    .push(ErrInSrc::new(&ERR_AUTH_PARAMS).at(sig_loc.clone()));
                return None;
            }
        },
    };

    let auth_data = match &func.output {
        FnOutput::Result { ok } => match ok {
            ty if ty.is_named("UserID") => None,
            Ty::Tuple(elems)
                if elems.len() == 2 && elems[0].is_named("UserID") =>
            {
                Some(elems[1].clone())
            }
            _ => {
                ctx.errs
                    .push(ErrInSrc::new(&ERR_AUTH_SIGNATURE).at(sig_loc.clone()));
                return None;
            }
        },
        _ => {
            ctx.errs
                .push(ErrInSrc::new(&ERR_AUTH_SIGNATURE).at(sig_loc.clone()));
            return None;
        }
    };

    Some(AuthHandler {
        name: func.name.clone(),
        service: String::new(),
        param,
        auth_data,
        recv: func.recv.clone(),
        doc: doc.to_string(),
        file: Arc::clone(ctx.file),
        name_loc: SrcLocation::from_span(
            ctx.file,
            func.name_span,
            LocKind::Error,
            None,
        ),
        line: dir.line,
    })
}

/// Every field of the params struct must carry exactly one transport
/// encoding.
fn check_param_fields(ctx: &mut ParseCtx<'_>, decl: &StructDecl) -> bool {
    let mut ok = true;
    for field in &decl.fields {
        if field.encodings.len() != 1 {
            ctx.errs.push(
                ErrInSrc::new(&ERR_AUTH_PARAMS)
                    .summary(format!(
                        "field '{}' must carry exactly one of \
                         #[girder(header)], #[girder(query)] or \
                         #[girder(cookie)]",
                        field.name
                    ))
                    .at(SrcLocation::from_span(
                        ctx.file,
                        field.span,
                        LocKind::Error,
                        None,
                    )),
            );
            ok = false;
        }
    }
    ok
}

#[cfg(test)]
mod auth_handler_tests {
    use super::*;

    use girder_diag::DiagList;
    use rstest::*;

    fn parse_auth(
        func_src: &str,
        struct_src: Option<&str>,
    ) -> (Option<AuthHandler>, DiagList) {
        let file = SrcFile::new("user/auth.rs", "/app/user/auth.rs", "");
        let mut errs = DiagList::new();
        let dir = directive::parse(&file, 1, "//girder:authhandler").unwrap();
        let item: syn::ItemFn = syn::parse_str(func_src).unwrap();
        let func = FuncDecl::from_item_fn(&item);
        let mut structs = HashMap::new();
        if let Some(src) = struct_src {
            let item: syn::ItemStruct = syn::parse_str(src).unwrap();
            let decl = StructDecl::from_item(&item);
            structs.insert(decl.name.clone(), decl);
        }
        let handler = {
            let mut ctx = ParseCtx {
                file: &file,
                pkg: "user",
                errs: &mut errs,
            };
            parse(&mut ctx, &func, &dir, "", &structs)
        };
        (handler, errs)
    }

    #[rstest]
    fn token_handler_parses() {
        let (handler, errs) = parse_auth(
            "fn auth(ctx: Context, token: String) \
             -> Result<UserID, Error> { todo!() }",
            None,
        );
        assert!(errs.is_empty(), "{:?}", errs);
        let handler = handler.unwrap();
        assert_eq!(handler.param, AuthParam::Token);
        assert!(handler.auth_data.is_none());
    }

    #[rstest]
    fn struct_handler_carries_auth_data() {
        let (handler, errs) = parse_auth(
            "fn auth(ctx: Context, params: AuthParams) \
             -> Result<(UserID, UserData), Error> { todo!() }",
            Some(
                "struct AuthParams {\n\
                     #[girder(header = \"Authorization\")]\n\
                     token: String,\n\
                 }",
            ),
        );
        assert!(errs.is_empty(), "{:?}", errs);
        let handler = handler.unwrap();
        assert_eq!(
            handler.param,
            AuthParam::Struct(String::from("AuthParams"))
        );
        assert!(handler.auth_data.is_some());
    }

    #[rstest(
        func_src,
        struct_src,
        case(
            "fn auth(token: String) -> Result<UserID, Error> { todo!() }",
            None
        ),
        case(
            "fn auth(ctx: Context, token: String) -> UserID { todo!() }",
            None
        ),
        case(
            "fn auth(ctx: Context, p: Missing) \
             -> Result<UserID, Error> { todo!() }",
            None
        ),
        case(
            "fn auth(ctx: Context, p: P) -> Result<UserID, Error> { todo!() }",
            Some("struct P { plain: String }")
        )
    )]
    fn auth_errors(func_src: &str, struct_src: Option<&str>) {
        let (handler, errs) = parse_auth(func_src, struct_src);
        assert!(handler.is_none());
        assert!(!errs.is_empty());
    }
}
