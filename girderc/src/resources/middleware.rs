//! The `//girder:middleware` parser.

use crate::directive::{self, selector, Directive, DirectiveSpec, SelectorSet};
use crate::resources::ParseCtx;
use crate::schema::{FnOutput, FuncDecl};

use girder_diag::srcloc::{LocKind, SrcFile, SrcLocation};
use girder_diag::{ErrInSrc, ErrTemplate};

use std::sync::Arc;

pub const ERR_INVALID_TARGET: ErrTemplate = ErrTemplate {
    code: 2101,
    title: "invalid middleware target",
    summary: "the target selector list could not be parsed",
    detail: Some("Targets are space-separated selectors: `all` or `tag:name`."),
    internal: false,
};

pub const ERR_MIDDLEWARE_SIGNATURE: ErrTemplate = ErrTemplate {
    code: 2102,
    title: "invalid middleware signature",
    summary: "middleware functions take (Request, Next) and return Response",
    detail: None,
    internal: false,
};

/// A function wrapping one or more endpoints' execution.
#[derive(Clone, Debug)]
pub struct Middleware {
    pub name: String,
    pub global: bool,
    pub target: SelectorSet,
    pub recv: Option<String>,
    /// The enclosing service, for non-global middleware.
    pub service: Option<String>,
    pub doc: String,
    pub file: Arc<SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

const SPEC: DirectiveSpec<'static> = DirectiveSpec {
    name: "middleware",
    allowed_options: &["global"],
    allowed_fields: &["target"],
    allow_tags: false,
    validate_field: None,
};

pub fn parse(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    dir: &Directive,
    doc: &str,
) -> Option<Middleware> {
    if !directive::validate(dir, &SPEC, ctx.errs) {
        return None;
    }

    let mut target = SelectorSet::new();
    if let Some(field) = dir.field("target") {
        for part in field.value.value.split_whitespace() {
            match selector::parse(part) {
                Ok(sel) => {
                    target.add(sel);
                }
                Err(err) => {
                    ctx.errs.push(
                        ErrInSrc::new(&ERR_INVALID_TARGET)
                            .summary(format!("in '{}': {}", part, err.msg))
                            .at(field.value.loc.clone()),
                    );
                    return None;
                }
            }
        }
    }
    if target.is_empty() {
        target.add(directive::Selector::All);
    }

    let sig_ok = func.params.len() == 2
        && func.params[0].ty.is_named("Request")
        && func.params[1].ty.is_named("Next")
        && matches!(&func.output, FnOutput::Plain(ty) if ty.is_named("Response"));
    if !sig_ok {
        ctx.errs.push(
            ErrInSrc::new(&ERR_MIDDLEWARE_SIGNATURE).at(
                SrcLocation::from_span(
                    ctx.file,
                    func.sig_span,
                    LocKind::Error,
                    None,
                ),
            ),
        );
        return None;
    }

    Some(Middleware {
        name: func.name.clone(),
        global: dir.has_option("global"),
        target,
        recv: func.recv.clone(),
        service: None,
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

#[cfg(test)]
mod middleware_tests {
    use super::*;

    use crate::directive::Selector;
    use girder_diag::DiagList;
    use rstest::*;

    fn parse_mw(
        dir_line: &str,
        func_src: &str,
    ) -> (Option<Middleware>, DiagList) {
        let file = SrcFile::new("blog/mw.rs", "/app/blog/mw.rs", "");
        let mut errs = DiagList::new();
        let dir = directive::parse(&file, 1, dir_line).unwrap();
        let item: syn::ItemFn = syn::parse_str(func_src).unwrap();
        let func = FuncDecl::from_item_fn(&item);
        let mw = {
            let mut ctx = ParseCtx {
                file: &file,
                pkg: "blog",
                errs: &mut errs,
            };
            parse(&mut ctx, &func, &dir, "")
        };
        (mw, errs)
    }

    const MW_FN: &str =
        "fn logging(req: Request, next: Next) -> Response { todo!() }";

    #[rstest]
    fn targeted_middleware_parses() {
        let (mw, errs) = parse_mw(
            "//girder:middleware target=\"tag:cache tag:audit\"",
            MW_FN,
        );
        assert!(errs.is_empty(), "{:?}", errs);
        let mw = mw.unwrap();
        assert!(!mw.global);
        assert_eq!(mw.target.len(), 2);
        assert!(mw.target.contains(&Selector::Tag("cache".into())));
    }

    #[rstest]
    fn global_middleware_defaults_to_all() {
        let (mw, errs) = parse_mw("//girder:middleware global", MW_FN);
        assert!(errs.is_empty(), "{:?}", errs);
        let mw = mw.unwrap();
        assert!(mw.global);
        assert!(mw.target.contains(&Selector::All));
    }

    #[rstest(
        dir_line,
        func_src,
        expected_title,
        case(
            "//girder:middleware target=tag:NOPE",
            MW_FN,
            "invalid middleware target"
        ),
        case(
            "//girder:middleware",
            "fn bad(req: Request) -> Response { todo!() }",
            "invalid middleware signature"
        ),
        case(
            "//girder:middleware",
            "fn bad(req: Request, next: Next) -> Result<Response, Error> { todo!() }",
            "invalid middleware signature"
        ),
        case("//girder:middleware tag:x", MW_FN, "tags not allowed")
    )]
    fn middleware_errors(
        dir_line: &str,
        func_src: &str,
        expected_title: &str,
    ) {
        let (mw, errs) = parse_mw(dir_line, func_src);
        assert!(mw.is_none());
        assert_eq!(errs.first().unwrap().title, expected_title);
    }
}
