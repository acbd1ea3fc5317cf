//! The `//girder:service` parser: marks a type declaration as the
//! service's struct. An `init` function in the same package returning
//! the struct is paired during descriptor building.

use crate::directive::{self, Directive, DirectiveSpec};
use crate::resources::ParseCtx;
use crate::schema::StructDecl;

use girder_diag::srcloc::{LocKind, SrcFile, SrcLocation};

use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ServiceStruct {
    pub name: String,
    /// The paired `init` function, when one exists.
    pub init_fn: Option<String>,
    pub doc: String,
    pub file: Arc<SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

const SPEC: DirectiveSpec<'static> = DirectiveSpec {
    name: "service",
    allowed_options: &[],
    allowed_fields: &[],
    allow_tags: false,
    validate_field: None,
};

pub fn parse(
    ctx: &mut ParseCtx<'_>,
    decl: &StructDecl,
    dir: &Directive,
    doc: &str,
) -> Option<ServiceStruct> {
    if !directive::validate(dir, &SPEC, ctx.errs) {
        return None;
    }

    Some(ServiceStruct {
        name: decl.name.clone(),
        init_fn: None,
        doc: doc.to_string(),
        file: Arc::clone(ctx.file),
        name_loc: SrcLocation::from_span(
            ctx.file,
            decl.name_span,
            LocKind::Error,
            None,
        ),
        line: dir.line,
    })
}

#[cfg(test)]
mod service_struct_tests {
    use super::*;

    use girder_diag::DiagList;
    use rstest::*;

    #[rstest]
    fn marks_the_struct() {
        let file = SrcFile::new("blog/lib.rs", "/app/blog/lib.rs", "");
        let mut errs = DiagList::new();
        let dir =
            directive::parse(&file, 1, "//girder:service").unwrap();
        let item: syn::ItemStruct =
            syn::parse_str("struct BlogService { db: Database }").unwrap();
        let decl = StructDecl::from_item(&item);
        let svc = {
            let mut ctx = ParseCtx {
                file: &file,
                pkg: "blog",
                errs: &mut errs,
            };
            parse(&mut ctx, &decl, &dir, "The blog service.")
        };
        assert!(errs.is_empty());
        let svc = svc.unwrap();
        assert_eq!(svc.name, "BlogService");
        assert!(svc.init_fn.is_none());
        assert_eq!(svc.doc, "The blog service.");
    }

    #[rstest]
    fn rejects_options() {
        let file = SrcFile::new("blog/lib.rs", "/app/blog/lib.rs", "");
        let mut errs = DiagList::new();
        let dir =
            directive::parse(&file, 1, "//girder:service lazy").unwrap();
        let item: syn::ItemStruct =
            syn::parse_str("struct S;").unwrap();
        let decl = StructDecl::from_item(&item);
        let svc = {
            let mut ctx = ParseCtx {
                file: &file,
                pkg: "blog",
                errs: &mut errs,
            };
            parse(&mut ctx, &decl, &dir, "")
        };
        assert!(svc.is_none());
        assert_eq!(
            errs.first().unwrap().title,
            "unknown directive option"
        );
    }
}
