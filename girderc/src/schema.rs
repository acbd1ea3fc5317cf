//! A thin structural layer over the `syn` AST: types, function
//! signatures and struct declarations with framework field attributes.

pub mod func;
pub mod ty;

pub use func::{FnOutput, FuncDecl, ParamDecl};
pub use ty::{Builtin, Ty};

use proc_macro2::Span;

/// How a struct field is transported in a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldEncoding {
    Header(String),
    Query(String),
    Cookie(String),
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Ty,
    pub encodings: Vec<FieldEncoding>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub name_span: Span,
}

impl StructDecl {
    pub fn from_item(item: &syn::ItemStruct) -> StructDecl {
        use syn::spanned::Spanned;

        let type_params: Vec<String> = item
            .generics
            .type_params()
            .map(|p| p.ident.to_string())
            .collect();

        let mut fields = Vec::new();
        for (i, field) in item.fields.iter().enumerate() {
            let name = field
                .ident
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| i.to_string());
            fields.push(FieldDecl {
                name: name.clone(),
                ty: Ty::from_syn(&field.ty, &type_params),
                encodings: field_encodings(&field.attrs, &name),
                span: field.ty.span(),
            });
        }

        StructDecl {
            name: item.ident.to_string(),
            fields,
            name_span: item.ident.span(),
        }
    }
}

/// Reads `#[girder(header = "X-Token")]`-style field attributes. The
/// encoding name defaults to the field name when no value is given.
fn field_encodings(
    attrs: &[syn::Attribute],
    field_name: &str,
) -> Vec<FieldEncoding> {
    let mut encodings = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("girder") {
            continue;
        }
        let _ = attr.parse_nested_meta(|meta| {
            let kind = if meta.path.is_ident("header") {
                Some(FieldEncoding::Header as fn(String) -> FieldEncoding)
            } else if meta.path.is_ident("query") {
                Some(FieldEncoding::Query as fn(String) -> FieldEncoding)
            } else if meta.path.is_ident("cookie") {
                Some(FieldEncoding::Cookie as fn(String) -> FieldEncoding)
            } else {
                None
            };
            if let Some(make) = kind {
                let name = match meta.value() {
                    Ok(value) => value.parse::<syn::LitStr>()?.value(),
                    Err(_) => field_name.to_string(),
                };
                encodings.push(make(name));
            }
            Ok(())
        });
    }
    encodings
}
