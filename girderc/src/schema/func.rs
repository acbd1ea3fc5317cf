//! Function signature extraction.

use super::ty::Ty;

use proc_macro2::Span;

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: Option<String>,
    pub ty: Ty,
    pub span: Span,
}

/// What a function returns, with `Result` unwrapped one level.
#[derive(Clone, Debug)]
pub enum FnOutput {
    /// No return type, or `-> ()`.
    Unit,
    /// A bare (non-`Result`) return type.
    Plain(Ty),
    /// `-> Result<T, E>`; `ok` is `T`.
    Result { ok: Ty },
}

impl FnOutput {
    pub fn is_result(&self) -> bool {
        matches!(self, FnOutput::Result { .. })
    }
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub output: FnOutput,
    /// The `impl` type name when the function is a method.
    pub recv: Option<String>,
    pub name_span: Span,
    pub sig_span: Span,
}

impl FuncDecl {
    pub fn from_item_fn(item: &syn::ItemFn) -> FuncDecl {
        from_signature(&item.sig, None)
    }

    pub fn from_impl_fn(self_ty: &str, item: &syn::ImplItemFn) -> FuncDecl {
        from_signature(&item.sig, Some(self_ty.to_string()))
    }
}

fn from_signature(sig: &syn::Signature, recv: Option<String>) -> FuncDecl {
    use syn::spanned::Spanned;

    let type_params: Vec<String> = sig
        .generics
        .type_params()
        .map(|p| p.ident.to_string())
        .collect();

    let mut params = Vec::new();
    for input in &sig.inputs {
        match input {
            // The `self` receiver is implied by `recv`.
            syn::FnArg::Receiver(_) => {}
            syn::FnArg::Typed(pt) => {
                let name = match pt.pat.as_ref() {
                    syn::Pat::Ident(pi) => Some(pi.ident.to_string()),
                    _ => None,
                };
                params.push(ParamDecl {
                    name,
                    ty: Ty::from_syn(&pt.ty, &type_params),
                    span: pt.ty.span(),
                });
            }
        }
    }

    let output = match &sig.output {
        syn::ReturnType::Default => FnOutput::Unit,
        syn::ReturnType::Type(_, ty) => output_from_type(ty, &type_params),
    };

    FuncDecl {
        name: sig.ident.to_string(),
        params,
        output,
        recv,
        name_span: sig.ident.span(),
        sig_span: sig.span(),
    }
}

fn output_from_type(ty: &syn::Type, type_params: &[String]) -> FnOutput {
    if let syn::Type::Path(tp) = ty {
        if let Some(seg) = tp.path.segments.last() {
            if seg.ident == "Result" {
                if let syn::PathArguments::AngleBracketed(ab) = &seg.arguments
                {
                    let mut types = ab.args.iter().filter_map(|a| match a {
                        syn::GenericArgument::Type(t) => Some(t),
                        _ => None,
                    });
                    if let Some(ok) = types.next() {
                        return FnOutput::Result {
                            ok: Ty::from_syn(ok, type_params),
                        };
                    }
                }
            }
        }
    }
    match Ty::from_syn(ty, type_params) {
        Ty::Unit => FnOutput::Unit,
        other => FnOutput::Plain(other),
    }
}

#[cfg(test)]
mod func_tests {
    use super::*;

    use crate::schema::ty::Builtin;
    use rstest::*;

    fn decl(src: &str) -> FuncDecl {
        let item: syn::ItemFn = syn::parse_str(src).unwrap();
        FuncDecl::from_item_fn(&item)
    }

    #[rstest]
    fn extracts_named_params() {
        let f = decl("fn get(ctx: Context, id: u64) -> Result<Blog, Error> { todo!() }");
        assert_eq!(f.name, "get");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].name.as_deref(), Some("ctx"));
        assert!(f.params[0].ty.is_named("Context"));
        assert_eq!(f.params[1].ty.builtin(), Some(Builtin::U64));
        assert!(f.recv.is_none());
    }

    #[rstest]
    fn result_outputs_unwrap() {
        let f = decl("fn list() -> Result<Vec<Post>, Error> { todo!() }");
        match &f.output {
            FnOutput::Result { ok } => assert!(matches!(ok, Ty::List(_))),
            other => panic!("unexpected output: {:?}", other),
        }
        assert!(f.output.is_result());
    }

    #[rstest]
    fn unit_and_plain_outputs() {
        assert!(matches!(decl("fn a() {}").output, FnOutput::Unit));
        assert!(matches!(decl("fn b() -> () {}").output, FnOutput::Unit));
        assert!(matches!(
            decl("fn c() -> Response { todo!() }").output,
            FnOutput::Plain(_)
        ));
    }

    #[rstest]
    fn tuple_result_carries_both_types() {
        let f = decl(
            "fn auth(ctx: Context, token: String) \
             -> Result<(UserID, AuthData), Error> { todo!() }",
        );
        match &f.output {
            FnOutput::Result { ok: Ty::Tuple(elems) } => {
                assert_eq!(elems.len(), 2);
                assert!(elems[0].is_named("UserID"));
                assert!(elems[1].is_named("AuthData"));
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[rstest]
    fn impl_methods_carry_the_receiver() {
        let item: syn::ImplItemFn = syn::parse_str(
            "fn list(&self, ctx: Context) -> Result<(), Error> { todo!() }",
        )
        .unwrap();
        let f = FuncDecl::from_impl_fn("Service", &item);
        assert_eq!(f.recv.as_deref(), Some("Service"));
        assert_eq!(f.params.len(), 1);
    }
}
