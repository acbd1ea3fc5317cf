//! The structural type model the resource parsers query.

use crate::respath::ParamType;

use std::fmt;

/// Builtin leaf types understood by the framework.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Builtin {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Uuid,
    Bytes,
}

impl Builtin {
    pub fn from_ident(name: &str) -> Option<Builtin> {
        Some(match name {
            "String" | "str" => Builtin::String,
            "bool" => Builtin::Bool,
            "i8" => Builtin::I8,
            "i16" => Builtin::I16,
            "i32" => Builtin::I32,
            "i64" => Builtin::I64,
            "u8" => Builtin::U8,
            "u16" => Builtin::U16,
            "u32" => Builtin::U32,
            "u64" => Builtin::U64,
            "f32" => Builtin::F32,
            "f64" => Builtin::F64,
            "Uuid" => Builtin::Uuid,
            _ => return None,
        })
    }

    /// The path-parameter type a builtin can decode from, if any.
    pub fn param_type(self) -> Option<ParamType> {
        Some(match self {
            Builtin::String => ParamType::String,
            Builtin::Bool => ParamType::Bool,
            Builtin::I8 => ParamType::Int8,
            Builtin::I16 => ParamType::Int16,
            Builtin::I32 => ParamType::Int32,
            Builtin::I64 => ParamType::Int64,
            Builtin::U8 => ParamType::Uint8,
            Builtin::U16 => ParamType::Uint16,
            Builtin::U32 => ParamType::Uint32,
            Builtin::U64 => ParamType::Uint64,
            Builtin::Uuid => ParamType::Uuid,
            Builtin::F32 | Builtin::F64 | Builtin::Bytes => return None,
        })
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Builtin::String => "String",
            Builtin::Bool => "bool",
            Builtin::I8 => "i8",
            Builtin::I16 => "i16",
            Builtin::I32 => "i32",
            Builtin::I64 => "i64",
            Builtin::U8 => "u8",
            Builtin::U16 => "u16",
            Builtin::U32 => "u32",
            Builtin::U64 => "u64",
            Builtin::F32 => "f32",
            Builtin::F64 => "f64",
            Builtin::Uuid => "Uuid",
            Builtin::Bytes => "Bytes",
        };
        write!(f, "{}", name)
    }
}

/// A structural view of a Rust type, sufficient for signature checking.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Ty {
    Builtin(Builtin),
    Named { path: Vec<String> },
    Map { key: Box<Ty>, value: Box<Ty> },
    List(Box<Ty>),
    Pointer(Box<Ty>),
    Option(Box<Ty>),
    Tuple(Vec<Ty>),
    TraitObject(String),
    TypeParam(String),
    Unit,
    Unsupported,
}

impl Ty {
    /// Converts a `syn` type; `type_params` are the in-scope generics.
    pub fn from_syn(ty: &syn::Type, type_params: &[String]) -> Ty {
        match ty {
            syn::Type::Path(tp) => {
                if tp.qself.is_some() {
                    return Ty::Unsupported;
                }
                from_type_path(&tp.path, type_params)
            }
            syn::Type::Reference(r) => {
                Ty::Pointer(Box::new(Ty::from_syn(&r.elem, type_params)))
            }
            syn::Type::Slice(s) => {
                Ty::List(Box::new(Ty::from_syn(&s.elem, type_params)))
            }
            syn::Type::Array(a) => {
                Ty::List(Box::new(Ty::from_syn(&a.elem, type_params)))
            }
            syn::Type::Tuple(t) => {
                if t.elems.is_empty() {
                    Ty::Unit
                } else {
                    Ty::Tuple(
                        t.elems
                            .iter()
                            .map(|e| Ty::from_syn(e, type_params))
                            .collect(),
                    )
                }
            }
            syn::Type::TraitObject(t) => {
                let name = t
                    .bounds
                    .iter()
                    .find_map(|b| match b {
                        syn::TypeParamBound::Trait(tb) => tb
                            .path
                            .segments
                            .last()
                            .map(|s| s.ident.to_string()),
                        _ => None,
                    })
                    .unwrap_or_default();
                Ty::TraitObject(name)
            }
            syn::Type::Paren(p) => Ty::from_syn(&p.elem, type_params),
            syn::Type::Group(g) => Ty::from_syn(&g.elem, type_params),
            _ => Ty::Unsupported,
        }
    }

    /// Whether the (dereferenced) type is a named type with this final
    /// path segment.
    pub fn is_named(&self, name: &str) -> bool {
        self.deref_named() == Some(name)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Pointer(_))
    }

    /// Strips pointer layers.
    pub fn deref(&self) -> &Ty {
        match self {
            Ty::Pointer(inner) => inner.deref(),
            other => other,
        }
    }

    /// The final path segment of the dereferenced named type.
    pub fn deref_named(&self) -> Option<&str> {
        match self.deref() {
            Ty::Named { path } => path.last().map(String::as_str),
            _ => None,
        }
    }

    pub fn builtin(&self) -> Option<Builtin> {
        match self.deref() {
            Ty::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_builtin_or_list(&self) -> bool {
        match self.deref() {
            Ty::Builtin(_) => true,
            Ty::List(inner) => inner.is_builtin_or_list(),
            _ => false,
        }
    }
}

fn from_type_path(path: &syn::Path, type_params: &[String]) -> Ty {
    let last = match path.segments.last() {
        Some(seg) => seg,
        None => return Ty::Unsupported,
    };
    let ident = last.ident.to_string();
    let args = generic_args(last);

    if path.segments.len() == 1 && args.is_empty() {
        if type_params.iter().any(|p| p == &ident) {
            return Ty::TypeParam(ident);
        }
        if let Some(b) = Builtin::from_ident(&ident) {
            return Ty::Builtin(b);
        }
    }

    match (ident.as_str(), args.len()) {
        ("Option", 1) => {
            Ty::Option(Box::new(Ty::from_syn(args[0], type_params)))
        }
        ("Vec", 1) => Ty::List(Box::new(Ty::from_syn(args[0], type_params))),
        ("Box", 1) | ("Rc", 1) | ("Arc", 1) => {
            Ty::Pointer(Box::new(Ty::from_syn(args[0], type_params)))
        }
        ("HashMap", 2) | ("BTreeMap", 2) => Ty::Map {
            key: Box::new(Ty::from_syn(args[0], type_params)),
            value: Box::new(Ty::from_syn(args[1], type_params)),
        },
        _ => Ty::Named {
            path: path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect(),
        },
    }
}

fn generic_args(seg: &syn::PathSegment) -> Vec<&syn::Type> {
    match &seg.arguments {
        syn::PathArguments::AngleBracketed(ab) => ab
            .args
            .iter()
            .filter_map(|a| match a {
                syn::GenericArgument::Type(t) => Some(t),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ty::Builtin(b) => write!(f, "{}", b),
            Ty::Named { path } => write!(f, "{}", path.join("::")),
            Ty::Map { key, value } => write!(f, "Map<{}, {}>", key, value),
            Ty::List(inner) => write!(f, "[{}]", inner),
            Ty::Pointer(inner) => write!(f, "&{}", inner),
            Ty::Option(inner) => write!(f, "Option<{}>", inner),
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Ty::TraitObject(name) => write!(f, "dyn {}", name),
            Ty::TypeParam(name) => write!(f, "{}", name),
            Ty::Unit => write!(f, "()"),
            Ty::Unsupported => write!(f, "<unsupported>"),
        }
    }
}

#[cfg(test)]
mod ty_tests {
    use super::*;

    use rstest::*;

    fn ty(src: &str) -> Ty {
        let parsed: syn::Type = syn::parse_str(src).unwrap();
        Ty::from_syn(&parsed, &[])
    }

    #[rstest(
        src,
        expected,
        case("String", Ty::Builtin(Builtin::String)),
        case("bool", Ty::Builtin(Builtin::Bool)),
        case("u64", Ty::Builtin(Builtin::U64)),
        case("()", Ty::Unit)
    )]
    fn builtins_map(src: &str, expected: Ty) {
        assert_eq!(ty(src), expected);
    }

    #[rstest]
    fn containers_unwrap() {
        assert_eq!(
            ty("Vec<String>"),
            Ty::List(Box::new(Ty::Builtin(Builtin::String)))
        );
        assert_eq!(
            ty("Option<u32>"),
            Ty::Option(Box::new(Ty::Builtin(Builtin::U32)))
        );
        assert_eq!(
            ty("Box<Params>"),
            Ty::Pointer(Box::new(Ty::Named {
                path: vec![String::from("Params")]
            }))
        );
        assert!(matches!(ty("HashMap<String, u32>"), Ty::Map { .. }));
    }

    #[rstest]
    fn references_are_pointers() {
        let t = ty("&SignupParams");
        assert!(t.is_pointer());
        assert_eq!(t.deref_named(), Some("SignupParams"));
        assert!(t.is_named("SignupParams"));
    }

    #[rstest]
    fn qualified_paths_keep_segments() {
        let t = ty("girder::api::Context");
        assert!(t.is_named("Context"));
        match t {
            Ty::Named { path } => {
                assert_eq!(path, vec!["girder", "api", "Context"])
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[rstest]
    fn type_params_resolve() {
        let parsed: syn::Type = syn::parse_str("T").unwrap();
        let t = Ty::from_syn(&parsed, &[String::from("T")]);
        assert_eq!(t, Ty::TypeParam(String::from("T")));
    }

    #[rstest]
    fn builtin_or_list_queries() {
        assert!(ty("String").is_builtin_or_list());
        assert!(ty("Vec<u8>").is_builtin_or_list());
        assert!(!ty("Params").is_builtin_or_list());
    }

    #[rstest]
    fn param_type_mapping() {
        assert_eq!(
            Builtin::U32.param_type(),
            Some(crate::respath::ParamType::Uint32)
        );
        assert_eq!(Builtin::F64.param_type(), None);
    }
}
