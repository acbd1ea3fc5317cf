//! Pub/sub resource parsers: `//girder:topic` on a static declaration
//! and `//girder:subscription` on a handler function.

use crate::directive::{self, Directive, DirectiveSpec, Token};
use crate::resources::ParseCtx;
use crate::schema::{FnOutput, FuncDecl, Ty};

use girder_diag::srcloc::{LocKind, SrcFile, SrcLocation};
use girder_diag::{ErrInSrc, ErrTemplate};

use std::sync::Arc;

pub const ERR_INVALID_TOPIC: ErrTemplate = ErrTemplate {
    code: 2301,
    title: "invalid topic",
    summary: "topics are static declarations of type Topic<Message>",
    detail: None,
    internal: false,
};

pub const ERR_INVALID_SUBSCRIPTION: ErrTemplate = ErrTemplate {
    code: 2302,
    title: "invalid subscription",
    summary: "the subscription declaration is not well formed",
    detail: None,
    internal: false,
};

/// A named pub/sub topic.
#[derive(Clone, Debug)]
pub struct Topic {
    pub name: String,
    /// The static's identifier.
    pub bind_name: String,
    pub message_type: String,
    /// The enclosing service, when the topic lives inside one.
    pub service: Option<String>,
    pub doc: String,
    pub file: Arc<SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

/// A subscription handler linked to a topic.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub name: String,
    pub topic: String,
    /// The service containing the subscription's file.
    pub service: Option<String>,
    pub handler: String,
    pub file: Arc<SrcFile>,
    pub name_loc: SrcLocation,
    pub line: u32,
}

const TOPIC_SPEC: DirectiveSpec<'static> = DirectiveSpec {
    name: "topic",
    allowed_options: &[],
    allowed_fields: &["name"],
    allow_tags: false,
    validate_field: None,
};

/// Parses a topic declaration. The topic name defaults to the static's
/// identifier, lowercased.
pub fn parse_topic(
    ctx: &mut ParseCtx<'_>,
    ident: &str,
    ident_span: proc_macro2::Span,
    static_ty: &syn::Type,
    dir: &Directive,
    doc: &str,
) -> Option<Topic> {
    if !directive::validate(dir, &TOPIC_SPEC, ctx.errs) {
        return None;
    }

    let name_loc =
        SrcLocation::from_span(ctx.file, ident_span, LocKind::Error, None);

    let message_type = match topic_message_type(static_ty) {
        Some(ty) => ty,
        None => {
            ctx.errs
                .push(ErrInSrc::new(&ERR_INVALID_TOPIC).at(name_loc));
            return None;
        }
    };

    let name = dir
        .field_value("name")
        .map(String::from)
        .unwrap_or_else(|| ident.to_lowercase());

    Some(Topic {
        name,
        bind_name: ident.to_string(),
        message_type,
        service: None,
        doc: doc.to_string(),
        file: Arc::clone(ctx.file),
        name_loc: SrcLocation::from_span(
            ctx.file,
            ident_span,
            LocKind::Error,
            None,
        ),
        line: dir.line,
    })
}

/// Extracts `M` from a `Topic<M>` type.
fn topic_message_type(ty: &syn::Type) -> Option<String> {
    let tp = match ty {
        syn::Type::Path(tp) => tp,
        _ => return None,
    };
    let seg = tp.path.segments.last()?;
    if seg.ident != "Topic" {
        return None;
    }
    let args = match &seg.arguments {
        syn::PathArguments::AngleBracketed(ab) => ab,
        _ => return None,
    };
    let arg = args.args.iter().find_map(|a| match a {
        syn::GenericArgument::Type(t) => Some(t),
        _ => None,
    })?;
    Some(Ty::from_syn(arg, &[]).to_string())
}

fn subscription_spec<'a>(
    check: &'a dyn Fn(&str, &Token) -> Option<ErrInSrc>,
) -> DirectiveSpec<'a> {
    DirectiveSpec {
        name: "subscription",
        allowed_options: &[],
        allowed_fields: &["topic", "name"],
        allow_tags: false,
        validate_field: Some(check),
    }
}

/// Parses a subscription handler. Topic existence and per-topic name
/// uniqueness are checked when the descriptor is built.
pub fn parse_subscription(
    ctx: &mut ParseCtx<'_>,
    func: &FuncDecl,
    dir: &Directive,
) -> Option<Subscription> {
    let check = |key: &str, value: &Token| -> Option<ErrInSrc> {
        if key == "name" && !is_resource_name(&value.value) {
            Some(
                ErrInSrc::new(&ERR_INVALID_SUBSCRIPTION)
                    .summary(format!(
                        "invalid subscription name '{}'",
                        value.value
                    ))
                    .detail(
                        "Names are lowercase alphanumerics separated by \
                         dashes or underscores.",
                    )
                    .at(value.loc.clone()),
            )
        } else {
            None
        }
    };
    if !directive::validate(dir, &subscription_spec(&check), ctx.errs) {
        return None;
    }

    let sig_loc =
        SrcLocation::from_span(ctx.file, func.sig_span, LocKind::Error, None);

    let topic = match dir.field_value("topic") {
        Some(topic) => topic.to_string(),
        None => {
            ctx.errs.push(
                ErrInSrc::new(&ERR_INVALID_SUBSCRIPTION)
                    .summary("subscriptions require a topic field")
                    .at(dir.loc.clone()),
            );
            return None;
        }
    };
    let name = match dir.field_value("name") {
        Some(name) => name.to_string(),
        None => {
            ctx.errs.push(
                ErrInSrc::new(&ERR_INVALID_SUBSCRIPTION)
                    .summary("subscriptions require a name field")
                    .at(dir.loc.clone()),
            );
            return None;
        }
    };

    let sig_ok = func.params.len() == 2
        && func.params[0].ty.is_named("Context")
        && matches!(&func.output, FnOutput::Result { ok: Ty::Unit });
    if !sig_ok {
        ctx.errs.push(
            ErrInSrc::new(&ERR_INVALID_SUBSCRIPTION)
                .summary(
                    "subscription handlers take (Context, Message) and \
                     return Result<(), _>",
                )
                .at(sig_loc),
        );
        return None;
    }

    Some(Subscription {
        name,
        topic,
        service: None,
        handler: func.name.clone(),
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

fn is_resource_name(s: &str) -> bool {
    let first_ok = s.chars().next().map_or(false, |c| c.is_ascii_lowercase());
    let last_ok = s
        .chars()
        .last()
        .map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit());
    first_ok
        && last_ok
        && s.chars().all(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '-'
                || c == '_'
        })
}
