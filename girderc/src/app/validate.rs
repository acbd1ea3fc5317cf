//! Cross-cutting validation of the application descriptor. Failures are
//! collected, not fatal; later stages keep running on a partial app.

use crate::app::AppDesc;
use crate::directive::Selector;
use crate::resources::Access;
use crate::respath::registry::{Conflict, PathRegistry};

use girder_diag::srcloc::{LocKind, SrcLocation};
use girder_diag::{DiagList, ErrInSrc, ErrTemplate};

use std::collections::HashMap;

pub const ERR_DUPLICATE_PATH: ErrTemplate = ErrTemplate {
    code: 3101,
    title: "duplicate path",
    summary: "two endpoints register the same method and path",
    detail: None,
    internal: false,
};

pub const ERR_PATH_CONFLICT: ErrTemplate = ErrTemplate {
    code: 3102,
    title: "path conflict",
    summary: "two endpoint paths cannot coexist",
    detail: None,
    internal: false,
};

pub const ERR_NO_AUTH_HANDLER: ErrTemplate = ErrTemplate {
    code: 3103,
    title: "no auth handler defined",
    summary: "an endpoint requires auth but the application defines no \
              auth handler",
    detail: Some(
        "Declare exactly one function with //girder:authhandler, or \
         change the endpoint's access to public or private.",
    ),
    internal: false,
};

pub const ERR_RECEIVER_MISMATCH: ErrTemplate = ErrTemplate {
    code: 3104,
    title: "receiver mismatch",
    summary: "the method receiver is not the service's service struct",
    detail: None,
    internal: false,
};

pub const ERR_DUPLICATE_TOPIC: ErrTemplate = ErrTemplate {
    code: 3105,
    title: "duplicate topic",
    summary: "two topics share a name",
    detail: None,
    internal: false,
};

pub const ERR_UNKNOWN_TOPIC: ErrTemplate = ErrTemplate {
    code: 3106,
    title: "unknown topic",
    summary: "the subscription references a topic that does not exist",
    detail: None,
    internal: false,
};

pub const ERR_DUPLICATE_SUBSCRIPTION: ErrTemplate = ErrTemplate {
    code: 3107,
    title: "duplicate subscription",
    summary: "subscription names must be unique per topic",
    detail: None,
    internal: false,
};

pub const WARN_UNKNOWN_TARGET_TAG: ErrTemplate = ErrTemplate {
    code: 3108,
    title: "unknown middleware target",
    summary: "the middleware targets a tag no endpoint carries",
    detail: None,
    internal: false,
};

/// Runs every descriptor-level rule, appending diagnostics.
pub fn validate(desc: &AppDesc, errs: &mut DiagList) {
    check_paths(desc, errs);
    check_auth(desc, errs);
    check_receivers(desc, errs);
    check_middleware_targets(desc, errs);
    check_pubsub(desc, errs);
}

fn check_paths(desc: &AppDesc, errs: &mut DiagList) {
    let mut registry = PathRegistry::new();
    // First registrant of each rendered path, for conflict locations.
    let mut first_loc: HashMap<String, SrcLocation> = HashMap::new();

    for (_, ep) in desc.endpoints() {
        let rendered = ep.path.to_string();
        for method in &ep.methods {
            match registry.add(*method, &ep.path) {
                Ok(()) => {
                    first_loc
                        .entry(rendered.clone())
                        .or_insert_with(|| ep.name_loc.clone());
                }
                Err(conflict) => {
                    let template = match &conflict {
                        Conflict::Duplicate { .. } => &ERR_DUPLICATE_PATH,
                        _ => &ERR_PATH_CONFLICT,
                    };
                    let mut err = ErrInSrc::new(template)
                        .summary(conflict.to_string())
                        .at(ep.name_loc.clone());
                    let (existing, _) = conflict.paths();
                    if let Some(loc) = first_loc.get(existing) {
                        let mut other = loc.clone();
                        other.kind = LocKind::Help;
                        other.text =
                            Some(String::from("also registered here"));
                        err = err.at(other);
                    }
                    errs.push(err);
                    break;
                }
            }
        }
    }
}

fn check_auth(desc: &AppDesc, errs: &mut DiagList) {
    if desc.auth_handler.is_some() {
        return;
    }
    for (_, ep) in desc.endpoints() {
        if ep.access == Access::Auth {
            errs.push(
                ErrInSrc::new(&ERR_NO_AUTH_HANDLER).at(ep.name_loc.clone()),
            );
        }
    }
}

fn check_receivers(desc: &AppDesc, errs: &mut DiagList) {
    for svc in &desc.services {
        let struct_name =
            svc.service_struct.as_ref().map(|s| s.name.as_str());
        for ep in &svc.endpoints {
            if let Some(recv) = &ep.recv {
                if struct_name != Some(recv.as_str()) {
                    errs.push(receiver_err(recv, struct_name, &ep.name_loc));
                }
            }
        }
        for mw in &svc.middleware {
            if let Some(recv) = &mw.recv {
                if struct_name != Some(recv.as_str()) {
                    errs.push(receiver_err(recv, struct_name, &mw.name_loc));
                }
            }
        }
    }
}

fn receiver_err(
    recv: &str,
    struct_name: Option<&str>,
    loc: &SrcLocation,
) -> ErrInSrc {
    let summary = match struct_name {
        Some(name) => format!(
            "the receiver is '{}' but the service struct is '{}'",
            recv, name
        ),
        None => format!(
            "the receiver is '{}' but the service declares no service \
             struct",
            recv
        ),
    };
    ErrInSrc::new(&ERR_RECEIVER_MISMATCH)
        .summary(summary)
        .at(loc.clone())
}

fn check_middleware_targets(desc: &AppDesc, errs: &mut DiagList) {
    let all_tags: Vec<&Selector> = desc
        .endpoints()
        .flat_map(|(_, ep)| ep.tags.iter())
        .collect();

    let mut check = |mw: &crate::resources::Middleware,
                     tags: &dyn Fn(&Selector) -> bool| {
        for sel in mw.target.iter() {
            if let Selector::Tag(_) = sel {
                if !tags(sel) {
                    let mut loc = mw.name_loc.clone();
                    loc.kind = LocKind::Warning;
                    errs.push(
                        ErrInSrc::new(&WARN_UNKNOWN_TARGET_TAG)
                            .summary(format!(
                                "no endpoint carries '{}'",
                                sel
                            ))
                            .at(loc),
                    );
                }
            }
        }
    };

    for mw in &desc.global_middleware {
        check(mw, &|sel| all_tags.contains(&sel));
    }
    for svc in &desc.services {
        let svc_tags: Vec<&Selector> = svc
            .endpoints
            .iter()
            .flat_map(|ep| ep.tags.iter())
            .collect();
        for mw in &svc.middleware {
            check(mw, &|sel| svc_tags.contains(&sel));
        }
    }
}

fn check_pubsub(desc: &AppDesc, errs: &mut DiagList) {
    let mut topic_names: Vec<&str> = Vec::new();
    for topic in &desc.topics {
        if topic_names.contains(&topic.name.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_DUPLICATE_TOPIC)
                    .summary(format!(
                        "topic '{}' is declared more than once",
                        topic.name
                    ))
                    .at(topic.name_loc.clone()),
            );
        } else {
            topic_names.push(&topic.name);
        }
    }

    let mut seen_subs: Vec<(&str, &str)> = Vec::new();
    for sub in &desc.subscriptions {
        if !topic_names.contains(&sub.topic.as_str()) {
            errs.push(
                ErrInSrc::new(&ERR_UNKNOWN_TOPIC)
                    .summary(format!(
                        "subscription '{}' references unknown topic '{}'",
                        sub.name, sub.topic
                    ))
                    .at(sub.name_loc.clone()),
            );
            continue;
        }
        let key = (sub.topic.as_str(), sub.name.as_str());
        if seen_subs.contains(&key) {
            errs.push(
                ErrInSrc::new(&ERR_DUPLICATE_SUBSCRIPTION)
                    .summary(format!(
                        "topic '{}' already has a subscription named '{}'",
                        sub.topic, sub.name
                    ))
                    .at(sub.name_loc.clone()),
            );
        } else {
            seen_subs.push(key);
        }
    }
}
