//! Service discovery and descriptor assembly from per-file binds.

use crate::app::{AppDesc, Gateway, Service, DEFAULT_GATEWAY_NAME};
use crate::resources::{Bind, Resource};

use girder_diag::{DiagList, ErrInSrc, ErrTemplate};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const ERR_NESTED_SERVICES: ErrTemplate = ErrTemplate {
    code: 3001,
    title: "nested services",
    summary: "a service cannot live inside another service",
    detail: None,
    internal: false,
};

pub const ERR_MULTIPLE_AUTH_HANDLERS: ErrTemplate = ErrTemplate {
    code: 3002,
    title: "multiple auth handlers",
    summary: "an application defines at most one auth handler",
    detail: None,
    internal: false,
};

pub const ERR_MULTIPLE_SERVICE_STRUCTS: ErrTemplate = ErrTemplate {
    code: 3003,
    title: "multiple service structs",
    summary: "a service defines at most one service struct",
    detail: None,
    internal: false,
};

/// A free `init` function candidate for service-struct pairing.
#[derive(Clone, Debug)]
pub struct InitFn {
    /// Directory of the defining file, relative to the app root.
    pub dir: PathBuf,
    pub fn_name: String,
    /// The struct name it returns, when the return is `Result<T, _>`.
    pub returns: Option<String>,
}

/// Whether a resource roots a service at its directory.
fn roots_service(resource: &Resource) -> bool {
    matches!(
        resource,
        Resource::Endpoint(_)
            | Resource::Middleware(_)
            | Resource::ServiceStruct(_)
            | Resource::Subscription(_)
    )
}

fn bind_dir(bind: &Bind) -> PathBuf {
    bind.file
        .rel_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Builds the descriptor: discovers services, assigns resources to them
/// and pairs service structs with their `init` functions.
pub fn build(
    binds: Vec<Bind>,
    app_root_name: &str,
    init_fns: &[InitFn],
    errs: &mut DiagList,
) -> AppDesc {
    // Service roots, in lexicographic order for deterministic numbering.
    let roots: BTreeSet<PathBuf> = binds
        .iter()
        .filter(|b| roots_service(&b.resource))
        .map(bind_dir)
        .collect();

    for root in &roots {
        let nested_in = roots
            .iter()
            .find(|other| *other != root && root.starts_with(other));
        if let Some(outer) = nested_in {
            if let Some(bind) = binds
                .iter()
                .find(|b| roots_service(&b.resource) && bind_dir(b) == *root)
            {
                errs.push(
                    ErrInSrc::new(&ERR_NESTED_SERVICES)
                        .summary(format!(
                            "service '{}' is nested inside service '{}'",
                            root.display(),
                            outer.display()
                        ))
                        .at(bind.loc.clone()),
                );
            }
        }
    }

    let mut desc = AppDesc::default();
    for (i, root) in roots.iter().enumerate() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| app_root_name.to_string());
        desc.services.push(Service {
            name,
            fs_root: root.clone(),
            num: i as u32 + 1,
            endpoints: Vec::new(),
            middleware: Vec::new(),
            service_struct: None,
        });
    }

    for bind in binds {
        let dir = bind_dir(&bind);
        let svc_idx = enclosing_service(&desc.services, &dir);
        match bind.resource {
            Resource::Endpoint(mut ep) => {
                if let Some(idx) = svc_idx {
                    ep.service = desc.services[idx].name.clone();
                    desc.services[idx].endpoints.push(ep);
                }
            }
            Resource::Middleware(mut mw) => {
                if mw.global {
                    desc.global_middleware.push(mw);
                } else if let Some(idx) = svc_idx {
                    mw.service = Some(desc.services[idx].name.clone());
                    desc.services[idx].middleware.push(mw);
                }
            }
            Resource::AuthHandler(mut auth) => {
                if let Some(existing) = &desc.auth_handler {
                    errs.push(
                        ErrInSrc::new(&ERR_MULTIPLE_AUTH_HANDLERS)
                            .at(existing.name_loc.clone())
                            .at(auth.name_loc.clone()),
                    );
                    continue;
                }
                if let Some(idx) = svc_idx {
                    auth.service = desc.services[idx].name.clone();
                }
                desc.auth_handler = Some(auth);
            }
            Resource::ServiceStruct(mut ss) => {
                let idx = match svc_idx {
                    Some(idx) => idx,
                    None => continue,
                };
                if let Some(existing) = &desc.services[idx].service_struct {
                    errs.push(
                        ErrInSrc::new(&ERR_MULTIPLE_SERVICE_STRUCTS)
                            .summary(format!(
                                "service '{}' already has service struct \
                                 '{}'",
                                desc.services[idx].name, existing.name
                            ))
                            .at(existing.name_loc.clone())
                            .at(ss.name_loc.clone()),
                    );
                    continue;
                }
                ss.init_fn = init_fns
                    .iter()
                    .find(|f| {
                        f.dir == desc.services[idx].fs_root
                            && f.returns.as_deref() == Some(ss.name.as_str())
                    })
                    .map(|f| f.fn_name.clone());
                desc.services[idx].service_struct = Some(ss);
            }
            Resource::Topic(mut topic) => {
                topic.service =
                    svc_idx.map(|idx| desc.services[idx].name.clone());
                desc.topics.push(topic);
            }
            Resource::Subscription(mut sub) => {
                sub.service =
                    svc_idx.map(|idx| desc.services[idx].name.clone());
                desc.subscriptions.push(sub);
            }
        }
    }

    // Declaration order within each service.
    for svc in &mut desc.services {
        svc.endpoints
            .sort_by(|a, b| {
                (&a.file.rel_path, a.line).cmp(&(&b.file.rel_path, b.line))
            });
        svc.middleware
            .sort_by(|a, b| {
                (&a.file.rel_path, a.line).cmp(&(&b.file.rel_path, b.line))
            });
    }
    desc.global_middleware.sort_by(|a, b| {
        (&a.file.rel_path, a.line).cmp(&(&b.file.rel_path, b.line))
    });

    if desc.auth_handler.is_some() {
        desc.gateways.push(Gateway {
            name: DEFAULT_GATEWAY_NAME.to_string(),
            has_auth: true,
        });
    }

    desc
}

/// Index of the service whose root is the longest prefix of `dir`.
fn enclosing_service(services: &[Service], dir: &Path) -> Option<usize> {
    services
        .iter()
        .enumerate()
        .filter(|(_, svc)| dir.starts_with(&svc.fs_root))
        .max_by_key(|(_, svc)| svc.fs_root.components().count())
        .map(|(idx, _)| idx)
}
