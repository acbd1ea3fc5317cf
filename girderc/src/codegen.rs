//! The code-generation façade: a keyed registry of generated files and
//! per-file rewriters, rendered into overlays in stable order.

pub mod rewrite;
pub mod templates;

pub use rewrite::Rewriter;
pub use templates::{DefaultTemplates, Templates};

use crate::app::AppDesc;

use girder_diag::srcloc::SrcFile;
use girder_diag::{DiagList, ErrInSrc, ErrTemplate};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ERR_RENDER: ErrTemplate = ErrTemplate {
    code: 3301,
    title: "overlay render failed",
    summary: "a generated file could not be rendered and was skipped",
    detail: None,
    internal: true,
};

const GENERATED_HEADER: &str =
    "// Code generated by girderc. DO NOT EDIT.\n\n";

/// A generated file under construction.
#[derive(Clone, Debug)]
pub struct GenFile {
    pub pkg_path: String,
    pub suffix: String,
    pub rel_path: PathBuf,
    contents: String,
}

impl GenFile {
    pub fn append(&mut self, fragment: &str) {
        self.contents.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(
            GENERATED_HEADER.len() + self.contents.len(),
        );
        out.push_str(GENERATED_HEADER);
        out.push_str(&self.contents);
        out
    }
}

/// A generated file the build substitutes for (or adds to) the on-disk
/// sources.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Overlay {
    pub source_path: PathBuf,
    pub contents: Vec<u8>,
}

/// Keyed map of generated files plus per-file rewrites.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: BTreeMap<(String, String), GenFile>,
    rewrites: BTreeMap<PathBuf, Rewriter>,
}

impl FileRegistry {
    pub fn new() -> Self {
        FileRegistry::default()
    }

    /// The generated file for `(pkg_path, suffix)`. Repeated calls
    /// return the same file.
    pub fn file(&mut self, pkg_path: &str, suffix: &str) -> &mut GenFile {
        let key = (pkg_path.to_string(), suffix.to_string());
        self.files.entry(key).or_insert_with(|| {
            let rel_path = Path::new(pkg_path)
                .join(format!("girder_gen_{}.rs", suffix));
            GenFile {
                pkg_path: pkg_path.to_string(),
                suffix: suffix.to_string(),
                rel_path,
                contents: String::new(),
            }
        })
    }

    /// Registers a file for a package outside the module layout, with an
    /// explicit directory and name.
    pub fn inject_file(
        &mut self,
        pkg_path: &str,
        name: &str,
        dir: &Path,
        suffix: &str,
        base_name: &str,
    ) -> &mut GenFile {
        let key = (pkg_path.to_string(), suffix.to_string());
        let rel_path = if name.is_empty() {
            dir.join(format!("{}_{}.rs", base_name, suffix))
        } else {
            dir.join(name)
        };
        self.files.entry(key).or_insert_with(|| GenFile {
            pkg_path: pkg_path.to_string(),
            suffix: suffix.to_string(),
            rel_path,
            contents: String::new(),
        })
    }

    /// The rewriter for a source file, created on first use.
    pub fn rewriter(&mut self, file: &Arc<SrcFile>) -> &mut Rewriter {
        self.rewrites
            .entry(file.rel_path.clone())
            .or_insert_with(|| Rewriter::new(file.contents.clone()))
    }

    /// Renders every registered file and rewrite, in stable key order.
    /// Render failures degrade to a diagnostic and skip the file.
    pub fn overlays(&self, errs: &mut DiagList) -> Vec<Overlay> {
        let mut out = Vec::new();
        for file in self.files.values() {
            if file.is_empty() {
                continue;
            }
            out.push(Overlay {
                source_path: file.rel_path.clone(),
                contents: file.render().into_bytes(),
            });
        }
        for (rel_path, rewriter) in &self.rewrites {
            if rewriter.is_empty() {
                continue;
            }
            match rewriter.render() {
                Ok(contents) => out.push(Overlay {
                    source_path: rel_path.clone(),
                    contents: contents.into_bytes(),
                }),
                Err(err) => {
                    errs.push(
                        ErrInSrc::new(&ERR_RENDER)
                            .summary(format!(
                                "rewrite of '{}' failed: {}",
                                rel_path.display(),
                                err
                            ))
                            .caused_by(err),
                    );
                }
            }
        }
        out
    }
}

/// Renders the whole descriptor through a template back-end.
pub fn generate(
    desc: &AppDesc,
    templates: &dyn Templates,
    registry: &mut FileRegistry,
) {
    for svc in &desc.services {
        let pkg = svc.fs_root.display().to_string();
        let init = templates.service_init(desc, svc);
        registry.file(&pkg, "service").append(&init);
        for ep in &svc.endpoints {
            let glue = templates.endpoint_glue(desc, svc, ep);
            registry.file(&pkg, "api").append(&glue);
        }
    }

    if let Some(auth) = &desc.auth_handler {
        let svc = desc.service(&auth.service);
        let pkg = match svc {
            Some(svc) => svc.fs_root.display().to_string(),
            None => String::new(),
        };
        let glue = templates.auth_glue(desc, auth);
        registry.file(&pkg, "auth").append(&glue);
    }

    let main = templates.main_entry(desc);
    registry
        .inject_file("", "girder_main.rs", Path::new(""), "main", "girder")
        .append(&main);
}

#[cfg(test)]
mod codegen_tests {
    use super::*;

    use rstest::*;

    #[rstest]
    fn file_lookup_is_idempotent() {
        let mut registry = FileRegistry::new();
        registry.file("blog", "api").append("first\n");
        registry.file("blog", "api").append("second\n");
        let overlays = {
            let mut errs = DiagList::new();
            registry.overlays(&mut errs)
        };
        assert_eq!(overlays.len(), 1);
        let text = String::from_utf8(overlays[0].contents.clone()).unwrap();
        assert!(text.contains("first\nsecond\n"));
        assert!(text.starts_with("// Code generated by girderc."));
        assert_eq!(
            overlays[0].source_path,
            PathBuf::from("blog/girder_gen_api.rs")
        );
    }

    #[rstest]
    fn overlays_are_emitted_in_stable_key_order() {
        let mut registry = FileRegistry::new();
        registry.file("zeta", "api").append("z\n");
        registry.file("alpha", "api").append("a\n");
        registry.file("alpha", "service").append("s\n");
        let mut errs = DiagList::new();
        let overlays = registry.overlays(&mut errs);
        let paths: Vec<String> = overlays
            .iter()
            .map(|o| o.source_path.display().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "alpha/girder_gen_api.rs",
                "alpha/girder_gen_service.rs",
                "zeta/girder_gen_api.rs",
            ]
        );
    }

    #[rstest]
    fn empty_files_are_not_emitted() {
        let mut registry = FileRegistry::new();
        registry.file("blog", "api");
        let mut errs = DiagList::new();
        assert!(registry.overlays(&mut errs).is_empty());
    }

    #[rstest]
    fn rewrites_render_against_original_offsets() {
        let file = SrcFile::new(
            "blog/api.rs",
            "/app/blog/api.rs",
            "fn a() {}\n",
        );
        let mut registry = FileRegistry::new();
        registry.rewriter(&file).insert(0, "// generated\n");
        let mut errs = DiagList::new();
        let overlays = registry.overlays(&mut errs);
        assert_eq!(overlays.len(), 1);
        assert_eq!(
            overlays[0].contents,
            b"// generated\nfn a() {}\n".to_vec()
        );
    }

    #[rstest]
    fn failed_rewrites_degrade_to_diagnostics() {
        let file = SrcFile::new("x.rs", "/x.rs", "ab");
        let mut registry = FileRegistry::new();
        registry.rewriter(&file).insert(99, "boom");
        let mut errs = DiagList::new();
        let overlays = registry.overlays(&mut errs);
        assert!(overlays.is_empty());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.first().unwrap().title, "overlay render failed");
    }
}
