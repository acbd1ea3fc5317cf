//! Orchestration: loads sources, extracts directives, dispatches the
//! resource parsers and assembles the pipeline output. Stages run
//! sequentially; diagnostics accumulate and only cancellation or an
//! unreadable source tree aborts the run.

use crate::app::discover::{self, InitFn};
use crate::app::{validate, AppDesc};
use crate::codegen::{self, DefaultTemplates, FileRegistry, Overlay};
use crate::directive::{self, Directive};
use crate::resources::{
    auth_handler, endpoint, middleware, pubsub, service_struct, Bind,
    ParseCtx, Resource,
};
use crate::schema::{FnOutput, FuncDecl, StructDecl};
use crate::usage::{self, UsageMap};
use crate::util::FileSource;

use girder_diag::errmeta::{meta, MetaError};
use girder_diag::srcloc::{LocKind, Pos, SrcFile, SrcLocation};
use girder_diag::{Bailout, DiagList, DiagResult, ErrInSrc, ErrTemplate};

use log::debug;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const ERR_READ: ErrTemplate = ErrTemplate {
    code: 4001,
    title: "cannot read sources",
    summary: "the application sources could not be read",
    detail: None,
    internal: false,
};

pub const ERR_SOURCE_PARSE: ErrTemplate = ErrTemplate {
    code: 4002,
    title: "syntax error",
    summary: "the file could not be parsed",
    detail: None,
    internal: false,
};

pub const ERR_CANCELLED: ErrTemplate = ErrTemplate {
    code: 4003,
    title: "compilation cancelled",
    summary: "the pipeline run was cancelled",
    detail: None,
    internal: false,
};

pub const ERR_UNKNOWN_DIRECTIVE: ErrTemplate = ErrTemplate {
    code: 4004,
    title: "unknown directive",
    summary: "the directive name is not recognized",
    detail: Some(
        "Known directives: api, middleware, authhandler, service, topic, \
         subscription.",
    ),
    internal: false,
};

pub const ERR_DIRECTIVE_TARGET: ErrTemplate = ErrTemplate {
    code: 4005,
    title: "misplaced directive",
    summary: "the directive cannot apply to this declaration",
    detail: None,
    internal: false,
};

pub const ERR_DANGLING_DIRECTIVE: ErrTemplate = ErrTemplate {
    code: 4006,
    title: "dangling directive",
    summary: "the directive is not attached to any declaration",
    detail: None,
    internal: false,
};

/// Cooperative cancellation, checked at per-file boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct PipelineParams<'a> {
    pub app_root: &'a Path,
    pub source: &'a dyn FileSource,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub desc: AppDesc,
    pub usages: UsageMap,
    pub overlays: Vec<Overlay>,
    pub diagnostics: DiagList,
}

struct ParsedFile {
    file: Arc<SrcFile>,
    ast: syn::File,
}

/// Runs the whole pipeline once.
pub fn run(params: &PipelineParams<'_>) -> DiagResult<PipelineOutput> {
    let mut errs = DiagList::new();

    let rel_files = params
        .source
        .list_files(params.app_root)
        .map_err(|err| read_bailout(err, params.app_root))?;
    debug!("pipeline: {} source file(s)", rel_files.len());

    let mut parsed: Vec<ParsedFile> = Vec::new();
    for rel in rel_files {
        check_cancel(&params.cancel)?;
        let text = match params.source.read_file(params.app_root, &rel) {
            Ok(text) => text,
            Err(err) => {
                let cause = MetaError::wrap(
                    err,
                    "pipeline",
                    "read source file",
                    meta(&[(
                        "path",
                        serde_json::json!(rel.display().to_string()),
                    )]),
                );
                errs.push(
                    ErrInSrc::new(&ERR_READ)
                        .summary(format!(
                            "cannot read '{}'",
                            rel.display()
                        ))
                        .caused_by(cause),
                );
                continue;
            }
        };
        let file =
            SrcFile::new(rel.clone(), params.app_root.join(&rel), text);
        match syn::parse_file(&file.contents) {
            Ok(ast) => parsed.push(ParsedFile { file, ast }),
            Err(err) => {
                let loc = SrcLocation::from_span(
                    &file,
                    err.span(),
                    LocKind::Error,
                    None,
                );
                errs.push(
                    ErrInSrc::new(&ERR_SOURCE_PARSE)
                        .summary(err.to_string())
                        .at(loc),
                );
            }
        }
    }
    debug!("pipeline: {} file(s) parsed", parsed.len());

    // Struct declarations per package, for auth-params resolution.
    let mut structs_by_dir: HashMap<PathBuf, HashMap<String, StructDecl>> =
        HashMap::new();
    for pf in &parsed {
        let dir = file_dir(&pf.file);
        let map = structs_by_dir.entry(dir).or_insert_with(HashMap::new);
        for item in &pf.ast.items {
            if let syn::Item::Struct(s) = item {
                let decl = StructDecl::from_item(s);
                map.insert(decl.name.clone(), decl);
            }
        }
    }

    let empty_structs = HashMap::new();
    let app_root_name = params
        .app_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("app"));

    let mut binds: Vec<Bind> = Vec::new();
    let mut init_fns: Vec<InitFn> = Vec::new();
    for pf in &parsed {
        check_cancel(&params.cancel)?;
        let dir = file_dir(&pf.file);
        let pkg = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| app_root_name.clone());
        let structs = structs_by_dir.get(&dir).unwrap_or(&empty_structs);
        extract_file(
            &mut errs,
            pf,
            &pkg,
            structs,
            &mut binds,
            &mut init_fns,
        );
    }
    debug!(
        "pipeline: {} bind(s), {} init candidate(s)",
        binds.len(),
        init_fns.len()
    );

    let desc = discover::build(binds, &app_root_name, &init_fns, &mut errs);
    validate::validate(&desc, &mut errs);

    check_cancel(&params.cancel)?;
    let files: Vec<(Arc<SrcFile>, syn::File)> = parsed
        .into_iter()
        .map(|pf| (pf.file, pf.ast))
        .collect();
    let usages = usage::link(&desc, &files, &mut errs);

    let mut registry = FileRegistry::new();
    codegen::generate(&desc, &DefaultTemplates, &mut registry);
    let overlays = registry.overlays(&mut errs);
    debug!("pipeline: {} overlay(s)", overlays.len());

    errs.sort();
    Ok(PipelineOutput {
        desc,
        usages,
        overlays,
        diagnostics: errs,
    })
}

fn file_dir(file: &SrcFile) -> PathBuf {
    file.rel_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn check_cancel(cancel: &CancelToken) -> DiagResult<()> {
    if cancel.is_cancelled() {
        return Err(Bailout::from(ErrInSrc::new(&ERR_CANCELLED)));
    }
    Ok(())
}

fn read_bailout(err: io::Error, root: &Path) -> Bailout {
    let cause = MetaError::wrap(
        err,
        "pipeline",
        "list source files",
        meta(&[("root", serde_json::json!(root.display().to_string()))]),
    );
    Bailout::from(
        ErrInSrc::new(&ERR_READ)
            .summary(format!(
                "cannot list sources under '{}'",
                root.display()
            ))
            .caused_by(cause),
    )
}

/// Extracts resources from one parsed file.
fn extract_file(
    errs: &mut DiagList,
    pf: &ParsedFile,
    pkg: &str,
    structs: &HashMap<String, StructDecl>,
    binds: &mut Vec<Bind>,
    init_fns: &mut Vec<InitFn>,
) {
    use syn::spanned::Spanned;

    let lines: Vec<&str> = pf.file.contents.lines().collect();
    let mut consumed: Vec<u32> = Vec::new();

    for item in &pf.ast.items {
        match item {
            syn::Item::Fn(f) => {
                let decl_line = item.span().start().line as u32;
                let (dir, doc) = attached_directive(
                    errs,
                    &pf.file,
                    &lines,
                    decl_line,
                    &mut consumed,
                );
                let func = FuncDecl::from_item_fn(f);
                match dir {
                    Some(dir) => dispatch_fn(
                        errs, &pf.file, pkg, structs, binds, func, dir, doc,
                    ),
                    None => {
                        if func.name == "init" {
                            init_fns.push(InitFn {
                                dir: file_dir(&pf.file),
                                fn_name: func.name.clone(),
                                returns: init_return(&func),
                            });
                        }
                    }
                }
            }
            syn::Item::Struct(s) => {
                let decl_line = item.span().start().line as u32;
                let (dir, doc) = attached_directive(
                    errs,
                    &pf.file,
                    &lines,
                    decl_line,
                    &mut consumed,
                );
                let dir = match dir {
                    Some(dir) => dir,
                    None => continue,
                };
                if dir.name != "service" {
                    push_target_err(errs, &dir, "a type declaration");
                    continue;
                }
                let decl = StructDecl::from_item(s);
                let parsed = {
                    let mut ctx = ParseCtx {
                        file: &pf.file,
                        pkg,
                        errs: &mut *errs,
                    };
                    service_struct::parse(&mut ctx, &decl, &dir, &doc)
                };
                if let Some(ss) = parsed {
                    binds.push(Bind {
                        name: decl.name.clone(),
                        loc: ss.name_loc.clone(),
                        line: dir.line,
                        file: Arc::clone(&pf.file),
                        resource: Resource::ServiceStruct(ss),
                    });
                }
            }
            syn::Item::Static(st) => {
                let decl_line = item.span().start().line as u32;
                let (dir, doc) = attached_directive(
                    errs,
                    &pf.file,
                    &lines,
                    decl_line,
                    &mut consumed,
                );
                let dir = match dir {
                    Some(dir) => dir,
                    None => continue,
                };
                if dir.name != "topic" {
                    push_target_err(errs, &dir, "a static declaration");
                    continue;
                }
                let parsed = {
                    let mut ctx = ParseCtx {
                        file: &pf.file,
                        pkg,
                        errs: &mut *errs,
                    };
                    pubsub::parse_topic(
                        &mut ctx,
                        &st.ident.to_string(),
                        st.ident.span(),
                        &st.ty,
                        &dir,
                        &doc,
                    )
                };
                if let Some(topic) = parsed {
                    binds.push(Bind {
                        name: topic.bind_name.clone(),
                        loc: topic.name_loc.clone(),
                        line: dir.line,
                        file: Arc::clone(&pf.file),
                        resource: Resource::Topic(topic),
                    });
                }
            }
            syn::Item::Impl(imp) => {
                let self_ty = match imp.self_ty.as_ref() {
                    syn::Type::Path(tp) => tp
                        .path
                        .segments
                        .last()
                        .map(|seg| seg.ident.to_string()),
                    _ => None,
                };
                let self_ty = match self_ty {
                    Some(name) => name,
                    None => continue,
                };
                for impl_item in &imp.items {
                    if let syn::ImplItem::Fn(m) = impl_item {
                        let decl_line = m.span().start().line as u32;
                        let (dir, doc) = attached_directive(
                            errs,
                            &pf.file,
                            &lines,
                            decl_line,
                            &mut consumed,
                        );
                        if let Some(dir) = dir {
                            let func =
                                FuncDecl::from_impl_fn(&self_ty, m);
                            dispatch_fn(
                                errs, &pf.file, pkg, structs, binds, func,
                                dir, doc,
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    for (i, raw) in lines.iter().enumerate() {
        let line_no = i as u32 + 1;
        if directive::is_directive_line(raw.trim_start())
            && !consumed.contains(&line_no)
        {
            errs.push(
                ErrInSrc::new(&ERR_DANGLING_DIRECTIVE)
                    .at(whole_line_loc(&pf.file, line_no, raw)),
            );
        }
    }
}

/// The comment group directly above `decl_line`: at most one directive
/// plus the surrounding documentation text.
fn attached_directive(
    errs: &mut DiagList,
    file: &Arc<SrcFile>,
    lines: &[&str],
    decl_line: u32,
    consumed: &mut Vec<u32>,
) -> (Option<Directive>, String) {
    let decl_idx = decl_line.saturating_sub(1) as usize;
    let mut group_start = decl_idx;
    while group_start > 0 {
        let above = lines
            .get(group_start - 1)
            .map(|l| l.trim_start())
            .unwrap_or("");
        if above.starts_with("//") {
            group_start -= 1;
        } else {
            break;
        }
    }

    let mut dir: Option<Directive> = None;
    let mut extra: Option<u32> = None;
    let mut doc_lines: Vec<String> = Vec::new();
    for idx in group_start..decl_idx {
        let raw = lines[idx];
        let line_no = idx as u32 + 1;
        if directive::is_directive_line(raw.trim_start()) {
            consumed.push(line_no);
            if dir.is_some() {
                extra = Some(line_no);
                continue;
            }
            match directive::parse(file, line_no, raw) {
                Ok(parsed) => dir = Some(parsed),
                Err(err) => errs.push(*err),
            }
        } else {
            doc_lines.push(strip_comment(raw.trim_start()));
        }
    }

    if let Some(line_no) = extra {
        let raw = lines[line_no as usize - 1];
        errs.push(
            ErrInSrc::new(&directive::ERR_MULTIPLE_DIRECTIVES)
                .at(whole_line_loc(file, line_no, raw)),
        );
        return (None, String::new());
    }

    (dir, doc_lines.join("\n").trim().to_string())
}

fn strip_comment(trimmed: &str) -> String {
    let rest = trimmed.trim_start_matches('/');
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

fn whole_line_loc(
    file: &Arc<SrcFile>,
    line_no: u32,
    raw: &str,
) -> SrcLocation {
    let width = raw.trim_end().chars().count().max(1) as u32;
    SrcLocation {
        file: Arc::clone(file),
        start: Pos::new(line_no, 1),
        end: Pos::new(line_no, width + 1),
        kind: LocKind::Error,
        text: None,
    }
}

fn push_target_err(errs: &mut DiagList, dir: &Directive, target: &str) {
    errs.push(
        ErrInSrc::new(&ERR_DIRECTIVE_TARGET)
            .summary(format!(
                "directive '{}' cannot apply to {}",
                dir.name, target
            ))
            .at(dir.loc.clone()),
    );
}

fn init_return(func: &FuncDecl) -> Option<String> {
    match &func.output {
        FnOutput::Result { ok } => ok.deref_named().map(String::from),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_fn(
    errs: &mut DiagList,
    file: &Arc<SrcFile>,
    pkg: &str,
    structs: &HashMap<String, StructDecl>,
    binds: &mut Vec<Bind>,
    func: FuncDecl,
    dir: Directive,
    doc: String,
) {
    let name_loc =
        SrcLocation::from_span(file, func.name_span, LocKind::Error, None);
    let resource = {
        let mut ctx = ParseCtx { file, pkg, errs };
        match dir.name.as_str() {
            "api" => endpoint::parse(&mut ctx, &func, &dir, &doc, structs)
                .map(Resource::Endpoint),
            "middleware" => middleware::parse(&mut ctx, &func, &dir, &doc)
                .map(Resource::Middleware),
            "authhandler" => {
                auth_handler::parse(&mut ctx, &func, &dir, &doc, structs)
                    .map(Resource::AuthHandler)
            }
            "subscription" => {
                pubsub::parse_subscription(&mut ctx, &func, &dir)
                    .map(Resource::Subscription)
            }
            "service" | "topic" => {
                push_target_err(ctx.errs, &dir, "a function");
                None
            }
            _ => {
                ctx.errs.push(
                    ErrInSrc::new(&ERR_UNKNOWN_DIRECTIVE)
                        .summary(format!(
                            "unknown directive '{}'",
                            dir.name
                        ))
                        .at(dir.loc.clone()),
                );
                None
            }
        }
    };
    if let Some(resource) = resource {
        binds.push(Bind {
            name: func.name.clone(),
            resource,
            file: Arc::clone(file),
            loc: name_loc,
            line: dir.line,
        });
    }
}
