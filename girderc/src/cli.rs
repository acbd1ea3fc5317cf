//! Bootstrap: wires parsed CLI arguments into a pipeline run and writes
//! the results out.

use crate::args::{GirderCli, GirderCommand};
use crate::codegen::Overlay;
use crate::pipeline::{self, CancelToken, PipelineParams};
use crate::util::OsFiles;

use girder_diag::render::{self, Charset, RenderOpts};
use girder_serde::OverlayMeta;

use log::debug;

use std::fs;
use std::path::Path;

/// Runs the compiler once and returns the process exit code.
pub fn run_cli(cli: &GirderCli) -> i32 {
    let args = &cli.build_args;
    let charset = match args.charset.parse::<Charset>() {
        Ok(charset) => charset,
        Err(err) => {
            eprintln!("error: --charset: {}", err);
            return 2;
        }
    };
    render::set_color_enabled(!args.no_color);
    if let Some(width) = args.width {
        render::set_terminal_width(width);
    }
    let opts = RenderOpts::from_env(charset);

    let params = PipelineParams {
        app_root: &args.app_root,
        source: &OsFiles,
        cancel: CancelToken::new(),
    };
    let output = match pipeline::run(&params) {
        Ok(output) => output,
        Err(bailout) => {
            eprint!("{}", bailout.list.render(&opts));
            return 1;
        }
    };

    if !output.diagnostics.is_empty() {
        eprint!("{}", output.diagnostics.render(&opts));
    }
    let failed = output.diagnostics.has_errors();
    debug!(
        "pipeline finished: {} diagnostic(s), {} overlay(s)",
        output.diagnostics.len(),
        output.overlays.len()
    );

    match &cli.command {
        GirderCommand::Check {} => {}
        GirderCommand::Gen { out } => {
            if failed {
                return 1;
            }
            match out {
                Some(dir) => {
                    if let Err(err) = write_overlays(dir, &output.overlays) {
                        eprintln!("error: {}", err);
                        return 1;
                    }
                }
                None => print_overlays(&output.overlays),
            }
        }
        GirderCommand::Meta {} => {
            if failed {
                return 1;
            }
            let mut meta = output.desc.to_meta();
            meta.overlays = output
                .overlays
                .iter()
                .map(|o| OverlayMeta {
                    source_path: o.source_path.display().to_string(),
                    bytes: o.contents.len(),
                })
                .collect();
            match serde_json::to_string_pretty(&meta) {
                Ok(json) => println!("{}", json),
                Err(err) => {
                    eprintln!("error: {}", err);
                    return 1;
                }
            }
        }
    }

    if failed {
        1
    } else {
        0
    }
}

fn write_overlays(dir: &Path, overlays: &[Overlay]) -> std::io::Result<()> {
    for overlay in overlays {
        let path = dir.join(&overlay.source_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &overlay.contents)?;
    }
    Ok(())
}

fn print_overlays(overlays: &[Overlay]) {
    let entries: Vec<serde_json::Value> = overlays
        .iter()
        .map(|o| {
            serde_json::json!({
                "source_path": o.source_path.display().to_string(),
                "contents": String::from_utf8_lossy(&o.contents),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::Value::Array(entries)
    );
}
