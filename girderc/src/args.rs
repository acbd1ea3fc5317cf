//! The CLI arguments parser using clap.

use clap::{AppSettings, Parser, Subcommand};

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "girderc")]
#[clap(about, author, version, bin_name = "girderc")]
#[clap(setting(AppSettings::DisableHelpSubcommand))]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
pub struct GirderCli {
    #[clap(flatten)]
    pub build_args: BuildArgs,
    #[clap(subcommand)]
    pub command: GirderCommand,
}

impl GirderCli {
    pub fn from_cli() -> Result<Self, clap::Error> {
        GirderCli::try_parse()
    }
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Application root directory
    #[clap(long, default_value = ".")]
    pub app_root: PathBuf,

    /// Character set for rendered diagnostics: utf8 or ascii
    #[clap(long, default_value = "utf8")]
    pub charset: String,

    /// Disable colored output
    #[clap(long)]
    pub no_color: bool,

    /// Override the detected terminal width
    #[clap(long)]
    pub width: Option<usize>,

    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

#[derive(Subcommand, Debug)]
pub enum GirderCommand {
    /// Parse and validate the application without generating code
    Check {},
    /// Generate code overlays
    Gen {
        /// Write overlays under this directory instead of printing JSON
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Print the application metadata as JSON
    Meta {},
}
