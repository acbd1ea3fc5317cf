//! The outer CLI parts of the `girderc` executable.

#![forbid(unsafe_code)]

use girderc::args::GirderCli;
use girderc::cli;

use log::debug;

fn main() {
    let cli = match GirderCli::from_cli() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let mut builder = env_logger::Builder::from_default_env();
    match cli.build_args.verbose.log_level() {
        Some(level) => builder.filter_level(level.to_level_filter()),
        None => builder.filter_level(log::LevelFilter::Off),
    };
    builder.init();

    debug!("girderc args = {:?}", cli);

    std::process::exit(cli::run_cli(&cli));
}
