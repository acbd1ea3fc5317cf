//! The girder compiler as a library: every pipeline stage, from
//! directive extraction to overlay emission, is a module here so tests
//! and embedding tools can drive stages individually. The `girderc`
//! binary is the supported entry point; treat everything below as an
//! implementation detail that may change between releases.

#![forbid(unsafe_code)]

/// The application descriptor and its cross-validation
pub mod app;
/// Argument parsing
pub mod args;
/// Bootstrapping for the CLI
pub mod cli;
/// The code-generation façade
pub mod codegen;
/// Comment directive parsing
pub mod directive;
/// Pipeline orchestration
pub mod pipeline;
/// Per-directive resource parsers
pub mod resources;
/// Path templates and the conflict registry
pub mod respath;
/// The structural layer over the `syn` AST
pub mod schema;
/// Resource usage linking
pub mod usage;
/// Shared utilities and the in-memory filesystem
pub mod util;
