//! Best-effort stack capture for internal diagnostics.

pub use girder_serde::StackFrame;

use std::backtrace::Backtrace;

/// Frames beyond this are dropped; deep recursion adds no signal.
const MAX_FRAMES: usize = 100;

/// Captures the current stack, parsed from the std backtrace rendering.
///
/// Symbol resolution is best effort; an empty vector is a valid result
/// and must never fail the caller.
pub fn capture() -> Vec<StackFrame> {
    parse_backtrace(&Backtrace::force_capture().to_string())
}

fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    let mut last_kept = false;
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("at ") {
            // Attach the source position to the frame line above it.
            if last_kept {
                if let Some(frame) = frames.last_mut() {
                    if frame.file.is_none() {
                        let (file, line_no) = split_file_line(rest);
                        frame.file = Some(file.to_string());
                        frame.line = line_no;
                    }
                }
            }
            continue;
        }
        last_kept = false;
        // Frame lines look like `12: some::function::path`.
        let mut parts = trimmed.splitn(2, ": ");
        let index = parts.next().unwrap_or("");
        let function = match parts.next() {
            Some(f) if index.chars().all(|c| c.is_ascii_digit()) => f,
            _ => continue,
        };
        if is_noise(function) {
            continue;
        }
        if frames.len() >= MAX_FRAMES {
            break;
        }
        frames.push(StackFrame {
            function: function.to_string(),
            file: None,
            line: None,
        });
        last_kept = true;
    }
    frames
}

/// Strips the trailing `:line:col` pair from a backtrace path.
fn split_file_line(rest: &str) -> (&str, Option<u32>) {
    let mut it = rest.rsplitn(3, ':');
    let _col = it.next();
    let line = it.next().and_then(|l| l.parse::<u32>().ok());
    match it.next() {
        Some(file) if line.is_some() => (file, line),
        _ => (rest, None),
    }
}

fn is_noise(function: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "std::",
        "core::",
        "alloc::",
        "backtrace::",
        "girder_diag::stack",
        "rust_begin_unwind",
        "__",
    ];
    PREFIXES.iter().any(|p| function.starts_with(p))
}

#[cfg(test)]
mod stack_tests {
    use super::*;

    use rstest::*;

    const RENDERED: &str = "\
   0: std::backtrace::Backtrace::force_capture
             at /rustc/lib/std/src/backtrace.rs:331:9
   1: girder_diag::stack::capture
             at ./src/stack.rs:12:5
   2: girderc::pipeline::run
             at ./src/pipeline.rs:44:18
   3: core::ops::function::FnOnce::call_once
";

    #[rstest]
    fn parses_frames_and_positions() {
        let frames = parse_backtrace(RENDERED);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].function, "girderc::pipeline::run");
        assert_eq!(frames[0].file.as_deref(), Some("./src/pipeline.rs"));
        assert_eq!(frames[0].line, Some(44));
    }

    #[rstest]
    fn capture_never_panics() {
        let _ = capture();
    }

    #[rstest(
        input,
        expected_file,
        expected_line,
        case("./src/lib.rs:10:4", "./src/lib.rs", Some(10)),
        case("no-position-here", "no-position-here", None)
    )]
    fn split_file_line_cases(
        input: &str,
        expected_file: &str,
        expected_line: Option<u32>,
    ) {
        let (file, line) = split_file_line(input);
        assert_eq!(file, expected_file);
        assert_eq!(line, expected_line);
    }
}
