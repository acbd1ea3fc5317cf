//! Terminal rendering of diagnostics: header bar, word-wrapped text and
//! per-file source excerpts with underlined locations.

use crate::errinsrc::ErrInSrc;
use crate::highlight::highlight_line;
use crate::srcloc::{group_by_file, FileGroup, LocKind, SrcLocation};

use colored::Colorize;

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Width used when no override is set and stderr is not a terminal.
const DEFAULT_WIDTH: usize = 100;

/// Lines of context shown around each location.
const LINES_BEFORE: u32 = 2;
const LINES_AFTER: u32 = 2;

/// Tabs expand to the next multiple of this column.
const TAB_STOP: usize = 4;

static TERM_WIDTH_OVERRIDE: AtomicUsize = AtomicUsize::new(0);
static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

/// Overrides the process-wide terminal width; `0` restores probing.
pub fn set_terminal_width(width: usize) {
    TERM_WIDTH_OVERRIDE.store(width, Ordering::Relaxed);
}

pub fn terminal_width() -> usize {
    match TERM_WIDTH_OVERRIDE.load(Ordering::Relaxed) {
        0 => {
            let term = console::Term::stderr();
            if term.is_term() {
                term.size().1 as usize
            } else {
                DEFAULT_WIDTH
            }
        }
        w => w,
    }
}

pub fn set_color_enabled(enabled: bool) {
    COLOR_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn color_enabled() -> bool {
    COLOR_ENABLED.load(Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Charset {
    Utf8,
    Ascii,
}

impl FromStr for Charset {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Charset, &'static str> {
        match s {
            "utf8" => Ok(Charset::Utf8),
            "ascii" => Ok(Charset::Ascii),
            _ => Err("invalid charset"),
        }
    }
}

/// Per-render settings, resolved from the process-wide switches by
/// `RenderOpts::from_env` or pinned explicitly in tests.
#[derive(Clone, Copy, Debug)]
pub struct RenderOpts {
    pub charset: Charset,
    pub width: usize,
    pub color: bool,
}

impl RenderOpts {
    pub fn from_env(charset: Charset) -> Self {
        RenderOpts {
            charset,
            width: terminal_width(),
            color: color_enabled(),
        }
    }

    /// Fixed-width, colorless options.
    pub fn plain(width: usize) -> Self {
        RenderOpts {
            charset: Charset::Ascii,
            width,
            color: false,
        }
    }
}

struct Glyphs {
    h: char,
    v: char,
    tee: char,
    elbow: &'static str,
    top_corner: char,
    bottom_corner: char,
    arrow_head: char,
    gap: &'static str,
    file_arrow: &'static str,
}

const UTF8_GLYPHS: Glyphs = Glyphs {
    h: '─',
    v: '│',
    tee: '┬',
    elbow: "╰─",
    top_corner: '╭',
    bottom_corner: '╰',
    arrow_head: '╯',
    gap: "┄┄",
    file_arrow: "──>",
};

const ASCII_GLYPHS: Glyphs = Glyphs {
    h: '-',
    v: '|',
    tee: '^',
    elbow: "\\-",
    top_corner: '/',
    bottom_corner: '\\',
    arrow_head: '\'',
    gap: "..",
    file_arrow: "-->",
};

fn glyphs(charset: Charset) -> &'static Glyphs {
    match charset {
        Charset::Utf8 => &UTF8_GLYPHS,
        Charset::Ascii => &ASCII_GLYPHS,
    }
}

/// Renders a single diagnostic. Failure to read or parse source degrades
/// to raw positions; rendering itself never fails.
pub fn render(err: &ErrInSrc, opts: &RenderOpts) -> String {
    let g = glyphs(opts.charset);
    let width = opts.width.max(40);
    let mut out = String::new();

    out.push_str(&header(&err.title, err.code, width, g, opts.color));
    out.push('\n');

    for line in wrap(&err.summary, width.saturating_sub(2)) {
        out.push_str("  ");
        out.push_str(&line);
        out.push('\n');
    }

    for group in group_by_file(&err.locations) {
        out.push('\n');
        render_group(&mut out, &group, g, opts);
    }

    if let Some(detail) = &err.detail {
        out.push('\n');
        for line in wrap(detail, width.saturating_sub(2)) {
            out.push_str("  ");
            out.push_str(&line);
            out.push('\n');
        }
    }

    if !err.stack.is_empty() {
        out.push('\n');
        for frame in &err.stack {
            let line = match (&frame.file, frame.line) {
                (Some(file), Some(ln)) => {
                    format!("  at {} ({}:{})", frame.function, file, ln)
                }
                _ => format!("  at {}", frame.function),
            };
            out.push_str(&dim(&line, opts.color));
            out.push('\n');
        }
    }

    out
}

/// `── Title ──────── [Ennnn] ──` padded to the terminal width.
fn header(
    title: &str,
    code: u32,
    width: usize,
    g: &Glyphs,
    color: bool,
) -> String {
    let lead = format!("{h}{h} ", h = g.h);
    let label = format!(" [E{:04}] {h}{h}", code, h = g.h);
    let used = 3 + title.chars().count() + 1 + label.chars().count();
    let fill = width.saturating_sub(used).max(2);
    let painted_title = if color {
        title.red().bold().to_string()
    } else {
        title.to_string()
    };
    format!(
        "{}{} {}{}",
        lead,
        painted_title,
        g.h.to_string().repeat(fill),
        label
    )
}

fn render_group(
    out: &mut String,
    group: &FileGroup,
    g: &Glyphs,
    opts: &RenderOpts,
) {
    let first = match group.locations.first() {
        Some(loc) => loc,
        None => return,
    };
    out.push_str(&format!(
        "{} {}:{}\n",
        g.file_arrow,
        group.file.rel_path.display(),
        first.start
    ));

    let line_count = group.file.line_count();
    if line_count == 0 {
        // Contents unavailable; degrade to positions and labels.
        for loc in &group.locations {
            let text = loc.text.as_deref().unwrap_or("");
            out.push_str(&format!(
                "  {}:{} {}\n",
                group.file.rel_path.display(),
                loc.start,
                text
            ));
        }
        return;
    }

    let segments = excerpt_segments(&group.locations, line_count);
    let gutter = (segments.last().map(|s| s.1).unwrap_or(1) as usize)
        .to_string()
        .len();
    let has_bar = group.locations.iter().any(|l| !l.is_single_line());

    for (i, &(seg_start, seg_end)) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(&format!("{:>pad$} {}\n", "", g.gap, pad = gutter));
        }
        for line_no in seg_start..=seg_end {
            let raw = group.file.line(line_no).unwrap_or("");
            let expanded = expand_tabs(raw);
            let bar = bar_cell(group, line_no, has_bar, g);
            out.push_str(&format!(
                "{:>pad$} {} {}{}\n",
                line_no,
                g.v,
                bar,
                highlight_line(&expanded, opts.color),
                pad = gutter
            ));
            annotate_line(out, group, line_no, raw, gutter, has_bar, g, opts);
        }
    }
}

/// Merged, 1-based inclusive line windows covering every location plus
/// its context lines.
fn excerpt_segments(
    locations: &[SrcLocation],
    line_count: u32,
) -> Vec<(u32, u32)> {
    let mut windows: Vec<(u32, u32)> = locations
        .iter()
        .map(|l| {
            (
                l.start.line.saturating_sub(LINES_BEFORE).max(1),
                (l.end.line + LINES_AFTER).min(line_count),
            )
        })
        .collect();
    windows.sort();
    let mut merged: Vec<(u32, u32)> = Vec::new();
    for (start, end) in windows {
        match merged.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// The extra column carrying vertical bars for multi-line locations.
fn bar_cell(
    group: &FileGroup,
    line_no: u32,
    has_bar: bool,
    g: &Glyphs,
) -> String {
    if !has_bar {
        return String::new();
    }
    let inside = group.locations.iter().any(|l| {
        !l.is_single_line() && line_no > l.start.line && line_no <= l.end.line
    });
    if inside {
        format!("{} ", g.v)
    } else {
        "  ".to_string()
    }
}

#[allow(clippy::too_many_arguments)]
fn annotate_line(
    out: &mut String,
    group: &FileGroup,
    line_no: u32,
    raw: &str,
    gutter: usize,
    has_bar: bool,
    g: &Glyphs,
    opts: &RenderOpts,
) {
    let pad = " ".repeat(gutter);

    // Underlines for single-line locations starting here.
    let on_line: Vec<&SrcLocation> = group
        .locations
        .iter()
        .filter(|l| l.is_single_line() && l.start.line == line_no)
        .collect();
    if !on_line.is_empty() {
        let bar = if has_bar { "  " } else { "" };
        let mut row = String::new();
        // Visual column cursor; `row` itself may contain color codes.
        let mut visual = 0usize;
        for loc in &on_line {
            let dstart = display_col(raw, loc.start.col);
            let dend = display_col(raw, loc.end.col).max(dstart + 1);
            let run = dend - dstart;
            while visual < dstart - 1 {
                row.push(' ');
                visual += 1;
            }
            let mut underline = String::new();
            for i in 0..run {
                if i == (run - 1) / 2 {
                    underline.push(g.tee);
                } else {
                    underline.push(g.h);
                }
            }
            row.push_str(&paint(&underline, loc.kind, opts.color));
            visual += run;
        }
        out.push_str(&format!("{} {} {}{}\n", pad, g.v, bar, row));

        for loc in &on_line {
            if let Some(text) = &loc.text {
                let dstart = display_col(raw, loc.start.col);
                let dend = display_col(raw, loc.end.col).max(dstart + 1);
                let center = dstart + (dend - dstart - 1) / 2;
                let spaces = " ".repeat(center.saturating_sub(1));
                out.push_str(&format!(
                    "{} {} {}{}{} {}\n",
                    pad,
                    g.v,
                    bar,
                    spaces,
                    paint(g.elbow, loc.kind, opts.color),
                    paint(text, loc.kind, opts.color),
                ));
            }
        }
    }

    // Arrows for multi-line locations starting or ending here.
    for loc in &group.locations {
        if loc.is_single_line() {
            continue;
        }
        if loc.start.line == line_no {
            let dcol = display_col(raw, loc.start.col);
            let arrow = format!(
                "{}{}{}",
                g.top_corner,
                g.h.to_string().repeat(dcol),
                g.arrow_head
            );
            out.push_str(&format!(
                "{} {} {}\n",
                pad,
                g.v,
                paint(&arrow, loc.kind, opts.color)
            ));
        }
        if loc.end.line == line_no {
            let dcol = display_col(raw, loc.end.col.saturating_sub(1).max(1));
            let mut arrow = format!(
                "{}{}{}",
                g.bottom_corner,
                g.h.to_string().repeat(dcol),
                g.arrow_head
            );
            if let Some(text) = &loc.text {
                arrow.push(' ');
                arrow.push_str(text);
            }
            out.push_str(&format!(
                "{} {} {}\n",
                pad,
                g.v,
                paint(&arrow, loc.kind, opts.color)
            ));
        }
    }
}

fn paint(s: &str, kind: LocKind, color: bool) -> String {
    if !color {
        return s.to_string();
    }
    match kind {
        LocKind::Error => s.red().to_string(),
        LocKind::Warning => s.yellow().to_string(),
        LocKind::Help => s.cyan().to_string(),
    }
}

fn dim(s: &str, color: bool) -> String {
    if color {
        s.dimmed().to_string()
    } else {
        s.to_string()
    }
}

fn expand_tabs(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut col = 0usize;
    for ch in raw.chars() {
        if ch == '\t' {
            let n = TAB_STOP - col % TAB_STOP;
            for _ in 0..n {
                out.push(' ');
            }
            col += n;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

/// 1-based display column of the character at 1-based char index `col`,
/// accounting for tab expansion.
fn display_col(raw: &str, col: u32) -> usize {
    let mut dcol = 0usize;
    for (i, ch) in raw.chars().enumerate() {
        if i + 1 == col as usize {
            return dcol + 1;
        }
        if ch == '\t' {
            dcol += TAB_STOP - dcol % TAB_STOP;
        } else {
            dcol += 1;
        }
    }
    dcol + 1
}

/// Greedy word wrap; words longer than the width stand alone.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(20);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod render_tests {
    use super::*;

    use crate::errinsrc::ErrTemplate;
    use crate::srcloc::{Pos, SrcFile};
    use rstest::*;
    use std::sync::Arc;

    const DEMO: ErrTemplate = ErrTemplate {
        code: 101,
        title: "invalid endpoint",
        summary: "something is off",
        detail: None,
        internal: false,
    };

    fn loc(
        file: &Arc<SrcFile>,
        start: (u32, u32),
        end: (u32, u32),
        text: Option<&str>,
    ) -> SrcLocation {
        SrcLocation {
            file: Arc::clone(file),
            start: Pos::new(start.0, start.1),
            end: Pos::new(end.0, end.1),
            kind: LocKind::Error,
            text: text.map(String::from),
        }
    }

    fn demo_file() -> Arc<SrcFile> {
        SrcFile::new(
            "blog/api.rs",
            "/app/blog/api.rs",
            "// context above\n\
             //girder:api public\n\
             fn list() {}\n\
             // context below\n\
             // more context\n",
        )
    }

    #[rstest(charset, case(Charset::Ascii), case(Charset::Utf8))]
    fn header_is_padded_to_width(charset: Charset) {
        let opts = RenderOpts {
            charset,
            width: 60,
            color: false,
        };
        let err = ErrInSrc::new(&DEMO);
        let out = render(&err, &opts);
        let first = out.lines().next().unwrap();
        assert_eq!(first.chars().count(), 60);
        assert!(first.contains("invalid endpoint"));
        assert!(first.contains("[E0101]"));
    }

    #[rstest]
    fn excerpt_shows_context_and_underline() {
        let f = demo_file();
        let err = ErrInSrc::new(&DEMO)
            .at(loc(&f, (2, 14), (2, 20), Some("access option")));
        let out = render(&err, &RenderOpts::plain(60));

        assert!(out.contains("--> blog/api.rs:2:14"));
        // Context lines 1..=4 around line 2.
        assert!(out.contains("1 | // context above"));
        assert!(out.contains("2 | //girder:api public"));
        assert!(out.contains("4 | // context below"));
        // Underline row: six columns starting at display col 14.
        let underline = out
            .lines()
            .find(|l| l.contains('^'))
            .expect("underline row");
        assert_eq!(underline.find('^'), Some(4 + 13 + 2));
        assert!(out.contains("\\- access option"));
    }

    #[rstest]
    fn two_close_locations_share_one_frame() {
        let f = demo_file();
        let err = ErrInSrc::new(&DEMO)
            .at(loc(&f, (2, 1), (2, 13), Some("first")))
            .at(loc(&f, (3, 1), (3, 3), Some("second")));
        let out = render(&err, &RenderOpts::plain(60));

        assert_eq!(out.matches("--> blog/api.rs").count(), 1);
        assert_eq!(out.matches("\\-").count(), 2);
    }

    #[rstest]
    fn multiline_location_draws_gutter_bars() {
        let f = SrcFile::new(
            "svc/handler.rs",
            "/app/svc/handler.rs",
            "fn handler(\n    arg: u32,\n) -> u32 {\n    arg\n}\n",
        );
        let err =
            ErrInSrc::new(&DEMO).at(loc(&f, (1, 1), (3, 10), Some("here")));
        let out = render(&err, &RenderOpts::plain(60));

        assert!(out.contains("2 | | "));
        assert!(out.contains("/-'"));
        assert!(out.lines().any(|l| l.contains('\\') && l.contains("here")));
    }

    #[rstest]
    fn tabs_expand_on_a_four_column_grid() {
        assert_eq!(expand_tabs("\tx"), "    x");
        assert_eq!(expand_tabs("ab\tx"), "ab  x");
        assert_eq!(display_col("ab\tx", 4), 5);
    }

    #[rstest]
    fn missing_contents_degrade_to_positions() {
        let f = SrcFile::new("gone.rs", "/gone.rs", "");
        let err = ErrInSrc::new(&DEMO).at(loc(&f, (3, 1), (3, 4), Some("x")));
        let out = render(&err, &RenderOpts::plain(60));
        assert!(out.contains("gone.rs:3:1 x"));
    }

    #[rstest]
    fn detail_paragraph_is_word_wrapped() {
        let err = ErrInSrc::new(&DEMO).detail(
            "a detail paragraph that is noticeably longer than the narrow \
             width used by this test so wrapping must occur",
        );
        let out = render(&err, &RenderOpts::plain(44));
        // Dev builds append a stack section; it is not width-bound.
        let detail_lines: Vec<&str> = out
            .lines()
            .filter(|l| {
                l.starts_with("  ")
                    && !l.trim().is_empty()
                    && !l.trim_start().starts_with("at ")
            })
            .collect();
        assert!(detail_lines.len() >= 3);
        assert!(detail_lines.iter().all(|l| l.chars().count() <= 44));
    }

    #[rstest]
    fn width_override_is_process_wide() {
        set_terminal_width(72);
        assert_eq!(terminal_width(), 72);
        set_terminal_width(0);
    }
}
