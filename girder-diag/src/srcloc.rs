//! The source-location model: files, positions, ranges and the grouping
//! used by the renderer.

use girder_serde::{LocationKind as WireKind, WireLocation};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::visit::Visit;

/// A single source file held in memory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SrcFile {
    /// Path relative to the application root, used in rendered output.
    pub rel_path: PathBuf,
    /// Absolute path on disk.
    pub full_path: PathBuf,
    pub contents: String,
}

impl SrcFile {
    pub fn new(
        rel_path: impl Into<PathBuf>,
        full_path: impl Into<PathBuf>,
        contents: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(SrcFile {
            rel_path: rel_path.into(),
            full_path: full_path.into(),
            contents: contents.into(),
        })
    }

    /// Returns the 1-based line `n`, without its trailing newline.
    pub fn line(&self, n: u32) -> Option<&str> {
        self.contents
            .lines()
            .nth((n as usize).checked_sub(1)?)
    }

    pub fn line_count(&self) -> u32 {
        self.contents.lines().count() as u32
    }

    /// Byte offset of a position, treating columns as character counts.
    pub fn offset_of(&self, pos: Pos) -> Option<usize> {
        let mut line = 1u32;
        let mut it = self.contents.char_indices().peekable();
        while line < pos.line {
            match it.next() {
                Some((_, '\n')) => line += 1,
                Some(_) => {}
                None => return None,
            }
        }
        let mut col = 1u32;
        while col < pos.col {
            match it.next() {
                Some((_, '\n')) | None => return None,
                Some(_) => col += 1,
            }
        }
        match it.peek() {
            Some(&(off, _)) => Some(off),
            None => Some(self.contents.len()),
        }
    }

    /// The position of a byte offset, clamped to the end of the file.
    pub fn pos_of(&self, offset: usize) -> Pos {
        let mut line = 1u32;
        let mut col = 1u32;
        for (i, ch) in self.contents.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Pos { line, col }
    }
}

/// A 1-based line/column position.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Severity of a location within a diagnostic.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LocKind {
    Error,
    Warning,
    Help,
}

impl LocKind {
    /// Rank used for ordering groups; errors sort first.
    pub fn severity_rank(self) -> u8 {
        match self {
            LocKind::Error => 0,
            LocKind::Warning => 1,
            LocKind::Help => 2,
        }
    }

    fn to_wire(self) -> WireKind {
        match self {
            LocKind::Error => WireKind::Error,
            LocKind::Warning => WireKind::Warning,
            LocKind::Help => WireKind::Help,
        }
    }
}

/// A span inside a source file, with a severity and an optional label.
///
/// Invariant: `start <= end`, both within `file`.
#[derive(Clone, Debug)]
pub struct SrcLocation {
    pub file: Arc<SrcFile>,
    pub start: Pos,
    pub end: Pos,
    pub kind: LocKind,
    pub text: Option<String>,
}

impl SrcLocation {
    /// Builds a location from a `proc-macro2` span resolved against `file`.
    pub fn from_span(
        file: &Arc<SrcFile>,
        span: Span,
        kind: LocKind,
        text: Option<String>,
    ) -> Self {
        let s = span.start();
        let e = span.end();
        SrcLocation {
            file: Arc::clone(file),
            start: Pos::new(s.line as u32, s.column as u32 + 1),
            end: Pos::new(e.line as u32, e.column as u32 + 1),
            kind,
            text,
        }
    }

    /// Builds a location from a position pair. A zero-width pair is
    /// promoted to the smallest enclosing AST node, falling back to a
    /// delimiter scan when the file does not parse.
    pub fn from_pos_pair(
        file: &Arc<SrcFile>,
        start: Pos,
        end: Pos,
        kind: LocKind,
        text: Option<String>,
    ) -> Self {
        let (start, end) = if start == end {
            promote_zero_width(file, start)
        } else {
            (start, end)
        };
        SrcLocation {
            file: Arc::clone(file),
            start,
            end,
            kind,
            text,
        }
    }

    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }

    fn overlaps(&self, other: &SrcLocation) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn to_wire(&self) -> WireLocation {
        WireLocation {
            file: self.file.rel_path.display().to_string(),
            start_line: self.start.line,
            start_col: self.start.col,
            end_line: self.end.line,
            end_col: self.end.col,
            kind: self.kind.to_wire(),
            text: self.text.clone(),
        }
    }
}

/// Promotes a zero-width position to a meaningful range.
fn promote_zero_width(file: &Arc<SrcFile>, pos: Pos) -> (Pos, Pos) {
    match syn::parse_file(&file.contents) {
        Ok(ast) => {
            let mut finder = SmallestEnclosing {
                target: pos,
                best: None,
            };
            finder.visit_file(&ast);
            match finder.best {
                Some((start, end)) => (start, end),
                None => delimiter_scan(file, pos),
            }
        }
        Err(_) => delimiter_scan(file, pos),
    }
}

/// Visitor selecting the smallest node that starts at the target position.
struct SmallestEnclosing {
    target: Pos,
    best: Option<(Pos, Pos)>,
}

impl SmallestEnclosing {
    fn consider(&mut self, span: Span) {
        let s = span.start();
        let e = span.end();
        let start = Pos::new(s.line as u32, s.column as u32 + 1);
        let end = Pos::new(e.line as u32, e.column as u32 + 1);
        if start != self.target || end < start {
            return;
        }
        let better = match self.best {
            None => true,
            Some((_, best_end)) => end < best_end,
        };
        if better {
            self.best = Some((start, end));
        }
    }
}

impl<'ast> Visit<'ast> for SmallestEnclosing {
    fn visit_item(&mut self, i: &'ast syn::Item) {
        self.consider(i.span());
        syn::visit::visit_item(self, i);
    }

    fn visit_stmt(&mut self, i: &'ast syn::Stmt) {
        self.consider(i.span());
        syn::visit::visit_stmt(self, i);
    }

    fn visit_expr(&mut self, i: &'ast syn::Expr) {
        self.consider(i.span());
        syn::visit::visit_expr(self, i);
    }

    fn visit_type(&mut self, i: &'ast syn::Type) {
        self.consider(i.span());
        syn::visit::visit_type(self, i);
    }

    fn visit_pat(&mut self, i: &'ast syn::Pat) {
        self.consider(i.span());
        syn::visit::visit_pat(self, i);
    }

    fn visit_ident(&mut self, i: &'ast proc_macro2::Ident) {
        self.consider(i.span());
        syn::visit::visit_ident(self, i);
    }
}

/// Scans forward from `pos` counting `(`, `[`, `{` nesting and stops on
/// the first balanced close, semicolon, comma, colon, quote or whitespace
/// at depth zero.
fn delimiter_scan(file: &SrcFile, pos: Pos) -> (Pos, Pos) {
    let start_off = match file.offset_of(pos) {
        Some(off) => off,
        None => return (pos, pos),
    };
    let mut depth = 0u32;
    let mut end_off = file.contents.len();
    for (i, ch) in file.contents[start_off..].char_indices() {
        let abs = start_off + i;
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    end_off = abs;
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    end_off = abs + ch.len_utf8();
                    break;
                }
            }
            ';' | ',' | ':' | '"' | '\'' if depth == 0 => {
                end_off = abs;
                break;
            }
            _ if depth == 0 && ch.is_whitespace() => {
                end_off = abs;
                break;
            }
            _ => {}
        }
    }
    (pos, file.pos_of(end_off))
}

/// Locations of one file, renderable inside a single frame.
#[derive(Clone, Debug)]
pub struct FileGroup {
    pub file: Arc<SrcFile>,
    pub locations: Vec<SrcLocation>,
}

impl FileGroup {
    fn rank(&self) -> u8 {
        self.locations
            .iter()
            .map(|l| l.kind.severity_rank())
            .min()
            .unwrap_or(u8::MAX)
    }
}

/// Partitions locations into per-file groups. Two locations share a group
/// only when they do not overlap, or when both sit on one line and carry
/// no label text. Groups are ordered by their lowest severity, then by
/// file path.
pub fn group_by_file(locations: &[SrcLocation]) -> Vec<FileGroup> {
    let mut groups: Vec<FileGroup> = Vec::new();
    for loc in locations {
        let found = groups.iter_mut().find(|g| {
            g.file == loc.file
                && g.locations.iter().all(|other| compatible(loc, other))
        });
        match found {
            Some(group) => group.locations.push(loc.clone()),
            None => groups.push(FileGroup {
                file: Arc::clone(&loc.file),
                locations: vec![loc.clone()],
            }),
        }
    }
    for group in &mut groups {
        group
            .locations
            .sort_by_key(|l| (l.start, l.end));
    }
    groups.sort_by(|a, b| {
        a.rank()
            .cmp(&b.rank())
            .then_with(|| a.file.rel_path.cmp(&b.file.rel_path))
    });
    groups
}

fn compatible(a: &SrcLocation, b: &SrcLocation) -> bool {
    if !a.overlaps(b) {
        return true;
    }
    a.is_single_line()
        && b.is_single_line()
        && a.start.line == b.start.line
        && a.text.is_none()
        && b.text.is_none()
}

#[cfg(test)]
mod srcloc_tests {
    use super::*;

    use rstest::*;

    fn file(contents: &str) -> Arc<SrcFile> {
        SrcFile::new("app/lib.rs", "/app/lib.rs", contents)
    }

    #[rstest]
    fn zero_width_promotes_to_smallest_node() {
        let f = file("fn main() {\n    let x = foo(1, 2);\n}\n");
        // Position of `foo` on line 2.
        let pos = Pos::new(2, 13);
        let loc = SrcLocation::from_pos_pair(&f, pos, pos, LocKind::Error, None);
        assert_eq!(loc.start, Pos::new(2, 13));
        assert_eq!(loc.end, Pos::new(2, 16));
    }

    #[rstest]
    fn zero_width_falls_back_to_delimiter_scan() {
        let f = file("not rust at all: vec![1, (2)] trailing\n");
        let pos = Pos::new(1, 18);
        let loc = SrcLocation::from_pos_pair(&f, pos, pos, LocKind::Error, None);
        // The scan swallows the bracketed run and stops after `]`.
        assert_eq!(loc.start, Pos::new(1, 18));
        assert_eq!(loc.end, Pos::new(1, 30));
    }

    #[rstest(
        input,
        col,
        expected_end_col,
        case("x, rest", 1, 2),
        case("ident more", 1, 6),
        case("(a, b) tail", 1, 7)
    )]
    fn delimiter_scan_stops_at_depth_zero(
        input: &str,
        col: u32,
        expected_end_col: u32,
    ) {
        let f = file(input);
        let (_, end) = delimiter_scan(&f, Pos::new(1, col));
        assert_eq!(end.col, expected_end_col);
    }

    #[rstest]
    fn groups_split_on_overlap() {
        let f = file("fn a() {}\nfn b() {}\n");
        let mk = |sl, sc, el, ec, text: Option<&str>| SrcLocation {
            file: Arc::clone(&f),
            start: Pos::new(sl, sc),
            end: Pos::new(el, ec),
            kind: LocKind::Error,
            text: text.map(String::from),
        };
        let a = mk(1, 1, 1, 9, Some("first"));
        let b = mk(1, 4, 1, 6, Some("second"));
        let c = mk(2, 1, 2, 9, Some("third"));

        let groups = group_by_file(&[a, b, c]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].locations.len(), 2);
        assert_eq!(groups[1].locations.len(), 1);
    }

    #[rstest]
    fn groups_order_by_severity_then_path() {
        let warn_file = SrcFile::new("a.rs", "/a.rs", "fn a() {}\n");
        let err_file = SrcFile::new("b.rs", "/b.rs", "fn b() {}\n");
        let warn = SrcLocation {
            file: warn_file,
            start: Pos::new(1, 1),
            end: Pos::new(1, 3),
            kind: LocKind::Warning,
            text: None,
        };
        let err = SrcLocation {
            file: err_file,
            start: Pos::new(1, 1),
            end: Pos::new(1, 3),
            kind: LocKind::Error,
            text: None,
        };
        let groups = group_by_file(&[warn, err]);
        assert_eq!(groups[0].file.rel_path, PathBuf::from("b.rs"));
        assert_eq!(groups[1].file.rel_path, PathBuf::from("a.rs"));
    }

    #[rstest]
    fn offset_math_round_trips() {
        let f = file("ab\ncd\n");
        let pos = Pos::new(2, 2);
        let off = f.offset_of(pos).unwrap();
        assert_eq!(off, 4);
        assert_eq!(f.pos_of(off), pos);
    }
}
