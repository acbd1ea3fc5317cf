//! Diagnostic accumulation and the `Result`-based bailout used to abort
//! a pipeline run.

use crate::errinsrc::ErrInSrc;
use crate::render::{render, RenderOpts};

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

/// How many diagnostics are rendered before the list is summarized.
const MAX_RENDERED: usize = 10;

/// Diagnostic chain walks stop after this many cause unwraps; real-world
/// cause chains have been observed to contain cycles.
const MAX_CAUSE_UNWRAPS: usize = 100;

/// An ordered collection of diagnostics.
#[derive(Debug, Default)]
pub struct DiagList {
    items: Vec<ErrInSrc>,
}

impl DiagList {
    pub fn new() -> Self {
        DiagList { items: Vec::new() }
    }

    pub fn push(&mut self, err: ErrInSrc) {
        self.items.push(err);
    }

    pub fn extend_from(&mut self, other: DiagList) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrInSrc> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&ErrInSrc> {
        self.items.first()
    }

    /// Whether any diagnostic is error-level (warnings do not fail a
    /// run).
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|e| !e.is_warning())
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|e| !e.is_warning()).count()
    }

    /// Stable sort: first location's file/line/col, then code, title,
    /// summary, detail, then location count.
    pub fn sort(&mut self) {
        self.items.sort_by(compare);
    }

    /// Renders the whole list as one string, summarizing the tail.
    pub fn render(&self, opts: &RenderOpts) -> String {
        let mut out = String::new();
        for (i, err) in self.items.iter().enumerate() {
            if i == MAX_RENDERED {
                out.push_str(&format!(
                    "(and {} more)\n",
                    self.items.len() - MAX_RENDERED
                ));
                break;
            }
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&render(err, opts));
        }
        out
    }
}

impl IntoIterator for DiagList {
    type Item = ErrInSrc;
    type IntoIter = std::vec::IntoIter<ErrInSrc>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl From<ErrInSrc> for DiagList {
    fn from(err: ErrInSrc) -> Self {
        let mut list = DiagList::new();
        list.push(err);
        list
    }
}

fn compare(a: &ErrInSrc, b: &ErrInSrc) -> Ordering {
    let by_location = match (a.locations.first(), b.locations.first()) {
        (Some(la), Some(lb)) => la
            .file
            .rel_path
            .cmp(&lb.file.rel_path)
            .then(la.start.cmp(&lb.start)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_location
        .then_with(|| a.code.cmp(&b.code))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.summary.cmp(&b.summary))
        .then_with(|| a.detail.cmp(&b.detail))
        .then_with(|| a.locations.len().cmp(&b.locations.len()))
}

/// The error value carrying a diagnostic list out of an aborted run.
///
/// Stages return `DiagResult` and propagate with `?`; the orchestration
/// layer converts the carried list back into rendered output.
#[derive(Debug, Default)]
pub struct Bailout {
    pub list: DiagList,
}

impl Bailout {
    pub fn new(list: DiagList) -> Self {
        Bailout { list }
    }
}

impl From<ErrInSrc> for Bailout {
    fn from(err: ErrInSrc) -> Self {
        Bailout {
            list: DiagList::from(err),
        }
    }
}

impl fmt::Display for Bailout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "compilation aborted with {} diagnostic(s)", self.list.len())
    }
}

impl Error for Bailout {}

pub type DiagResult<T> = Result<T, Bailout>;

/// Diagnostics recovered from an arbitrary error chain.
#[derive(Debug)]
pub enum Extracted<'a> {
    List(&'a DiagList),
    Item(&'a ErrInSrc),
}

/// Walks an error's cause chain looking for carried diagnostics.
///
/// The walk is bounded so that cyclic cause chains terminate.
pub fn extract_from_chain<'a>(
    err: &'a (dyn Error + 'static),
) -> Option<Extracted<'a>> {
    let mut current: Option<&(dyn Error + 'static)> = Some(err);
    for _ in 0..MAX_CAUSE_UNWRAPS {
        let e = current?;
        if let Some(bailout) = e.downcast_ref::<Bailout>() {
            return Some(Extracted::List(&bailout.list));
        }
        if let Some(item) = e.downcast_ref::<ErrInSrc>() {
            return Some(Extracted::Item(item));
        }
        current = e.source();
    }
    None
}
