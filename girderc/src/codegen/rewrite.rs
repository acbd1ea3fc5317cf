//! Byte-offset rewriting of a single source file. Insertions are keyed
//! to offsets of the original buffer, so earlier insertions never shift
//! later ones.

use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewriteError {
    pub offset: usize,
    pub len: usize,
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "insertion offset {} is beyond the file length {}",
            self.offset, self.len
        )
    }
}

impl std::error::Error for RewriteError {}

/// A per-file buffer of pending insertions.
#[derive(Clone, Debug)]
pub struct Rewriter {
    base: String,
    inserts: Vec<(usize, String)>,
}

impl Rewriter {
    pub fn new(base: impl Into<String>) -> Self {
        Rewriter {
            base: base.into(),
            inserts: Vec::new(),
        }
    }

    /// Queues `text` for insertion at `offset` of the original buffer.
    /// Insertions at equal offsets keep their queueing order.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.inserts.push((offset, text.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }

    pub fn render(&self) -> Result<String, RewriteError> {
        let mut inserts = self.inserts.clone();
        inserts.sort_by_key(|&(offset, _)| offset);

        let mut out = String::with_capacity(
            self.base.len()
                + inserts.iter().map(|(_, t)| t.len()).sum::<usize>(),
        );
        let mut cursor = 0usize;
        for (offset, text) in inserts {
            if offset > self.base.len() || !self.base.is_char_boundary(offset)
            {
                return Err(RewriteError {
                    offset,
                    len: self.base.len(),
                });
            }
            out.push_str(&self.base[cursor..offset]);
            out.push_str(&text);
            cursor = offset;
        }
        out.push_str(&self.base[cursor..]);
        Ok(out)
    }
}
