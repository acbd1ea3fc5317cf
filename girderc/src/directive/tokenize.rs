use std::iter;
use std::str;

/// A raw directive token plus its byte offset within the scanned text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawTok<'a> {
    pub text: &'a str,
    pub offset: usize,
}

/// Byte offset of an unterminated quote.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnterminatedQuote {
    pub offset: usize,
}

pub struct Tokenizer<'a> {
    s: &'a str,
    it: iter::Peekable<str::CharIndices<'a>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(s: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            s,
            it: s.char_indices().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.it.peek() {
            if ch.is_whitespace() {
                self.it.next();
            } else {
                break;
            }
        }
    }

    /// Consumes one token: a run of non-whitespace where double quotes
    /// keep enclosed whitespace inside the token.
    fn token(&mut self, start: usize) -> Result<RawTok<'a>, UnterminatedQuote> {
        let mut quote: Option<usize> = None;
        let mut end = self.s.len();
        while let Some(&(pos, ch)) = self.it.peek() {
            match ch {
                '"' => {
                    quote = match quote {
                        None => Some(pos),
                        Some(_) => None,
                    };
                    self.it.next();
                }
                _ if ch.is_whitespace() && quote.is_none() => {
                    end = pos;
                    break;
                }
                _ => {
                    self.it.next();
                }
            }
        }
        if let Some(open) = quote {
            return Err(UnterminatedQuote { offset: open });
        }
        Ok(RawTok {
            text: &self.s[start..end],
            offset: start,
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<RawTok<'a>, UnterminatedQuote>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let &(start, _) = self.it.peek()?;
        Some(self.token(start))
    }
}
