//! A language-agnostic token highlighter for source excerpts.
//!
//! The renderer applies this to every excerpt line no matter the file
//! kind, so the rules stay lexical: strings, numbers and line comments.
//! Highlighting must never fail; unknown input passes through untouched.

use colored::Colorize;

pub fn highlight_line(line: &str, color: bool) -> String {
    if !color {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();
    while let Some(&(i, ch)) = chars.peek() {
        match ch {
            '/' if line[i..].starts_with("//") => {
                out.push_str(&line[i..].dimmed().to_string());
                break;
            }
            '"' => {
                let end = scan_string(&line[i..]);
                out.push_str(&line[i..i + end].green().to_string());
                for _ in 0..line[i..i + end].chars().count() {
                    chars.next();
                }
            }
            c if c.is_ascii_digit() => {
                let end = scan_number(&line[i..]);
                out.push_str(&line[i..i + end].cyan().to_string());
                for _ in 0..line[i..i + end].chars().count() {
                    chars.next();
                }
            }
            c => {
                out.push(c);
                chars.next();
            }
        }
    }
    out
}

/// Length in bytes of a double-quoted string starting at the input,
/// including both quotes; unterminated strings run to the end.
fn scan_string(s: &str) -> usize {
    let mut escaped = false;
    for (i, ch) in s.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return i + 1,
            _ => {}
        }
    }
    s.len()
}

/// Length in bytes of a numeric literal starting at the input.
fn scan_number(s: &str) -> usize {
    for (i, ch) in s.char_indices() {
        if !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_') {
            return i;
        }
    }
    s.len()
}

#[cfg(test)]
mod highlight_tests {
    use super::*;

    use rstest::*;

    #[rstest]
    fn no_color_passes_through() {
        let line = "let x = \"hi\"; // done";
        assert_eq!(highlight_line(line, false), line);
    }

    #[rstest(
        input,
        expected_len,
        case("\"plain\" rest", 7),
        case("\"esc \\\" quote\" rest", 14),
        case("\"unterminated", 13)
    )]
    fn string_scanning(input: &str, expected_len: usize) {
        assert_eq!(scan_string(input), expected_len);
    }

    #[rstest(
        input,
        expected_len,
        case("123 rest", 3),
        case("0xff_usize)", 9),
        case("1.25,", 4)
    )]
    fn number_scanning(input: &str, expected_len: usize) {
        assert_eq!(scan_number(input), expected_len);
    }

    #[rstest]
    fn colored_output_keeps_all_characters() {
        colored::control::set_override(true);
        let line = "call(42, \"s\") // tail";
        let highlighted = highlight_line(line, true);
        let stripped = console::strip_ansi_codes(&highlighted);
        assert_eq!(stripped, line);
        colored::control::unset_override();
    }
}
