//! Text scanning helpers shared by the dialect extractors: balanced
//! delimiters, quote-aware splitting, line arithmetic and delay literals.

use std::ops::Range;
use std::time::Duration;

/// Index just past the delimiter closing the one at `open_at`.
///
/// With `quote_aware`, delimiters inside `"..."` / `'...'` strings are
/// ignored. Prose bodies (hooks, link text) must be scanned without quote
/// awareness because apostrophes are not string delimiters there.
pub fn matching_close(text: &str, open_at: usize, quote_aware: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let open = *bytes.get(open_at)?;
    let close = match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        _ => return None,
    };
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open_at;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else if quote_aware && (b == b'"' || b == b'\'') && i > open_at {
            quote = Some(b);
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

/// Split on `sep` occurring outside quotes and outside `()`, `[]`, `{}`.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte offset of the first top-level occurrence of the keyword `word`
/// (delimited by non-identifier characters).
pub fn find_word_top_level(text: &str, word: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 && text[i..].starts_with(word) => {
                let before_ok = text[..i]
                    .chars()
                    .next_back()
                    .is_none_or(|b| !is_word_char(b));
                let after_ok = text[i + word.len()..]
                    .chars()
                    .next()
                    .is_none_or(|a| !is_word_char(a));
                if before_ok && after_ok {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// 1-based line number of `offset` in `text`.
pub fn line_of(text: &str, offset: usize) -> u32 {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

/// Lines of `text` with the byte offset each starts at. Line contents
/// exclude the trailing `\n`.
pub fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line.strip_suffix('\n').unwrap_or(line))
    })
}

/// Range of the full line containing `pos`, including its newline.
pub fn line_range(text: &str, pos: usize) -> Range<usize> {
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i + 1);
    start..end
}

/// Whether `pos` is at the start of a line, ignoring leading spaces/tabs.
pub fn at_line_start(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .rev()
        .take_while(|c| *c != '\n')
        .all(|c| c == ' ' || c == '\t')
}

/// Parse a delay literal: `2s`, `1.5s`, `500ms`, `2 seconds`,
/// `1 second`, `300 milliseconds`.
pub fn parse_delay(text: &str) -> Option<Duration> {
    let t = text.trim().trim_matches(|c| c == '"' || c == '\'');
    let split = t
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(t.len());
    let (num, unit) = t.split_at(split);
    let value: f64 = num.parse().ok()?;
    let millis = match unit.trim() {
        "ms" | "millisecond" | "milliseconds" => value,
        "s" | "" | "second" | "seconds" => value * 1000.0,
        _ => return None,
    };
    Some(Duration::from_millis(millis.round() as u64))
}

/// Shortest delay literal understood by every dialect with timers.
pub fn format_delay(delay: Duration) -> String {
    let ms = delay.as_millis();
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

/// Escape `s` for a single-quoted JavaScript string.
pub fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Escape `s` for a double-quoted string.
pub fn double_quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Strip one layer of matching quotes, undoing backslash escapes.
pub fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let quote = s.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'))?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_close_nests() {
        let t = "(if: $x)[a [b] c] rest";
        assert_eq!(matching_close(t, 0, true), Some(8));
        assert_eq!(matching_close(t, 8, false), Some(17));
    }

    #[test]
    fn matching_close_quote_awareness() {
        let t = r#"(print: ")")"#;
        assert_eq!(matching_close(t, 0, true), Some(t.len()));
        let hook = "[don't (stop)]";
        assert_eq!(matching_close(hook, 0, false), Some(hook.len()));
    }

    #[test]
    fn split_top_level_ignores_nested_and_quoted() {
        let parts = split_top_level(r#"bind $x, "a, b", (a: 1, 2)"#, ',');
        assert_eq!(parts, vec!["bind $x", r#" "a, b""#, " (a: 1, 2)"]);
    }

    #[test]
    fn finds_keyword_outside_strings() {
        let t = r#"$msg to "go to bed""#;
        assert_eq!(find_word_top_level(t, "to"), Some(5));
        assert_eq!(find_word_top_level("$total + 1", "to"), None);
    }

    #[test]
    fn delays() {
        assert_eq!(parse_delay("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_delay("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_delay("1.5 seconds"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_delay("soon"), None);
        assert_eq!(format_delay(Duration::from_millis(2000)), "2s");
        assert_eq!(format_delay(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn lines() {
        let t = "a\nbc\n\nd";
        let lines: Vec<_> = lines_with_offsets(t).collect();
        assert_eq!(lines, vec![(0, "a"), (2, "bc"), (5, ""), (6, "d")]);
        assert_eq!(line_of(t, 6), 4);
        assert_eq!(line_range(t, 3), 2..5);
        assert!(at_line_start("x\n  y", 4));
        assert!(!at_line_start("x y", 2));
    }

    #[test]
    fn unquote_handles_escapes() {
        assert_eq!(unquote(r#""say \"hi\"""#).as_deref(), Some(r#"say "hi""#));
        assert_eq!(unquote("'Shop'").as_deref(), Some("Shop"));
        assert_eq!(unquote("Shop"), None);
    }
}
