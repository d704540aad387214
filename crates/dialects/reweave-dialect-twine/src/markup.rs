//! Markup shared by the Twine formats: `[[links]]`, delimited comments and
//! sigil variables in prose.

use std::ops::Range;

use reweave_core::expr::{is_ident_continue, is_ident_start};
use reweave_core::Occurrence;

/// A `[[...]]` link as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLink<'a> {
    pub range: Range<usize>,
    pub text: Option<&'a str>,
    pub target: &'a str,
    /// SugarCube `[[text|target][setter]]`.
    pub setter: Option<&'a str>,
}

/// Every well-formed `[[...]]` link in `text`.
///
/// Accepts `[[target]]`, `[[text->target]]`, `[[target<-text]]`,
/// `[[text|target]]` and a trailing `[setter]`. A `[` directly before the
/// link (a hook opening onto it) is not part of it.
pub(crate) fn find_links(text: &str) -> Vec<RawLink<'_>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find("[[") {
        let mut start = from + rel;
        while text[start + 2..].starts_with('[') {
            start += 1;
        }
        let Some(close) = text[start + 2..].find("]]") else {
            break;
        };
        let end = start + 2 + close + 2;
        let inner = &text[start + 2..end - 2];
        from = end;
        if inner.contains('\n') {
            from = start + 2;
            continue;
        }
        let (link, setter) = match inner.split_once("][") {
            Some((link, setter)) => (link, Some(setter)),
            None => (inner, None),
        };
        let (label, target) = split_link(link);
        if target.trim().is_empty() {
            continue;
        }
        out.push(RawLink {
            range: start..end,
            text: label,
            target: target.trim(),
            setter,
        });
    }
    out
}

fn split_link(inner: &str) -> (Option<&str>, &str) {
    if let Some((text, target)) = inner.rsplit_once("->") {
        return (Some(text), target);
    }
    if let Some((target, text)) = inner.split_once("<-") {
        return (Some(text), target);
    }
    if let Some((text, target)) = inner.rsplit_once('|') {
        return (Some(text), target);
    }
    (None, inner)
}

/// Every `open ... close` span in `text` with its inner text. An
/// unterminated opener ends the scan.
pub(crate) fn find_delimited<'a>(
    text: &'a str,
    open: &str,
    close: &str,
) -> Vec<(Range<usize>, &'a str)> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = text[from..].find(open) {
        let start = from + rel;
        let body = start + open.len();
        let Some(end_rel) = text[body..].find(close) else {
            break;
        };
        let end = body + end_rel + close.len();
        out.push((start..end, &text[body..body + end_rel]));
        from = end;
    }
    out
}

/// `<!-- ... -->` comments.
pub(crate) fn html_comments(text: &str) -> Vec<(Range<usize>, &str)> {
    find_delimited(text, "<!--", "-->")
}

/// A naked `$name` or `_name` variable in prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SigilVar {
    pub range: Range<usize>,
    pub temp: bool,
}

/// Sigil variables in prose. With `props`, trailing `.prop` accessors are
/// part of the reference (SugarCube naked variable markup).
pub(crate) fn sigil_vars(text: &str, props: bool) -> Vec<SigilVar> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'$' && b != b'_' {
            i += 1;
            continue;
        }
        let prev = text[..i].chars().next_back();
        let after = text[i + 1..].chars().next();
        let starts = after.is_some_and(|c| c.is_alphabetic() || (b == b'$' && c == '_'));
        if prev.is_some_and(|c| is_ident_continue(c) || c == '\\' || c == '$') || !starts {
            i += 1;
            continue;
        }
        let mut end = i + 1 + ident_len(&text[i + 1..]);
        if props {
            while text[end..].starts_with('.') {
                let len = ident_len(&text[end + 1..]);
                let next = text[end + 1..].chars().next();
                if len == 0 || !next.is_some_and(is_ident_start) {
                    break;
                }
                end += 1 + len;
            }
        }
        out.push(SigilVar {
            range: i..end,
            temp: b == b'_',
        });
        i = end;
    }
    out
}

fn ident_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !is_ident_continue(*c))
        .map_or(s.len(), |(i, _)| i)
}

/// Sort by position and drop occurrences overlapping an earlier one.
pub(crate) fn non_overlapping(mut found: Vec<Occurrence>) -> Vec<Occurrence> {
    found.sort_by_key(|o| (o.range.start, std::cmp::Reverse(o.range.end)));
    let mut out: Vec<Occurrence> = Vec::with_capacity(found.len());
    for occ in found {
        if out.last().is_some_and(|prev| occ.range.start < prev.range.end) {
            continue;
        }
        out.push(occ);
    }
    out
}

/// Whether `s` is a bare dotted identifier path such as `a.b.c`.
pub(crate) fn is_ident_path(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            part.chars().next().is_some_and(is_ident_start) && part.chars().all(is_ident_continue)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_forms() {
        let links = find_links("[[Go->Shop]] [[Home<-Back]] [[Next|Hall]] [[Plain]]");
        let parsed: Vec<(Option<&str>, &str)> = links.iter().map(|l| (l.text, l.target)).collect();
        assert_eq!(
            parsed,
            vec![
                (Some("Go"), "Shop"),
                (Some("Back"), "Home"),
                (Some("Next"), "Hall"),
                (None, "Plain"),
            ]
        );
    }

    #[test]
    fn test_link_inside_hook() {
        let text = "(if: $a)[[[Door]]]";
        let links = find_links(text);
        assert_eq!(links.len(), 1);
        assert_eq!(&text[links[0].range.clone()], "[[Door]]");
    }

    #[test]
    fn test_link_with_setter() {
        let links = find_links("[[Buy|Shop][$gold to $gold - 1]]");
        assert_eq!(links[0].target, "Shop");
        assert_eq!(links[0].setter, Some("$gold to $gold - 1"));
    }

    #[test]
    fn test_unterminated_link_ignored() {
        assert!(find_links("[[broken link").is_empty());
    }

    #[test]
    fn test_sigil_vars_skip_prices_and_underlines() {
        let text = "You have $gold and _tmp but $5 and __under__ and snake_case";
        let vars: Vec<&str> = sigil_vars(text, false)
            .iter()
            .map(|v| &text[v.range.clone()])
            .collect();
        assert_eq!(vars, vec!["$gold", "_tmp"]);
    }

    #[test]
    fn test_sigil_vars_with_props() {
        let text = "Name: $player.name.";
        let vars = sigil_vars(text, true);
        assert_eq!(&text[vars[0].range.clone()], "$player.name");
    }

    #[test]
    fn test_html_comments() {
        let found = html_comments("a <!-- note --> b <!-- open");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, " note ");
    }
}
