//! Ink identifiers: knot, stitch and variable names.

use unicode_ident::{is_xid_continue, is_xid_start};

pub fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| is_xid_start(c) || c == '_') && chars.all(is_xid_continue)
}

/// `knot`, `knot.stitch` or `VAR.member`.
pub fn is_ident_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_ident)
}

/// Byte length of the identifier path at the start of `s`.
pub(crate) fn path_len(s: &str) -> usize {
    let mut len = 0;
    loop {
        let part = &s[len..];
        let ident = part
            .char_indices()
            .take_while(|&(i, c)| if i == 0 { is_xid_start(c) || c == '_' } else { is_xid_continue(c) })
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        if ident == 0 {
            // A trailing `.` is not part of the path.
            return len.saturating_sub(usize::from(len > 0));
        }
        len += ident;
        if !s[len..].starts_with('.') {
            return len;
        }
        len += 1;
    }
}

/// An Ink identifier derived from an arbitrary name: runs of characters
/// Ink rejects collapse to `_`, and a leading digit gets a `_` prefix.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if is_xid_continue(c) {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    let mut out = if trimmed.is_empty() {
        out.clone()
    } else {
        trimmed.to_string()
    };
    if out.is_empty() {
        out.push('_');
    }
    if out.chars().next().is_some_and(|c| !is_xid_start(c) && c != '_') {
        out.insert(0, '_');
    }
    out
}

/// [`sanitize`] applied to each `.`-separated part, so `Knot.stitch` names
/// keep their structure.
pub fn sanitize_path(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() == 2 && parts.iter().all(|p| !p.is_empty() && p.trim() == *p) {
        return parts.into_iter().map(sanitize).collect::<Vec<_>>().join(".");
    }
    sanitize(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_ident("gold"));
        assert!(is_ident("_tmp"));
        assert!(is_ident("café"));
        assert!(!is_ident("2nd"));
        assert!(!is_ident("a b"));
        assert!(is_ident_path("forest.clearing"));
        assert!(!is_ident_path("forest."));
    }

    #[test]
    fn test_path_len() {
        assert_eq!(path_len("knot.stitch -> x"), 11);
        assert_eq!(path_len("knot."), 4);
        assert_eq!(path_len("-> x"), 0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Town Square"), "Town_Square");
        assert_eq!(sanitize("What's next?"), "What_s_next");
        assert_eq!(sanitize("2nd Floor"), "_2nd_Floor");
        assert_eq!(sanitize("!!!"), "_");
        assert_eq!(sanitize_path("Forest.Clearing spot"), "Forest.Clearing_spot");
        assert_eq!(sanitize_path("Mr. Smith"), "Mr_Smith");
    }
}
