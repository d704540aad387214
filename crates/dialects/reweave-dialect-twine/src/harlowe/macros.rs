//! Harlowe macro classification.
//!
//! Classifies macros by kind to guide extraction: changers attach hooks,
//! commands are standalone, control flow creates branches, and value
//! macros return data.

use reweave_core::scan::unquote;

/// The kind of a Harlowe macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// Changers modify the presentation of their attached hook:
    /// `(color:)`, `(text-style:)`, `(font:)`, `(transition:)`, etc.
    Changer,
    /// Commands perform actions: `(set:)`, `(go-to:)`, `(display:)`, `(print:)`.
    Command,
    /// Control flow macros create branches: `(if:)`, `(else-if:)`, `(else:)`, `(unless:)`.
    ControlFlow,
    /// Value macros return data: `(str:)`, `(num:)`, `(random:)`, `(a:)`, `(dm:)`.
    Value,
}

/// Normalize a Harlowe macro name.
///
/// Harlowe macro names are case-, dash-, and underscore-insensitive:
/// `(Go-To:)`, `(goto:)`, `(GOTO:)`, `(Go_To:)` are all equivalent.
pub fn normalize_macro_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Classify a normalized macro name.
pub fn macro_kind(name: &str) -> MacroKind {
    match name {
        "if" | "elseif" | "else" | "unless" | "for" | "loop" => MacroKind::ControlFlow,

        "color" | "colour" | "textcolour" | "textcolor" | "textstyle" | "font" | "align"
        | "transition" | "t8n" | "transitiontime" | "t8ntime" | "transitionarrive"
        | "t8narrive" | "transitiondepart" | "t8ndepart" | "transitiondelay" | "t8ndelay"
        | "transitionskip" | "t8nskip" | "textrotatez" | "textrotatex" | "textrotatey"
        | "textrotate" | "hoverstyle" | "css" | "background" | "bg" | "box" | "floatbox"
        | "charstyle" | "linestyle" | "pagestyle" | "opacity" | "textindent" | "textsize"
        | "size" | "collapse" | "nobr" | "verbatim" | "hidden" | "action" => MacroKind::Changer,

        "str" | "string" | "text" | "num" | "number" | "a" | "array" | "dm" | "datamap"
        | "ds" | "dataset" | "random" | "either" | "round" | "floor" | "ceil" | "abs"
        | "min" | "max" | "pow" | "sqrt" | "sorted" | "reversed" | "shuffled" | "count"
        | "range" | "joined" | "lowercase" | "uppercase" | "upperfirst" | "lowerfirst"
        | "substring" | "subarray" | "nth" | "cond" | "rgb" | "rgba" | "hsl" | "hsla"
        | "currentdate" | "currenttime" | "weekday" | "passage" | "passages" | "visited"
        | "visits" | "turns" | "history" | "plural" | "digitformat" | "trimmed" | "words"
        | "datanames" | "datavalues" | "dataentries" | "dmnames" | "dmvalues"
        | "dmentries" => MacroKind::Value,

        // Unknown macros default to Command (standalone, no hook)
        _ => MacroKind::Command,
    }
}

/// Check if a macro is a clause of an if-chain (`else-if`, `else`).
pub fn is_if_clause(name: &str) -> bool {
    matches!(name, "elseif" | "else")
}

/// Check if a macro typically attaches a hook.
pub fn expects_hook(name: &str) -> bool {
    matches!(macro_kind(name), MacroKind::Changer | MacroKind::ControlFlow)
        || matches!(
            name,
            "link"
                | "linkreveal"
                | "linkrevealgoto"
                | "linkrepeat"
                | "linkrerun"
                | "linkreplace"
                | "click"
                | "clickreplace"
                | "clickappend"
                | "clickprepend"
                | "clickrerun"
                | "mouseover"
                | "mouseout"
                | "live"
                | "event"
                | "after"
                | "replace"
                | "append"
                | "prepend"
                | "dialog"
                | "columns"
        )
}

/// Feature name reported for a macro with no dialect-neutral meaning.
pub fn unsupported_feature(name: &str) -> &'static str {
    match name {
        "click" | "clickreplace" | "clickappend" | "clickprepend" | "clickrerun"
        | "clickgoto" => "click",
        "mouseover" | "mouseout" | "mouseoverreplace" | "mouseoutreplace" => "mouseover",
        "enchant" | "enchantin" => "enchant",
        "event" => "event",
        _ => "macro",
    }
}

/// CSS equivalent of a presentation changer, when it has a direct one.
pub fn changer_css(name: &str, args: &str) -> Option<String> {
    let arg = args.trim();
    let value = unquote(arg).unwrap_or_else(|| arg.to_string());
    let css = match name {
        "color" | "colour" | "textcolour" | "textcolor" => format!("color: {value}"),
        "background" | "bg" => format!("background-color: {value}"),
        "font" => format!("font-family: {value}"),
        "css" => value,
        "textstyle" => match value.as_str() {
            "bold" => "font-weight: bold".to_string(),
            "italic" => "font-style: italic".to_string(),
            "underline" => "text-decoration: underline".to_string(),
            "strike" => "text-decoration: line-through".to_string(),
            "superscript" => "vertical-align: super".to_string(),
            "subscript" => "vertical-align: sub".to_string(),
            "mark" => "background-color: yellow".to_string(),
            _ => return None,
        },
        _ => return None,
    };
    Some(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_is_case_and_dash_insensitive() {
        assert_eq!(normalize_macro_name("Go-To"), "goto");
        assert_eq!(normalize_macro_name("go_to"), "goto");
        assert_eq!(normalize_macro_name("ELSE-IF"), "elseif");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(macro_kind("if"), MacroKind::ControlFlow);
        assert_eq!(macro_kind("colour"), MacroKind::Changer);
        assert_eq!(macro_kind("either"), MacroKind::Value);
        assert_eq!(macro_kind("set"), MacroKind::Command);
        assert_eq!(macro_kind("somethingnew"), MacroKind::Command);
    }

    #[test]
    fn test_expects_hook() {
        assert!(expects_hook("if"));
        assert!(expects_hook("link"));
        assert!(expects_hook("textstyle"));
        assert!(!expects_hook("set"));
        assert!(!expects_hook("linkgoto"));
    }

    #[test]
    fn test_changer_css() {
        assert_eq!(changer_css("colour", "red").as_deref(), Some("color: red"));
        assert_eq!(
            changer_css("textstyle", "\"bold\"").as_deref(),
            Some("font-weight: bold")
        );
        assert_eq!(changer_css("textstyle", "\"shudder\""), None);
        assert_eq!(changer_css("transition", "\"dissolve\""), None);
    }
}
