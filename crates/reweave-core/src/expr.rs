//! Dialect-neutral expression tokens.
//!
//! Each dialect lexes its own expression syntax into [`Token`]s and prints
//! tokens back out through [`ExprPrinter`]. Conversion between two dialects
//! is lex-with-source then print-with-target; whatever the lexer does not
//! understand travels as [`Token::Raw`].

/// Operators with a counterpart in every dialect that has expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `collection contains item`
    Contains,
    /// `item is in collection`
    In,
    /// JS ternary `?`
    Question,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Var { name: String, temp: bool },
    Ident(String),
    /// String literal contents without quotes.
    Str(String),
    Num(String),
    Bool(bool),
    Op(Op),
    Open(char),
    Close(char),
    Comma,
    Colon,
    /// Property access.
    Dot,
    /// Function or value-macro call. Names `random`, `either` and `visited`
    /// are canonical across dialects; `visited` counts visits, and with no
    /// argument counts them for the current passage.
    Call { name: String, args: Vec<Vec<Token>> },
    Array(Vec<Vec<Token>>),
    Map(Vec<(Vec<Token>, Vec<Token>)>),
    Raw(String),
}

impl Token {
    pub fn var(name: impl Into<String>) -> Self {
        Token::Var {
            name: name.into(),
            temp: false,
        }
    }

    /// Tokens after which a `[` is indexing rather than an array literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Var { .. }
                | Token::Ident(_)
                | Token::Str(_)
                | Token::Num(_)
                | Token::Bool(_)
                | Token::Close(_)
                | Token::Call { .. }
                | Token::Array(_)
                | Token::Map(_)
        )
    }
}

/// The single variable an expression consists of, if it is one.
pub fn simple_var(tokens: &[Token]) -> Option<(&str, bool)> {
    match tokens {
        [Token::Var { name, temp }] => Some((name.as_str(), *temp)),
        _ => None,
    }
}

/// Expression-level features present in `tokens`, depth-first, each name
/// listed once per occurrence.
pub fn expression_features(tokens: &[Token]) -> Vec<&'static str> {
    let mut out = Vec::new();
    collect_features(tokens, &mut out);
    out
}

fn collect_features(tokens: &[Token], out: &mut Vec<&'static str>) {
    for tok in tokens {
        match tok {
            Token::Array(items) => {
                out.push("array");
                for item in items {
                    collect_features(item, out);
                }
            }
            Token::Map(pairs) => {
                out.push("datamap");
                for (k, v) in pairs {
                    collect_features(k, out);
                    collect_features(v, out);
                }
            }
            Token::Call { name, args } => {
                match name.as_str() {
                    "random" => out.push("random"),
                    "either" => out.push("either"),
                    "visited" if args.is_empty() => out.push("visits"),
                    "visited" => out.push("visited"),
                    _ => {}
                }
                for arg in args {
                    collect_features(arg, out);
                }
            }
            _ => {}
        }
    }
}

/// Give argument-less `visited` calls (the current passage's visit count)
/// `passage` as their argument.
pub fn name_current_passage(tokens: &mut [Token], passage: &str) {
    for tok in tokens {
        match tok {
            Token::Call { name, args } if name.as_str() == "visited" && args.is_empty() => {
                args.push(vec![Token::Str(passage.to_string())]);
            }
            Token::Call { args, .. } | Token::Array(args) => {
                for arg in args {
                    name_current_passage(arg, passage);
                }
            }
            Token::Map(pairs) => {
                for (k, v) in pairs {
                    name_current_passage(k, passage);
                    name_current_passage(v, passage);
                }
            }
            _ => {}
        }
    }
}

/// Split a token list on top-level commas.
pub fn split_commas(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut out = vec![Vec::new()];
    let mut depth = 0usize;
    for tok in tokens {
        match tok {
            Token::Open(_) => depth += 1,
            Token::Close(_) => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                out.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(last) = out.last_mut() {
            last.push(tok);
        }
    }
    if out.len() == 1 && out[0].is_empty() {
        out.clear();
    }
    out
}

// ── Printing ───────────────────────────────────────────────────────────

/// Target-side expression syntax.
///
/// Implementors supply the leaf forms; [`ExprPrinter::print`] handles
/// spacing and the infix/functional split of `contains`.
pub trait ExprPrinter {
    fn var(&self, name: &str, temp: bool) -> String;
    fn op(&self, op: Op) -> &'static str;
    fn call(&self, name: &str, args: Vec<String>) -> String;
    fn array(&self, items: Vec<String>) -> String;
    fn map(&self, pairs: Vec<(String, String)>) -> String;

    fn string(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    }

    /// Property access separator and whether a space follows it.
    fn dot(&self) -> (&'static str, bool) {
        (".", false)
    }

    /// Whether the current passage's visit count has to name the passage.
    fn names_current_passage(&self) -> bool {
        false
    }

    /// `haystack contains needle`; JS-style targets override with a method
    /// call.
    fn contains(&self, haystack: String, needle: String) -> String {
        format!("{haystack} {} {needle}", self.op(Op::Contains))
    }

    fn print(&self, tokens: &[Token]) -> String {
        // `contains` / `is in` may need to become a call wrapping both
        // operands, so split on them before the flat pass.
        if let Some(idx) = top_level_position(tokens, |t| {
            matches!(t, Token::Op(Op::Contains) | Token::Op(Op::In))
        }) {
            let (lo, hi) = clause_bounds(tokens, idx);
            let lhs = self.print(&tokens[lo..idx]);
            let rhs = self.print(&tokens[idx + 1..hi]);
            let joined = match tokens[idx] {
                Token::Op(Op::In) => self.contains(rhs, lhs),
                _ => self.contains(lhs, rhs),
            };
            let mut out = String::new();
            if lo > 0 {
                out.push_str(&self.print(&tokens[..lo]));
                out.push(' ');
            }
            out.push_str(&joined);
            if hi < tokens.len() {
                out.push(' ');
                out.push_str(&self.print(&tokens[hi..]));
            }
            return out;
        }

        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        let mut glue_next = false;
        for tok in tokens {
            let piece = match tok {
                Token::Var { name, temp } => self.var(name, *temp),
                Token::Ident(s) | Token::Num(s) | Token::Raw(s) => s.clone(),
                Token::Str(s) => self.string(s),
                Token::Bool(b) => b.to_string(),
                Token::Op(op) => self.op(*op).to_string(),
                Token::Open(c) | Token::Close(c) => c.to_string(),
                Token::Comma => ",".to_string(),
                Token::Colon => ":".to_string(),
                Token::Dot => self.dot().0.to_string(),
                Token::Call { name, args } => {
                    self.call(name, args.iter().map(|a| self.print(a)).collect())
                }
                Token::Array(items) => self.array(items.iter().map(|i| self.print(i)).collect()),
                Token::Map(pairs) => self.map(
                    pairs
                        .iter()
                        .map(|(k, v)| (self.print(k), self.print(v)))
                        .collect(),
                ),
            };
            if let Some(p) = prev {
                if !glue_next && wants_space(p, tok) {
                    out.push(' ');
                }
            }
            glue_next = match tok {
                Token::Open(_) => true,
                Token::Dot => !self.dot().1,
                Token::Op(op) => *op == Op::Not && piece == "!",
                _ => false,
            };
            out.push_str(&piece);
            prev = Some(tok);
        }
        out
    }
}

fn wants_space(prev: &Token, next: &Token) -> bool {
    match next {
        Token::Close(_) | Token::Comma | Token::Dot => false,
        Token::Open(_) => !prev.ends_operand(),
        _ => true,
    }
}

fn top_level_position(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Open(_) => depth += 1,
            Token::Close(_) => depth = depth.saturating_sub(1),
            t if depth == 0 && pred(t) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Span around `idx` up to the nearest top-level `and` / `or` / `,` on
/// either side.
fn clause_bounds(tokens: &[Token], idx: usize) -> (usize, usize) {
    let is_break = |t: &Token| matches!(t, Token::Op(Op::And) | Token::Op(Op::Or) | Token::Comma);
    let mut lo = 0;
    let mut depth = 0isize;
    for i in (0..idx).rev() {
        match &tokens[i] {
            Token::Close(_) => depth += 1,
            Token::Open(_) => depth -= 1,
            t if depth == 0 && is_break(t) => {
                lo = i + 1;
                break;
            }
            _ => {}
        }
        if depth < 0 {
            lo = i + 1;
            break;
        }
    }
    let mut hi = tokens.len();
    depth = 0;
    for (i, tok) in tokens.iter().enumerate().skip(idx + 1) {
        match tok {
            Token::Open(_) => depth += 1,
            Token::Close(_) => depth -= 1,
            t if depth == 0 && is_break(t) => {
                hi = i;
                break;
            }
            _ => {}
        }
        if depth < 0 {
            hi = i;
            break;
        }
    }
    (lo, hi)
}

// ── Lexing support ─────────────────────────────────────────────────────

/// Character cursor shared by the dialect expression lexers.
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The whole input.
    pub fn source(&self) -> &'a str {
        self.src
    }

    /// Jump to an absolute byte offset (clamped to the input).
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Consume `s` if the input continues with it.
    pub fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consume the keyword `word` only when it is not a prefix of a longer
    /// identifier.
    pub fn eat_word(&mut self, word: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(word) {
            return false;
        }
        let after = rest[word.len()..].chars().next();
        if after.is_some_and(is_ident_continue) {
            return false;
        }
        self.pos += word.len();
        true
    }

    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    pub fn ident(&mut self) -> Option<&'a str> {
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        Some(self.take_while(is_ident_continue))
    }

    /// A quoted string (`"`, `'` or `` ` ``) with backslash escapes.
    pub fn string(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| matches!(c, '"' | '\'' | '`'))?;
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == '\\' {
                if let Some(escaped) = self.bump() {
                    out.push(escaped);
                }
            } else if c == quote {
                return Some(out);
            } else {
                out.push(c);
            }
        }
        self.pos = start;
        None
    }

    pub fn number(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || (*c == '.' && *i > 0))
            .count();
        if len == 0 {
            return None;
        }
        let text = &rest[..len];
        self.pos += len;
        Some(text)
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Words;

    impl ExprPrinter for Words {
        fn var(&self, name: &str, _temp: bool) -> String {
            format!("${name}")
        }
        fn op(&self, op: Op) -> &'static str {
            match op {
                Op::Eq => "is",
                Op::And => "and",
                Op::Not => "not",
                Op::Add => "+",
                Op::Gt => ">",
                Op::Contains => "contains",
                _ => "?",
            }
        }
        fn call(&self, name: &str, args: Vec<String>) -> String {
            format!("({name}: {})", args.join(", "))
        }
        fn array(&self, items: Vec<String>) -> String {
            format!("(a: {})", items.join(", "))
        }
        fn map(&self, pairs: Vec<(String, String)>) -> String {
            let flat: Vec<String> = pairs.into_iter().flat_map(|(k, v)| [k, v]).collect();
            format!("(dm: {})", flat.join(", "))
        }
    }

    struct Js;

    impl ExprPrinter for Js {
        fn var(&self, name: &str, _temp: bool) -> String {
            name.to_string()
        }
        fn op(&self, op: Op) -> &'static str {
            match op {
                Op::And => "&&",
                Op::Not => "!",
                Op::Gt => ">",
                _ => "?",
            }
        }
        fn call(&self, name: &str, args: Vec<String>) -> String {
            format!("{name}({})", args.join(", "))
        }
        fn array(&self, items: Vec<String>) -> String {
            format!("[{}]", items.join(", "))
        }
        fn map(&self, _pairs: Vec<(String, String)>) -> String {
            "{}".into()
        }
        fn contains(&self, haystack: String, needle: String) -> String {
            format!("{haystack}.includes({needle})")
        }
    }

    #[test]
    fn prints_with_spacing() {
        let toks = vec![
            Token::var("gold"),
            Token::Op(Op::Add),
            Token::Num("1".into()),
        ];
        assert_eq!(Words.print(&toks), "$gold + 1");
    }

    #[test]
    fn bang_glues_to_operand() {
        let toks = vec![Token::Op(Op::Not), Token::var("done")];
        assert_eq!(Js.print(&toks), "!done");
        assert_eq!(Words.print(&toks), "not $done");
    }

    #[test]
    fn contains_becomes_method_call_per_clause() {
        let toks = vec![
            Token::var("inv"),
            Token::Op(Op::Contains),
            Token::Str("key".into()),
            Token::Op(Op::And),
            Token::var("hp"),
            Token::Op(Op::Gt),
            Token::Num("0".into()),
        ];
        assert_eq!(Js.print(&toks), "inv.includes(\"key\") && hp > 0");
        assert_eq!(Words.print(&toks), "$inv contains \"key\" and $hp > 0");
    }

    #[test]
    fn is_in_swaps_operands() {
        let toks = vec![Token::Str("key".into()), Token::Op(Op::In), Token::var("inv")];
        assert_eq!(Js.print(&toks), "inv.includes(\"key\")");
    }

    #[test]
    fn nested_collections_report_features() {
        let toks = vec![Token::Array(vec![
            vec![Token::Array(vec![vec![Token::Num("1".into())]])],
            vec![Token::Call {
                name: "random".into(),
                args: vec![],
            }],
        ])];
        assert_eq!(expression_features(&toks), vec!["array", "array", "random"]);
        assert_eq!(Js.print(&toks), "[[1], random()]");
    }

    #[test]
    fn cursor_reads_strings_and_words() {
        let mut c = Cursor::new("\"a\\\"b\" isnot");
        assert_eq!(c.string().as_deref(), Some("a\"b"));
        c.skip_ws();
        assert!(!c.eat_word("is"));
        assert!(c.eat_word("isnot"));
        assert!(c.is_eof());
    }

    #[test]
    fn split_commas_respects_parens() {
        let toks = vec![
            Token::Num("1".into()),
            Token::Comma,
            Token::Open('('),
            Token::Num("2".into()),
            Token::Comma,
            Token::Num("3".into()),
            Token::Close(')'),
        ];
        let parts = split_commas(toks);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].len(), 5);
    }
}
