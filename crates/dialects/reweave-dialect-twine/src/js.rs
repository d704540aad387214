//! JavaScript-family expressions, shared by SugarCube, Chapbook and
//! Snowman. The formats differ only in how they spell story variables
//! and which helpers they call for random values.

use reweave_core::expr::{is_ident_continue, is_ident_start, Cursor, Op, Token};
use reweave_core::scan::{find_word_top_level, matching_close, split_top_level, unquote};
use reweave_core::Assign;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    /// `$x`, `_x`, `State.variables.x`, word operators.
    SugarCube,
    /// Bare identifiers are story variables.
    Chapbook,
    /// `s.x` / `window.story.state.x`; lodash helpers.
    Snowman,
}

/// Globals a Chapbook expression may reference that are not story
/// variables.
const CHAPBOOK_GLOBALS: &[&str] = &[
    "Math", "Date", "JSON", "Number", "String", "Array", "Object", "Boolean", "parseInt",
    "parseFloat", "isNaN", "window", "document", "console", "passage", "story", "browser",
    "engine", "config", "random", "now", "undefined", "null", "NaN", "Infinity", "this", "new",
    "typeof",
];

pub(crate) fn lex(src: &str, flavor: Flavor) -> Vec<Token> {
    let mut lexer = Lexer {
        cur: Cursor::new(src),
        flavor,
        out: Vec::new(),
    };
    lexer.run();
    lexer.out
}

struct Lexer<'a> {
    cur: Cursor<'a>,
    flavor: Flavor,
    out: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        loop {
            self.cur.skip_ws();
            let Some(c) = self.cur.peek() else { break };
            if let Some(s) = self.cur.string() {
                self.out.push(Token::Str(s));
                continue;
            }
            if c.is_ascii_digit() {
                if let Some(n) = self.cur.number() {
                    self.out.push(Token::Num(n.to_string()));
                    continue;
                }
            }
            if self.flavor == Flavor::SugarCube && (c == '$' || c == '_') {
                let sigiled = self
                    .cur
                    .peek_nth(1)
                    .is_some_and(|n| n.is_alphabetic() || (c == '$' && n == '_'));
                if sigiled {
                    self.cur.bump();
                    let name = self.cur.take_while(is_ident_continue).to_string();
                    self.out.push(Token::Var {
                        name,
                        temp: c == '_',
                    });
                    self.properties(Vec::new());
                    continue;
                }
            }
            if is_ident_start(c) || c == '$' {
                self.word();
                continue;
            }
            match c {
                '[' if !self.after_operand() => self.array(),
                '{' if !self.after_operand() => self.object(),
                '(' | '[' | '{' => {
                    self.cur.bump();
                    self.out.push(Token::Open(c));
                }
                ')' | ']' | '}' => {
                    self.cur.bump();
                    self.out.push(Token::Close(c));
                }
                _ => self.operator(),
            }
        }
    }

    fn after_operand(&self) -> bool {
        self.out.last().is_some_and(Token::ends_operand)
    }

    fn word(&mut self) {
        let first = self
            .cur
            .take_while(|c| is_ident_continue(c) || c == '$')
            .to_string();
        if self.flavor == Flavor::SugarCube {
            let op = match first.as_str() {
                "is" | "eq" => Some(Op::Eq),
                "isnot" | "neq" => Some(Op::Ne),
                "gt" => Some(Op::Gt),
                "gte" => Some(Op::Ge),
                "lt" => Some(Op::Lt),
                "lte" => Some(Op::Le),
                "and" => Some(Op::And),
                "or" => Some(Op::Or),
                "not" => Some(Op::Not),
                _ => None,
            };
            if let Some(op) = op {
                self.out.push(Token::Op(op));
                return;
            }
        }
        match first.as_str() {
            "true" => return self.out.push(Token::Bool(true)),
            "false" => return self.out.push(Token::Bool(false)),
            _ => {}
        }

        let mut parts = vec![first];
        while self.cur.peek() == Some('.') && self.cur.peek_nth(1).is_some_and(is_ident_start) {
            self.cur.bump();
            parts.push(self.cur.take_while(is_ident_continue).to_string());
        }

        // Chapbook's count of visits to the current passage.
        let current_visits = matches!(
            parts.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
            ["visits"] | ["passage", "visits"]
        );
        if self.flavor == Flavor::Chapbook && current_visits && self.cur.peek() != Some('(') {
            self.out.push(Token::Call {
                name: "visited".to_string(),
                args: Vec::new(),
            });
            return;
        }

        if self.cur.peek() == Some('(') {
            if let Some(call) = self.canonical_call(&parts) {
                self.out.push(call);
                return;
            }
        }

        match self.story_variable(&parts) {
            Some((name, temp, rest)) => {
                self.out.push(Token::Var { name, temp });
                self.properties(rest);
            }
            None => {
                let mut iter = parts.into_iter();
                if let Some(head) = iter.next() {
                    self.out.push(Token::Ident(head));
                }
                self.properties(iter.collect());
            }
        }
    }

    /// Split a dotted path into a story variable and its trailing
    /// properties.
    fn story_variable(&self, parts: &[String]) -> Option<(String, bool, Vec<String>)> {
        let strs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let (name, temp, skip) = match (self.flavor, strs.as_slice()) {
            (Flavor::SugarCube, ["State", "variables", name, ..]) => (*name, false, 3),
            (Flavor::SugarCube, ["State", "temporary", name, ..]) => (*name, true, 3),
            (Flavor::Snowman, ["s", name, ..]) => (*name, false, 2),
            (Flavor::Snowman, ["story", "state", name, ..]) => (*name, false, 3),
            (Flavor::Snowman, ["window", "story", "state", name, ..]) => (*name, false, 4),
            (Flavor::Chapbook, [name, ..]) if !CHAPBOOK_GLOBALS.contains(name) => (*name, false, 1),
            _ => return None,
        };
        // Chapbook marks temporaries with a leading underscore.
        if let Some(bare) = name.strip_prefix('_').filter(|_| self.flavor == Flavor::Chapbook) {
            return Some((bare.to_string(), true, parts[skip..].to_vec()));
        }
        Some((name.to_string(), temp, parts[skip..].to_vec()))
    }

    /// Emit trailing `.prop` accessors, turning `.includes(x)` into
    /// `contains`.
    fn properties(&mut self, mut rest: Vec<String>) {
        while self.cur.peek() == Some('.') && self.cur.peek_nth(1).is_some_and(is_ident_start) {
            self.cur.bump();
            rest.push(self.cur.take_while(is_ident_continue).to_string());
        }
        let includes = rest.last().is_some_and(|m| m == "includes") && self.cur.peek() == Some('(');
        if includes {
            rest.pop();
        }
        for part in rest {
            self.out.push(Token::Dot);
            self.out.push(Token::Ident(part));
        }
        if includes {
            if let Some(mut args) = self.call_args() {
                self.out.push(Token::Op(Op::Contains));
                let arg = args.drain(..).next().unwrap_or_default();
                if arg.len() == 1 {
                    self.out.extend(arg);
                } else {
                    self.out.push(Token::Open('('));
                    self.out.extend(arg);
                    self.out.push(Token::Close(')'));
                }
            }
        }
    }

    fn canonical_call(&mut self, parts: &[String]) -> Option<Token> {
        let strs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let name = match (self.flavor, strs.as_slice()) {
            (Flavor::SugarCube, ["random" | "either" | "visited"]) => strs[0],
            (Flavor::Snowman, ["_", "random"]) => "random",
            (Flavor::Snowman, ["_", "sample"]) => "either",
            _ => return None,
        };
        let mut args = self.call_args()?;
        // `_.sample([a, b])` picks from one array argument.
        if name == "either" && args.len() == 1 {
            if let [Token::Array(items)] = args[0].as_slice() {
                args = items.clone();
            }
        }
        Some(Token::Call {
            name: name.to_string(),
            args,
        })
    }

    /// Consume a parenthesized argument list at the cursor.
    fn call_args(&mut self) -> Option<Vec<Vec<Token>>> {
        let (inner, end) = self.bracketed()?;
        self.cur.seek(end);
        Some(
            split_top_level(inner, ',')
                .into_iter()
                .filter(|a| !a.trim().is_empty())
                .map(|a| lex(a, self.flavor))
                .collect(),
        )
    }

    /// Inner text of the bracket pair opening at the cursor, and the offset
    /// just past it.
    fn bracketed(&self) -> Option<(&'a str, usize)> {
        let src = self.cur.source();
        let open = self.cur.pos();
        let end = matching_close(src, open, true)?;
        Some((&src[open + 1..end - 1], end))
    }

    fn array(&mut self) {
        let Some((inner, end)) = self.bracketed() else {
            self.cur.bump();
            self.out.push(Token::Open('['));
            return;
        };
        let items = split_top_level(inner, ',')
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .map(|i| lex(i, self.flavor))
            .collect();
        self.cur.seek(end);
        self.out.push(Token::Array(items));
    }

    fn object(&mut self) {
        let Some((inner, end)) = self.bracketed() else {
            self.cur.bump();
            self.out.push(Token::Open('{'));
            return;
        };
        let mut pairs = Vec::new();
        for entry in split_top_level(inner, ',') {
            if entry.trim().is_empty() {
                continue;
            }
            let key = split_top_level(entry, ':')[0];
            let value = entry.get(key.len() + 1..).unwrap_or("");
            let key = key.trim();
            let key_tokens = match unquote(key) {
                Some(s) => vec![Token::Str(s)],
                None if key.chars().all(is_ident_continue) => vec![Token::Str(key.to_string())],
                None => lex(key, self.flavor),
            };
            pairs.push((key_tokens, lex(value, self.flavor)));
        }
        self.cur.seek(end);
        self.out.push(Token::Map(pairs));
    }

    fn operator(&mut self) {
        const OPS: &[(&str, Op)] = &[
            ("===", Op::Eq),
            ("!==", Op::Ne),
            ("==", Op::Eq),
            ("!=", Op::Ne),
            ("<=", Op::Le),
            (">=", Op::Ge),
            ("&&", Op::And),
            ("||", Op::Or),
            ("<", Op::Lt),
            (">", Op::Gt),
            ("!", Op::Not),
            ("+", Op::Add),
            ("-", Op::Sub),
            ("*", Op::Mul),
            ("/", Op::Div),
            ("%", Op::Rem),
            ("?", Op::Question),
        ];
        if self.cur.rest().starts_with("=>") || self.cur.rest().starts_with("+=") {
            let raw = self.cur.take_while(|c| matches!(c, '=' | '>' | '+'));
            self.out.push(Token::Raw(raw.to_string()));
            return;
        }
        for (text, op) in OPS {
            if self.cur.eat(text) {
                self.out.push(Token::Op(*op));
                return;
            }
        }
        match self.cur.bump() {
            Some(',') => self.out.push(Token::Comma),
            Some(':') => self.out.push(Token::Colon),
            Some('.') => self.out.push(Token::Dot),
            Some(c) => self.out.push(Token::Raw(c.to_string())),
            None => {}
        }
    }
}

// ── Printing ───────────────────────────────────────────────────────────

pub(crate) fn op(op: Op) -> &'static str {
    match op {
        Op::Eq => "===",
        Op::Ne => "!==",
        Op::Lt => "<",
        Op::Le => "<=",
        Op::Gt => ">",
        Op::Ge => ">=",
        Op::And => "&&",
        Op::Or => "||",
        Op::Not => "!",
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Rem => "%",
        Op::Contains => "contains",
        Op::In => "in",
        Op::Question => "?",
    }
}

pub(crate) fn array(items: Vec<String>) -> String {
    format!("[{}]", items.join(", "))
}

pub(crate) fn object(pairs: Vec<(String, String)>) -> String {
    let body: Vec<String> = pairs.into_iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("{{{}}}", body.join(", "))
}

pub(crate) fn includes(haystack: String, needle: String) -> String {
    format!("{haystack}.includes({needle})")
}

/// `Math.random`-based stand-ins for targets without random helpers.
pub(crate) fn math_random(name: &str, args: &[String]) -> Option<String> {
    match (name, args) {
        ("random", [lo, hi]) => Some(format!(
            "Math.floor(Math.random() * ({hi} - {lo} + 1)) + {lo}"
        )),
        ("either", items) if !items.is_empty() => Some(format!(
            "[{}][Math.floor(Math.random() * {})]",
            items.join(", "),
            items.len()
        )),
        _ => None,
    }
}

/// `!(c)`, without parentheses around a lone operand.
pub(crate) fn negate(cond: &str) -> String {
    if is_atom(cond) {
        format!("!{cond}")
    } else {
        format!("!({cond})")
    }
}

/// `a && b`, parenthesizing operands that contain a lower-precedence `||`.
pub(crate) fn conjoin(a: &str, b: &str) -> String {
    format!("{} && {}", paren_if(a, "||"), paren_if(b, "||"))
}

pub(crate) fn paren_if(s: &str, needle: &str) -> String {
    if s.contains(needle) || s.contains('?') {
        format!("({s})")
    } else {
        s.to_string()
    }
}

/// A single operand: identifier path, literal or already-bracketed text.
pub(crate) fn is_atom(s: &str) -> bool {
    let s = s.trim();
    if s.starts_with('(') && matching_close(s, 0, true) == Some(s.len()) {
        return true;
    }
    !s.is_empty()
        && s.chars()
            .all(|c| is_ident_continue(c) || matches!(c, '.' | '$' | '_'))
}

// ── Statements ─────────────────────────────────────────────────────────

/// Parse one assignment statement: `x = v`, `x += v`, `x++`, or (with
/// `word_to`) SugarCube's `x to v`. Compound forms become plain
/// assignments of the expanded value.
pub(crate) fn parse_assign(stmt: &str, word_to: bool) -> Option<Assign> {
    let stmt = stmt.trim();
    if stmt.is_empty() {
        return None;
    }
    for (suffix, op) in [("++", "+"), ("--", "-")] {
        if let Some(target) = stmt.strip_suffix(suffix) {
            let target = target.trim();
            return is_lvalue(target).then(|| Assign::new(target, format!("{target} {op} 1")));
        }
    }
    if word_to {
        if let Some(at) = find_word_top_level(stmt, "to") {
            let target = stmt[..at].trim();
            let value = stmt[at + 2..].trim();
            return (is_lvalue(target) && !value.is_empty()).then(|| Assign::new(target, value));
        }
    }
    let at = assign_position(stmt)?;
    let (lhs, value) = (&stmt[..at], stmt[at + 1..].trim());
    let (target, compound) = match lhs.trim_end().chars().last() {
        Some(c @ ('+' | '-' | '*' | '/' | '%')) => (lhs.trim_end()[..lhs.trim_end().len() - 1].trim(), Some(c)),
        _ => (lhs.trim(), None),
    };
    if !is_lvalue(target) || value.is_empty() {
        return None;
    }
    let value = match compound {
        Some(op) if value.contains(' ') => format!("{target} {op} ({value})"),
        Some(op) => format!("{target} {op} {value}"),
        None => value.to_string(),
    };
    Some(Assign::new(target, value))
}

/// Offset of the first top-level `=` that is an assignment operator.
fn assign_position(stmt: &str) -> Option<usize> {
    let bytes = stmt.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b'=' if depth == 0 => {
                    let prev = i.checked_sub(1).map(|p| bytes[p]);
                    let next = bytes.get(i + 1).copied();
                    let comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>'))
                        || matches!(next, Some(b'=' | b'>'));
                    if !comparison {
                        return Some(i);
                    }
                    while bytes.get(i + 1) == Some(&b'=') {
                        i += 1;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Assignable: a (possibly sigiled) identifier path with optional index.
fn is_lvalue(s: &str) -> bool {
    let s = s.trim();
    let head = s.trim_start_matches(['$', '_']);
    head.chars().next().is_some_and(is_ident_start)
        && s.chars()
            .all(|c| is_ident_continue(c) || matches!(c, '.' | '$' | '[' | ']' | '"' | '\''))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sugarcube_sigils_and_words() {
        let toks = lex("$gold gte 10 and not _seen", Flavor::SugarCube);
        assert_eq!(
            toks,
            vec![
                Token::var("gold"),
                Token::Op(Op::Ge),
                Token::Num("10".into()),
                Token::Op(Op::And),
                Token::Op(Op::Not),
                Token::Var {
                    name: "seen".into(),
                    temp: true
                },
            ]
        );
    }

    #[test]
    fn test_sugarcube_state_variables() {
        let toks = lex("State.variables.hp.max", Flavor::SugarCube);
        assert_eq!(
            toks,
            vec![Token::var("hp"), Token::Dot, Token::Ident("max".into())]
        );
    }

    #[test]
    fn test_chapbook_bare_identifiers() {
        let toks = lex("gold > 5 && Math.max(a, 1)", Flavor::Chapbook);
        assert_eq!(toks[0], Token::var("gold"));
        assert_eq!(toks[4], Token::Ident("Math".into()));
        assert!(toks.contains(&Token::var("a")));
    }

    #[test]
    fn test_snowman_state_and_lodash() {
        let toks = lex("_.sample(['a', 'b']) + s.name", Flavor::Snowman);
        assert_eq!(
            toks[0],
            Token::Call {
                name: "either".into(),
                args: vec![vec![Token::Str("a".into())], vec![Token::Str("b".into())]],
            }
        );
        assert_eq!(toks[2], Token::var("name"));
    }

    #[test]
    fn test_includes_becomes_contains() {
        let toks = lex("$bag.includes(\"key\")", Flavor::SugarCube);
        assert_eq!(
            toks,
            vec![Token::var("bag"), Token::Op(Op::Contains), Token::Str("key".into())]
        );
    }

    #[test]
    fn test_collections() {
        let toks = lex("[1, [2, 3]]", Flavor::SugarCube);
        let Token::Array(items) = &toks[0] else {
            panic!("expected array, got {toks:?}");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1][0], Token::Array(_)));

        let toks = lex("{hp: 10, \"name\": 'x'}", Flavor::Snowman);
        let Token::Map(pairs) = &toks[0] else {
            panic!("expected map, got {toks:?}");
        };
        assert_eq!(pairs[0].0, vec![Token::Str("hp".into())]);
        assert_eq!(pairs[1].1, vec![Token::Str("x".into())]);
    }

    #[test]
    fn test_indexing_is_not_array() {
        let toks = lex("$list[0]", Flavor::SugarCube);
        assert_eq!(toks[1], Token::Open('['));
    }

    #[test]
    fn test_parse_assign_forms() {
        assert_eq!(parse_assign("$x to 5", true), Some(Assign::new("$x", "5")));
        assert_eq!(parse_assign("s.x = 5", false), Some(Assign::new("s.x", "5")));
        assert_eq!(
            parse_assign("$x += 2", true),
            Some(Assign::new("$x", "$x + 2"))
        );
        assert_eq!(
            parse_assign("s.n *= a + 1", false),
            Some(Assign::new("s.n", "s.n * (a + 1)"))
        );
        assert_eq!(parse_assign("$i++", true), Some(Assign::new("$i", "$i + 1")));
        assert_eq!(parse_assign("$a === 1", false), None);
        assert_eq!(parse_assign("alert('hi')", false), None);
    }

    #[test]
    fn test_assign_value_with_comparison() {
        assert_eq!(
            parse_assign("s.win = s.hp >= 10", false),
            Some(Assign::new("s.win", "s.hp >= 10"))
        );
    }
}
