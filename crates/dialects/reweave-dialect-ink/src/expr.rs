//! Ink expressions: bare identifiers, C-style and word operators, `?` for
//! list containment and knot names standing for visit counts.

use reweave_core::expr::{Cursor, Op, Token};
use reweave_core::LexContext;

use crate::ident::path_len;

pub(crate) fn lex(src: &str, cx: &LexContext<'_>) -> Vec<Token> {
    let mut cur = Cursor::new(src);
    let mut out = Vec::new();
    loop {
        cur.skip_ws();
        let Some(c) = cur.peek() else { break };
        if c == '"' {
            if let Some(s) = cur.string() {
                out.push(Token::Str(s));
                continue;
            }
        }
        if c.is_ascii_digit() {
            if let Some(n) = cur.number() {
                out.push(Token::Num(n.to_string()));
                continue;
            }
        }
        let len = path_len(cur.rest());
        if len > 0 {
            let path = &cur.rest()[..len];
            cur.seek(cur.pos() + len);
            word(path, &mut cur, cx, &mut out);
            continue;
        }
        out.push(symbol(&mut cur));
    }
    out
}

fn word(path: &str, cur: &mut Cursor<'_>, cx: &LexContext<'_>, out: &mut Vec<Token>) {
    let op = match path {
        "and" => Some(Op::And),
        "or" => Some(Op::Or),
        "not" => Some(Op::Not),
        "mod" => Some(Op::Rem),
        "has" => Some(Op::Contains),
        _ => None,
    };
    if let Some(op) = op {
        out.push(Token::Op(op));
        return;
    }
    match path {
        "true" => return out.push(Token::Bool(true)),
        "false" => return out.push(Token::Bool(false)),
        _ => {}
    }
    if cur.peek() == Some('(') && path == "RANDOM" {
        if let Some(args) = call_args(cur, cx) {
            out.push(Token::Call {
                name: "random".to_string(),
                args,
            });
            return;
        }
    }
    if cur.peek() != Some('(') && cx.is_passage(path) {
        out.push(Token::Call {
            name: "visited".to_string(),
            args: vec![vec![Token::Str(path.to_string())]],
        });
        return;
    }
    let mut parts = path.split('.');
    let head = parts.next().unwrap_or_default();
    if cur.peek() == Some('(') {
        out.push(Token::Ident(path.to_string()));
        return;
    }
    out.push(Token::Var {
        name: head.to_string(),
        temp: cx.temps.contains(head),
    });
    for part in parts {
        out.push(Token::Dot);
        out.push(Token::Ident(part.to_string()));
    }
}

/// Comma-separated arguments of the call whose `(` is at the cursor.
fn call_args(cur: &mut Cursor<'_>, cx: &LexContext<'_>) -> Option<Vec<Vec<Token>>> {
    let src = cur.source();
    let open = cur.pos();
    let mut depth = 0usize;
    let mut end = None;
    for (i, c) in src[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let inner = &src[open + 1..end];
    cur.seek(end + 1);
    Some(
        inner
            .split(',')
            .filter(|a| !a.trim().is_empty())
            .map(|a| lex(a, cx))
            .collect(),
    )
}

fn symbol(cur: &mut Cursor<'_>) -> Token {
    const OPS: &[(&str, Op)] = &[
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("&&", Op::And),
        ("||", Op::Or),
        ("<", Op::Lt),
        (">", Op::Gt),
        ("+", Op::Add),
        ("*", Op::Mul),
        ("/", Op::Div),
        ("%", Op::Rem),
    ];
    for raw in ["->", "!?", "^"] {
        if cur.eat(raw) {
            return Token::Raw(raw.to_string());
        }
    }
    if cur.eat("?") {
        return Token::Op(Op::Contains);
    }
    if cur.eat("!") {
        return Token::Op(Op::Not);
    }
    if cur.eat("-") {
        return Token::Op(Op::Sub);
    }
    for (text, op) in OPS {
        if cur.eat(text) {
            return Token::Op(*op);
        }
    }
    match cur.bump() {
        Some(',') => Token::Comma,
        Some(':') => Token::Colon,
        Some(c @ ('(' | '[')) => Token::Open(c),
        Some(c @ (')' | ']')) => Token::Close(c),
        Some(c) => Token::Raw(c.to_string()),
        None => Token::Raw(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_operators_and_words() {
        let cx = LexContext::default();
        let toks = lex("gold >= 5 and not seen || x mod 2 == 0", &cx);
        assert_eq!(
            toks,
            vec![
                Token::var("gold"),
                Token::Op(Op::Ge),
                Token::Num("5".into()),
                Token::Op(Op::And),
                Token::Op(Op::Not),
                Token::var("seen"),
                Token::Op(Op::Or),
                Token::var("x"),
                Token::Op(Op::Rem),
                Token::Num("2".into()),
                Token::Op(Op::Eq),
                Token::Num("0".into()),
            ]
        );
    }

    #[test]
    fn test_knot_names_are_visit_counts() {
        let names: HashSet<String> = ["forest".to_string(), "forest.clearing".to_string()].into();
        let cx = LexContext::new(&names);
        let toks = lex("forest.clearing && gold", &cx);
        assert_eq!(
            toks[0],
            Token::Call {
                name: "visited".into(),
                args: vec![vec![Token::Str("forest.clearing".into())]],
            }
        );
        assert_eq!(toks[2], Token::var("gold"));
    }

    #[test]
    fn test_temps_and_random() {
        let mut cx = LexContext::default();
        cx.temps.insert("roll".to_string());
        let toks = lex("roll + RANDOM(1, 6)", &cx);
        assert_eq!(
            toks[0],
            Token::Var {
                name: "roll".into(),
                temp: true
            }
        );
        assert!(matches!(&toks[2], Token::Call { name, args } if name == "random" && args.len() == 2));
    }

    #[test]
    fn test_list_containment() {
        let toks = lex("inventory ? sword", &LexContext::default());
        assert_eq!(toks[1], Token::Op(Op::Contains));
    }
}
