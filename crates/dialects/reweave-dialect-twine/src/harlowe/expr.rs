//! Harlowe expressions: sigiled variables, word operators, `'s` property
//! access and value macros.

use reweave_core::expr::{is_ident_continue, Cursor, Op, Token};
use reweave_core::scan::split_top_level;

use super::extract::macro_at;

pub(crate) fn lex(src: &str) -> Vec<Token> {
    let mut cur = Cursor::new(src);
    let mut out: Vec<Token> = Vec::new();
    loop {
        cur.skip_ws();
        let Some(c) = cur.peek() else { break };
        if c == '\'' && cur.rest().starts_with("'s") && out.last().is_some_and(Token::ends_operand) {
            cur.eat("'s");
            out.push(Token::Dot);
            continue;
        }
        if let Some(s) = cur.string() {
            out.push(Token::Str(s));
            continue;
        }
        if c.is_ascii_digit() {
            if let Some(n) = cur.number() {
                out.push(Token::Num(n.to_string()));
                continue;
            }
        }
        if (c == '$' || c == '_') && cur.peek_nth(1).is_some_and(char::is_alphabetic) {
            cur.bump();
            let name = cur.take_while(is_ident_continue).to_string();
            out.push(Token::Var {
                name,
                temp: c == '_',
            });
            continue;
        }
        if c == '(' {
            if let Some(call) = macro_at(src, cur.pos()) {
                out.push(value_macro(&call.name, call.args));
                cur.seek(call.end);
                continue;
            }
        }
        if c.is_alphabetic() {
            out.push(word(&mut cur));
            continue;
        }
        out.push(symbol(&mut cur));
    }
    out
}

fn value_macro(name: &str, args: &str) -> Token {
    let args: Vec<Vec<Token>> = split_top_level(args, ',')
        .into_iter()
        .filter(|a| !a.trim().is_empty())
        .map(lex)
        .collect();
    match name {
        "a" | "array" => Token::Array(args),
        "dm" | "datamap" => {
            let mut pairs = Vec::new();
            let mut iter = args.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                pairs.push((k, v));
            }
            Token::Map(pairs)
        }
        _ => Token::Call {
            name: name.to_string(),
            args,
        },
    }
}

fn word(cur: &mut Cursor<'_>) -> Token {
    if cur.eat_word("is") {
        let save = cur.pos();
        cur.skip_ws();
        if cur.eat_word("not") {
            return Token::Op(Op::Ne);
        }
        if cur.eat_word("in") {
            return Token::Op(Op::In);
        }
        cur.seek(save);
        return Token::Op(Op::Eq);
    }
    let word = cur.take_while(is_ident_continue);
    match word {
        "and" => Token::Op(Op::And),
        "or" => Token::Op(Op::Or),
        "not" => Token::Op(Op::Not),
        "contains" => Token::Op(Op::Contains),
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        "to" | "into" | "of" => Token::Raw(word.to_string()),
        "visits" | "visit" => Token::Call {
            name: "visited".to_string(),
            args: Vec::new(),
        },
        other => Token::Ident(other.to_string()),
    }
}

fn symbol(cur: &mut Cursor<'_>) -> Token {
    for (text, op) in [(">=", Op::Ge), ("<=", Op::Le)] {
        if cur.eat(text) {
            return Token::Op(op);
        }
    }
    match cur.bump() {
        Some('>') => Token::Op(Op::Gt),
        Some('<') => Token::Op(Op::Lt),
        Some('+') => Token::Op(Op::Add),
        Some('-') => Token::Op(Op::Sub),
        Some('*') => Token::Op(Op::Mul),
        Some('/') => Token::Op(Op::Div),
        Some('%') => Token::Op(Op::Rem),
        Some(',') => Token::Comma,
        Some(c @ ('(' | '[')) => Token::Open(c),
        Some(c @ (')' | ']')) => Token::Close(c),
        Some(c) => Token::Raw(c.to_string()),
        None => Token::Raw(String::new()),
    }
}

/// Replace every whole-word `word` outside string literals.
pub(crate) fn replace_word(text: &str, word: &str, with: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else { break };
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if rest.starts_with(word) {
            let before = text[..i].chars().next_back();
            let after = rest[word.len()..].chars().next();
            let bounded = |ch: Option<char>| ch.is_none_or(|ch| !is_ident_continue(ch) && ch != '$');
            if bounded(before) && bounded(after) {
                out.push_str(with);
                i += word.len();
                continue;
            }
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_operators() {
        let toks = lex("$a is not 3 and _b contains \"x\"");
        assert_eq!(
            toks,
            vec![
                Token::var("a"),
                Token::Op(Op::Ne),
                Token::Num("3".into()),
                Token::Op(Op::And),
                Token::Var {
                    name: "b".into(),
                    temp: true
                },
                Token::Op(Op::Contains),
                Token::Str("x".into()),
            ]
        );
    }

    #[test]
    fn test_value_macros() {
        let toks = lex("(a: 1, (dm: \"k\", 2))");
        let Token::Array(items) = &toks[0] else {
            panic!("expected array, got {toks:?}");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1][0], Token::Map(pairs) if pairs.len() == 1));

        let toks = lex("(random: 1, 6)");
        assert!(matches!(&toks[0], Token::Call { name, args } if name == "random" && args.len() == 2));
    }

    #[test]
    fn test_possessive_property() {
        let toks = lex("$hero's name");
        assert_eq!(
            toks,
            vec![Token::var("hero"), Token::Dot, Token::Ident("name".into())]
        );
    }

    #[test]
    fn test_is_in() {
        let toks = lex("\"key\" is in $bag");
        assert_eq!(toks[1], Token::Op(Op::In));
    }

    #[test]
    fn test_replace_it() {
        assert_eq!(replace_word("it + 1", "it", "$x"), "$x + 1");
        assert_eq!(replace_word("\"it\" + item", "it", "$x"), "\"it\" + item");
    }
}
