//! Textual `tsquery` parser.
//!
//! Shunting-yard over two stacks. `!`, `&` and `<N>` bind tight and are reduced right after a
//! value is pushed, `|` waits for `)` or end of input.
use std::mem;

use super::{TsQuery, TsQueryLexeme, Weight};
use crate::error::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Open,
    Not,
    And,
    Or,
    Phrase(u16),
}

#[derive(Debug, Clone, Copy)]
enum State {
    NextToken,
    /// Inside bare lexeme.
    WaitEnd,
    /// Inside quoted lexeme.
    WaitEndComplex,
    /// After `:` following a lexeme.
    InWeightInfo,
    PushedVal,
    Finish,
}

fn syntax_error(pos: usize) -> FormatError {
    FormatError::new("syntax error in tsquery", pos)
}

fn pop_pair(values: &mut Vec<TsQuery>, pos: usize) -> Result<(TsQuery, TsQuery), FormatError> {
    match (values.pop(), values.pop()) {
        (Some(right), Some(left)) => Ok((left, right)),
        _ => Err(syntax_error(pos)),
    }
}

fn combine(op: Op, left: TsQuery, right: TsQuery, pos: usize) -> Result<TsQuery, FormatError> {
    match op {
        Op::And => Ok(TsQuery::and(left, right)),
        Op::Or => Ok(TsQuery::or(left, right)),
        Op::Phrase(distance) => Ok(TsQuery::phrase(left, distance, right)),
        Op::Open | Op::Not => Err(syntax_error(pos)),
    }
}

/// Read the phrase operator after `<`, up to and including `>`.
fn phrase_distance(chars: &[char], pos: &mut usize) -> Result<u16, FormatError> {
    let start = *pos - 1;
    let mut inner = String::new();
    let mut closed = false;

    while let Some(&ch) = chars.get(*pos) {
        *pos += 1;
        if ch == '>' {
            closed = true;
            break;
        }
        inner.push(ch);
    }

    if inner.is_empty() || !closed {
        return Err(FormatError::new("malformed phrase operator", start));
    }

    if inner == "-" {
        return Ok(1);
    }

    match inner.trim().parse::<i16>() {
        Ok(distance) if distance >= 0 => Ok(distance as u16),
        _ => Err(FormatError::new("malformed distance in phrase operator", start)),
    }
}

pub(super) fn parse(input: &str) -> Result<TsQuery, FormatError> {
    let chars = input.chars().collect::<Vec<_>>();
    let mut values = Vec::<TsQuery>::new();
    let mut ops = Vec::<Op>::new();
    let mut text = String::new();
    let mut pos = 0;
    let mut expecting_bin_op = false;
    let mut state = State::NextToken;

    loop {
        match state {
            State::NextToken => {
                let Some(&ch) = chars.get(pos) else {
                    state = State::Finish;
                    continue;
                };
                pos += 1;

                if ch == '\'' {
                    state = State::WaitEndComplex;
                    continue;
                }

                let unexpected = match ch {
                    ')' | '|' | '&' => !expecting_bin_op,
                    '(' | '!' => expecting_bin_op,
                    _ => false,
                };
                if unexpected {
                    return Err(FormatError::new("unexpected token in tsquery", pos - 1));
                }

                match ch {
                    '<' => {
                        let distance = phrase_distance(&chars, &mut pos)?;
                        ops.push(Op::Phrase(distance));
                        expecting_bin_op = false;
                    }
                    '(' | '!' | '&' => {
                        ops.push(match ch {
                            '(' => Op::Open,
                            '!' => Op::Not,
                            _ => Op::And,
                        });
                        expecting_bin_op = false;
                    }
                    '|' => {
                        if ops.last() == Some(&Op::Or) {
                            let (left, right) = pop_pair(&mut values, pos)?;
                            values.push(TsQuery::or(left, right));
                        } else {
                            ops.push(Op::Or);
                        }
                        expecting_bin_op = false;
                    }
                    ')' => {
                        while let Some(&op) = ops.last() {
                            if op == Op::Open {
                                break;
                            }
                            if values.len() < 2 || op == Op::Not {
                                return Err(syntax_error(pos - 1));
                            }
                            let (left, right) = pop_pair(&mut values, pos)?;
                            ops.pop();
                            values.push(combine(op, left, right, pos)?);
                        }
                        if ops.pop().is_none() {
                            return Err(FormatError::new(
                                "closing parenthesis without an opening parenthesis",
                                pos - 1,
                            ));
                        }
                        state = State::PushedVal;
                    }
                    ':' => return Err(FormatError::new("unexpected `:` in tsquery", pos - 1)),
                    ch if ch.is_whitespace() => {}
                    _ => {
                        pos -= 1;
                        if expecting_bin_op {
                            return Err(FormatError::new("unexpected lexeme in tsquery", pos));
                        }
                        state = State::WaitEnd;
                    }
                }
            }
            State::WaitEnd => {
                let ch = match chars.get(pos) {
                    Some(&ch) if !(ch.is_whitespace() || matches!(ch, '!' | '&' | '|' | '(' | ')')) => ch,
                    _ => {
                        values.push(TsQuery::lexeme(mem::take(&mut text)));
                        state = State::PushedVal;
                        continue;
                    }
                };
                pos += 1;

                if ch == ':' {
                    values.push(TsQuery::lexeme(mem::take(&mut text)));
                    state = State::InWeightInfo;
                    continue;
                }

                let ch = unescape(ch, &chars, &mut pos)?;
                text.push(ch);
            }
            State::WaitEndComplex => {
                let Some(&ch) = chars.get(pos) else {
                    return Err(FormatError::new("missing terminating `'` in string literal", pos));
                };
                pos += 1;

                if ch == '\'' {
                    if chars.get(pos) == Some(&'\'') {
                        pos += 1;
                        text.push('\'');
                        continue;
                    }

                    values.push(TsQuery::lexeme(mem::take(&mut text)));
                    if chars.get(pos) == Some(&':') {
                        pos += 1;
                        state = State::InWeightInfo;
                    } else {
                        state = State::PushedVal;
                    }
                    continue;
                }

                let ch = unescape(ch, &chars, &mut pos)?;
                text.push(ch);
            }
            State::InWeightInfo => {
                let Some(&ch) = chars.get(pos) else {
                    state = State::Finish;
                    continue;
                };
                let Some(TsQuery::Lexeme(lexeme)) = values.last_mut() else {
                    return Err(syntax_error(pos));
                };

                match ch {
                    '*' => lexeme.prefix = true,
                    'a' | 'A' => add_weight(lexeme, Weight::A),
                    'b' | 'B' => add_weight(lexeme, Weight::B),
                    'c' | 'C' => add_weight(lexeme, Weight::C),
                    'd' | 'D' => add_weight(lexeme, Weight::D),
                    _ => {
                        state = State::PushedVal;
                        continue;
                    }
                }
                pos += 1;
            }
            State::PushedVal => {
                text.clear();

                while let Some(&op) = ops.last() {
                    match op {
                        Op::And | Op::Phrase(_) => {
                            let (left, right) = pop_pair(&mut values, pos)?;
                            values.push(combine(op, left, right, pos)?);
                        }
                        Op::Not => {
                            let Some(child) = values.pop() else {
                                return Err(syntax_error(pos));
                            };
                            values.push(TsQuery::not(child));
                        }
                        Op::Open | Op::Or => break,
                    }
                    ops.pop();
                }

                expecting_bin_op = true;
                state = State::NextToken;
            }
            State::Finish => {
                while let Some(op) = ops.pop() {
                    let (left, right) = pop_pair(&mut values, pos)?;
                    values.push(combine(op, left, right, pos)?);
                }

                return match (values.pop(), values.is_empty()) {
                    (Some(query), true) => Ok(query),
                    _ => Err(syntax_error(pos)),
                };
            }
        }
    }
}

fn add_weight(lexeme: &mut TsQueryLexeme, weight: Weight) {
    lexeme.weight |= weight;
}

fn unescape(ch: char, chars: &[char], pos: &mut usize) -> Result<char, FormatError> {
    if ch != '\\' {
        return Ok(ch);
    }
    let Some(&escaped) = chars.get(*pos) else {
        return Err(FormatError::new("unexpected `\\` at end of value", *pos));
    };
    *pos += 1;
    Ok(escaped)
}

#[cfg(test)]
mod test {
    use super::*;

    fn lex(s: &str) -> TsQuery {
        TsQuery::lexeme(s)
    }

    #[test]
    fn concrete_scenarios() {
        let query = parse("'cat' & 'dog'").unwrap();
        assert_eq!(query, TsQuery::and(lex("cat"), lex("dog")));
        assert_eq!(query.to_string(), "'cat' & 'dog'");

        assert_eq!(parse("!( 'a' | 'b' )").unwrap(), TsQuery::not(TsQuery::or(lex("a"), lex("b"))));
        assert_eq!(parse("'a' <2> 'b'").unwrap(), TsQuery::phrase(lex("a"), 2, lex("b")));
        assert_eq!(parse("'a' <-> 'b'").unwrap(), TsQuery::phrase(lex("a"), 1, lex("b")));
    }

    #[test]
    fn precedence() {
        // `&` binds tighter than `|`
        assert_eq!(
            parse("a | b & c").unwrap(),
            TsQuery::or(lex("a"), TsQuery::and(lex("b"), lex("c")))
        );
        assert_eq!(
            parse("a & b | c").unwrap(),
            TsQuery::or(TsQuery::and(lex("a"), lex("b")), lex("c"))
        );
        assert_eq!(
            parse("!a & b").unwrap(),
            TsQuery::and(TsQuery::not(lex("a")), lex("b"))
        );
        assert_eq!(
            parse("a | b | c").unwrap(),
            TsQuery::or(TsQuery::or(lex("a"), lex("b")), lex("c"))
        );
        assert_eq!(
            parse("(a | b) & c").unwrap(),
            TsQuery::and(TsQuery::or(lex("a"), lex("b")), lex("c"))
        );
    }

    #[test]
    fn lexeme_forms() {
        let query = parse("'it''s':*AB & fo\\&o:c").unwrap();
        let TsQuery::And(left, right) = query else { panic!("expected and") };
        let TsQuery::Lexeme(left) = *left else { panic!("expected lexeme") };
        assert_eq!(left.text(), "it's");
        assert!(left.is_prefix());
        assert_eq!(left.weight(), Weight::A | Weight::B);
        let TsQuery::Lexeme(right) = *right else { panic!("expected lexeme") };
        assert_eq!(right.text(), "fo&o");
        assert_eq!(right.weight(), Weight::C);

        assert_eq!(parse(" 'a' <  3 > 'b' ").unwrap(), TsQuery::phrase(lex("a"), 3, lex("b")));
    }

    #[test]
    fn errors() {
        assert_eq!(parse("& a").unwrap_err().position(), 0);
        assert!(parse("a b").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("a)").is_err());
        assert!(parse("'a").is_err());
        assert!(parse("a <-1> b").is_err());
        assert!(parse("a <x> b").is_err());
        assert!(parse("a <> b").is_err());
        assert!(parse("a <1 b").is_err());
        assert!(parse("").is_err());
        assert!(parse("a\\").is_err());
        assert!(parse(":a").is_err());
        // weight annotation at end of input skips the eager reduction
        assert!(parse("!a:*").is_err());
        assert_eq!(parse("!a:* ").unwrap(), TsQuery::not(TsQuery::Lexeme(TsQueryLexeme::new("a").with_prefix(true))));
    }

    #[test]
    fn display_round_trip() {
        let trees = [
            TsQuery::and(TsQuery::and(lex("a"), lex("b")), lex("c")),
            TsQuery::or(TsQuery::and(lex("a"), TsQuery::not(lex("b"))), lex("c")),
            TsQuery::and(TsQuery::or(lex("a"), lex("b")), TsQuery::phrase(lex("c"), 4, lex("d"))),
            TsQuery::not(TsQuery::phrase(lex("x y"), 0, TsQuery::Lexeme(TsQueryLexeme::new("z").with_weight(Weight::D)))),
            TsQuery::phrase(TsQuery::phrase(lex("a"), 1, lex("b")), 2, lex("c")),
        ];
        for tree in trees {
            assert_eq!(parse(&tree.to_string()).unwrap(), tree, "{tree}");
        }
    }
}
