use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat};
use winnow::error::{ErrMode, ModalResult, ParserError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::types::{Action, Condition, ParsedCondition};

const KEYWORDS: &[&str] = &["AND", "OR", "NOT", "LEVEL", "NOTE"];

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Words & keywords -------------------------------------------------------

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+' | '*' | '/')
}

fn word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., is_word_char).parse_next(input)
}

/// Match `kw` as a whole word, case-insensitively. Backtracks otherwise.
fn keyword(input: &mut &str, kw: &str) -> ModalResult<()> {
    let checkpoint = input.checkpoint();
    let w = word.parse_next(input)?;
    if w.eq_ignore_ascii_case(kw) {
        Ok(())
    } else {
        input.reset(&checkpoint);
        Err(ErrMode::from_input(input))
    }
}

fn and_kw(input: &mut &str) -> ModalResult<()> {
    keyword(input, "AND")
}

fn or_kw(input: &mut &str) -> ModalResult<()> {
    keyword(input, "OR")
}

fn not_kw(input: &mut &str) -> ModalResult<()> {
    keyword(input, "NOT")
}

fn level_kw(input: &mut &str) -> ModalResult<()> {
    keyword(input, "LEVEL")
}

fn note_kw(input: &mut &str) -> ModalResult<()> {
    keyword(input, "NOTE")
}

// -- Values -----------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

// -- Expressions (precedence: OR < AND < NOT < primary) ---------------------

fn reference(input: &mut &str) -> ModalResult<Condition> {
    let checkpoint = input.checkpoint();
    let first = word.parse_next(input)?;
    if KEYWORDS.iter().any(|kw| first.eq_ignore_ascii_case(kw)) {
        input.reset(&checkpoint);
        return Err(ErrMode::from_input(input));
    }
    if first.eq_ignore_ascii_case("THIS") {
        return Ok(Condition::This);
    }
    if opt(':').parse_next(input)?.is_some() {
        let name = cut_err(word)
            .context(StrContext::Expected(StrContextValue::Description(
                "name after field",
            )))
            .parse_next(input)?;
        return Ok(Condition::Ref {
            field: Some(first.to_owned()),
            name: name.to_owned(),
        });
    }
    Ok(Condition::Ref {
        field: None,
        name: first.to_owned(),
    })
}

fn primary(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    alt((delimited('(', expr, (ws, cut_err(')'))), reference))
        .context(StrContext::Expected(StrContextValue::Description(
            "expression",
        )))
        .parse_next(input)
}

fn unary(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    if opt(not_kw).parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Condition::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Condition> {
    let first = unary(input)?;
    let rest: Vec<Condition> =
        repeat(0.., preceded((ws, and_kw), cut_err(unary))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Condition::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<Condition> {
    let first = and_expr(input)?;
    let rest: Vec<Condition> =
        repeat(0.., preceded((ws, or_kw), cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Condition::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Actions ----------------------------------------------------------------

fn action_argument(input: &mut &str) -> ModalResult<String> {
    delimited(
        (ws, cut_err('('), ws),
        cut_err(string_literal),
        (ws, cut_err(')')),
    )
    .context(StrContext::Expected(StrContextValue::Description(
        "quoted argument",
    )))
    .parse_next(input)
}

fn action(input: &mut &str) -> ModalResult<Action> {
    ws.parse_next(input)?;
    if opt(level_kw).parse_next(input)?.is_some() {
        return action_argument.map(Action::Level).parse_next(input);
    }
    if opt(note_kw).parse_next(input)?.is_some() {
        return action_argument.map(Action::Note).parse_next(input);
    }
    Err(ErrMode::from_input(input))
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_condition(input: &mut &str) -> ModalResult<ParsedCondition> {
    let expr = cut_err(expr)
        .context(StrContext::Expected(StrContextValue::Description(
            "condition",
        )))
        .parse_next(input)?;
    let actions: Vec<Action> = repeat(0.., action).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(ParsedCondition { expr, actions })
}
