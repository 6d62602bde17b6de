use winnow::combinator::{alt, cut_err, delimited, preceded, repeat};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, none_of, one_of, take_till, take_while};

use super::ParseError;
use crate::synth::Directive;

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'')
}

/// A bare token. `#` starts a comment only at the beginning of a token.
fn bare_word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        none_of(|c: char| is_delimiter(c) || c == '#'),
        take_while(0.., |c: char| !is_delimiter(c)),
    )
        .take()
        .parse_next(input)
}

fn quoted(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::Description(
                "closing quote",
            )))
            .parse_next(input)?;
        if ch == quote {
            return Ok(s);
        }
        if ch == '\\' {
            let esc = cut_err(any).parse_next(input)?;
            if esc != quote && esc != '\\' {
                s.push('\\');
            }
            s.push(esc);
            continue;
        }
        s.push(ch);
    }
}

fn argument(input: &mut &str) -> ModalResult<String> {
    alt((quoted, bare_word.map(str::to_owned))).parse_next(input)
}

fn comment(input: &mut &str) -> ModalResult<Directive> {
    preceded('#', take_till(0.., ['\n', '\r']))
        .map(|text: &str| Directive::comment(text.trim()))
        .parse_next(input)
}

fn block(input: &mut &str) -> ModalResult<Vec<Directive>> {
    delimited(
        '{',
        items,
        (
            ws,
            cut_err('}').context(StrContext::Expected(StrContextValue::CharLiteral('}'))),
        ),
    )
    .parse_next(input)
}

fn directive(input: &mut &str) -> ModalResult<Directive> {
    let name = bare_word.parse_next(input)?;
    let args: Vec<String> = repeat(0.., preceded(ws, argument)).parse_next(input)?;
    ws.parse_next(input)?;
    let body = cut_err(alt((';'.value(None), block.map(Some))))
        .context(StrContext::Expected(StrContextValue::Description(
            "';' or '{'",
        )))
        .parse_next(input)?;
    Ok(Directive {
        directive: name.to_owned(),
        args,
        comment: None,
        block: body,
    })
}

fn items(input: &mut &str) -> ModalResult<Vec<Directive>> {
    let found: Vec<Directive> =
        repeat(0.., preceded(ws, alt((comment, directive)))).parse_next(input)?;
    ws.parse_next(input)?;
    Ok(found)
}

/// Parse nginx configuration text into its top-level directives.
///
/// Comments become `#` nodes in place. Unbalanced braces, unterminated strings
/// and directives without `;` are rejected; nothing is returned on failure.
pub fn parse_document(input: &str) -> Result<Vec<Directive>, ParseError> {
    items
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
