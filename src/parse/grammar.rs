use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::types::{ConditionNode, FalsePolicy, Operator, Part, Sequence, Token, Value};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    multispace0.void().parse_next(input)
}

// -- Identifiers ------------------------------------------------------------

fn word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Id between braces, up to the first unescaped `}`. A backslash takes the
/// next character literally.
fn braced_id(input: &mut &str) -> ModalResult<String> {
    '{'.parse_next(input)?;
    let mut id = String::new();
    loop {
        let ch = cut_err(any)
            .context(StrContext::Expected(StrContextValue::CharLiteral('}')))
            .parse_next(input)?;
        match ch {
            '}' if id.is_empty() => return Err(ErrMode::from_input(input).cut()),
            '}' => return Ok(id),
            '\\' => id.push(cut_err(any).parse_next(input)?),
            c => id.push(c),
        }
    }
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any).parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
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

/// Integer or float, with an optional leading sign.
fn number(input: &mut &str) -> ModalResult<Value> {
    let text = (
        opt('-'),
        digit1,
        opt(('.', digit1)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)?;
    if text.contains(['.', 'e', 'E']) {
        let f: f64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Value::float(f).map_err(|_| ErrMode::from_input(input).cut())
    } else {
        let i: i64 = text
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Int(i))
    }
}

// -- Tokens -----------------------------------------------------------------

fn field_or_accessor(input: &mut &str) -> ModalResult<Token> {
    let id = braced_id.parse_next(input)?;
    let part = opt(preceded(
        '.',
        cut_err(alt((
            "selection".value(Part::Selection),
            "extra".value(Part::Extra),
            "nodeId".value(Part::NodeId),
        )))
        .context(StrContext::Expected(StrContextValue::Description(
            "selection, extra or nodeId",
        ))),
    ))
    .parse_next(input)?;
    Ok(match part {
        Some(part) => {
            let label = format!("{id} ({part})");
            Token::adv_part(id, part, label)
        }
        None => Token::field(id.clone(), id),
    })
}

fn formula_ref(input: &mut &str) -> ModalResult<Token> {
    let id = preceded('@', cut_err(braced_id)).parse_next(input)?;
    Ok(Token::formula_ref(id.clone(), id))
}

fn word_token(input: &mut &str) -> ModalResult<Token> {
    let name = word.parse_next(input)?;
    Ok(match name {
        "true" => Token::value(true),
        "false" => Token::value(false),
        name => Token::function(name),
    })
}

fn value_token(input: &mut &str) -> ModalResult<Token> {
    alt((
        field_or_accessor,
        formula_ref,
        string_literal.map(Token::value),
        number.map(Token::value),
        word_token,
        condition,
    ))
    .parse_next(input)
}

fn operator(input: &mut &str) -> ModalResult<Token> {
    alt((
        ">=".value(Operator::Gte),
        "<=".value(Operator::Lte),
        "!=".value(Operator::Neq),
        "&&".value(Operator::And),
        "||".value(Operator::Or),
        "=".value(Operator::Eq),
        ">".value(Operator::Gt),
        "<".value(Operator::Lt),
        "+".value(Operator::Add),
        "-".value(Operator::Sub),
        "*".value(Operator::Mul),
        "/".value(Operator::Div),
        "%".value(Operator::Rem),
        "!".value(Operator::Not),
    ))
    .map(Token::operator)
    .parse_next(input)
}

/// `-` directly before a digit is a sign only where a value is expected.
fn item(input: &mut &str, expect_value: bool) -> ModalResult<Token> {
    if expect_value {
        alt((value_token, operator))
            .context(StrContext::Label("token"))
            .parse_next(input)
    } else {
        alt((operator, value_token))
            .context(StrContext::Label("token"))
            .parse_next(input)
    }
}

fn at_boundary(input: &str) -> bool {
    input.is_empty() || input.starts_with(['?', ':', ']'])
}

/// Tokens up to end of input or the next `?`, `:` or `]`.
fn items(input: &mut &str) -> ModalResult<Sequence> {
    let mut tokens: Vec<Token> = Vec::new();
    loop {
        ws.parse_next(input)?;
        if at_boundary(input) {
            return Ok(Sequence::from(tokens));
        }
        let expect_value = tokens.last().is_none_or(Token::is_operator);
        tokens.push(item(input, expect_value)?);
    }
}

/// `[expr ? then : else]`, optionally followed by `!ignore`.
fn condition(input: &mut &str) -> ModalResult<Token> {
    '['.parse_next(input)?;
    let expr = items.parse_next(input)?;
    cut_err('?')
        .context(StrContext::Expected(StrContextValue::CharLiteral('?')))
        .parse_next(input)?;
    let then = items.parse_next(input)?;
    cut_err(':')
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let otherwise = items.parse_next(input)?;
    cut_err(']')
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    let policy = if opt("!ignore").parse_next(input)?.is_some() {
        FalsePolicy::Ignore
    } else {
        FalsePolicy::Zero
    };
    Ok(Token::cond(ConditionNode::from_parts(
        expr, then, otherwise, policy,
    )))
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_sequence(input: &mut &str) -> ModalResult<Sequence> {
    let seq = items.parse_next(input)?;
    ws.parse_next(input)?;
    Ok(seq)
}
