//! Part 21 statement tokenizer built from nom combinators.
//!
//! Turns `#12 = NAME(...)` and `#12 = ( A(...) B(...) )` statements into
//! [`Entity`] values that borrow from the file text.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::{opt, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// A parameter value inside an entity record.
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'a> {
    /// Entity reference (`#123`).
    Ref(u32),
    /// String value (`'text'`), still escaped.
    Str(&'a str),
    /// Integer value.
    Int(i64),
    /// Real value.
    Real(f64),
    /// Enumeration (`.VALUE.`).
    Enum(&'a str),
    /// Aggregate.
    List(Vec<Token<'a>>),
    /// Typed value such as `LENGTH_MEASURE(1.0)`.
    Typed(&'a str, Vec<Token<'a>>),
    /// Unset value (`$`).
    Null,
    /// Derived value (`*`).
    Derived,
}

/// One `NAME(params)` record. Simple entities have one part, complex
/// entities one per supertype.
#[derive(Clone, Debug, PartialEq)]
pub struct Part<'a> {
    pub name: &'a str,
    pub params: Vec<Token<'a>>,
}

/// A parsed data-section statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity<'a> {
    pub id: u32,
    pub parts: Vec<Part<'a>>,
}

impl<'a> Entity<'a> {
    /// Type name of a simple entity; complex entities report the name of
    /// their first part.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.parts.first().map_or("", |p| p.name)
    }

    /// Returns `true` for `( A(...) B(...) )` records.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.parts.len() > 1
    }

    /// Finds the part with type `name`.
    #[must_use]
    pub fn part(&self, name: &str) -> Option<&Part<'a>> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Returns `true` if any part has type `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.part(name).is_some()
    }
}

/// Whitespace and `/* */` comments.
fn ws(input: &str) -> IResult<&str, ()> {
    let (input, _) = many0(alt((
        multispace1,
        recognize((tag("/*"), take_until("*/"), tag("*/"))),
    )))
    .parse(input)?;
    Ok((input, ()))
}

fn keyword(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

fn entity_id(input: &str) -> IResult<&str, u32> {
    let (rest, digits) = preceded(char('#'), take_while1(|c: char| c.is_ascii_digit())).parse(input)?;
    match digits.parse::<u32>() {
        Ok(id) => Ok((rest, id)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn entity_ref(input: &str) -> IResult<&str, Token<'_>> {
    let (input, id) = entity_id(input)?;
    Ok((input, Token::Ref(id)))
}

/// `'text'` with `''` as an escaped quote.
fn step_string(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('\'')(input)?;
    let bytes = input.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        if bytes[end] == b'\'' {
            if bytes.get(end + 1) == Some(&b'\'') {
                end += 2;
                continue;
            }
            return Ok((&input[end + 1..], Token::Str(&input[..end])));
        }
        end += 1;
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn parse_real(text: &str) -> Option<f64> {
    lexical_core::parse::<f64>(text.as_bytes())
        .ok()
        .or_else(|| text.parse::<f64>().ok())
}

fn number(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, text) = recognize((
        opt(alt((char('-'), char('+')))),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
    ))
    .parse(input)?;

    let token = if text.contains(['.', 'e', 'E']) {
        parse_real(text).map(Token::Real)
    } else {
        lexical_core::parse::<i64>(text.as_bytes())
            .ok()
            .map(Token::Int)
            .or_else(|| parse_real(text).map(Token::Real))
    };
    match token {
        Some(t) => Ok((rest, t)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn enumeration(input: &str) -> IResult<&str, Token<'_>> {
    let (input, name) = delimited(
        char('.'),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        char('.'),
    )
    .parse(input)?;
    Ok((input, Token::Enum(name)))
}

fn null_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('$')(input)?;
    Ok((input, Token::Null))
}

fn derived_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('*')(input)?;
    Ok((input, Token::Derived))
}

fn params(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    delimited(
        pair(char('('), ws),
        separated_list0((ws, char(','), ws), token),
        pair(ws, char(')')),
    )
    .parse(input)
}

fn list(input: &str) -> IResult<&str, Token<'_>> {
    let (input, items) = params(input)?;
    Ok((input, Token::List(items)))
}

fn typed_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, name) = keyword(input)?;
    let (input, _) = ws(input)?;
    let (input, args) = params(input)?;
    Ok((input, Token::Typed(name, args)))
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        entity_ref,
        step_string,
        null_value,
        derived_value,
        enumeration,
        number,
        list,
        typed_value,
    ))
    .parse(input)
}

fn part(input: &str) -> IResult<&str, Part<'_>> {
    let (input, name) = keyword(input)?;
    let (input, _) = ws(input)?;
    let (input, params) = params(input)?;
    Ok((input, Part { name, params }))
}

fn spaced_part(input: &str) -> IResult<&str, Part<'_>> {
    let (input, p) = part(input)?;
    let (input, _) = ws(input)?;
    Ok((input, p))
}

fn complex_parts(input: &str) -> IResult<&str, Vec<Part<'_>>> {
    delimited(pair(char('('), ws), many1(spaced_part), char(')')).parse(input)
}

fn simple_part(input: &str) -> IResult<&str, Vec<Part<'_>>> {
    let (input, p) = part(input)?;
    Ok((input, vec![p]))
}

fn statement(input: &str) -> IResult<&str, Entity<'_>> {
    let (input, _) = ws(input)?;
    let (input, id) = entity_id(input)?;
    let (input, _) = (ws, char('='), ws).parse(input)?;
    let (input, parts) = alt((complex_parts, simple_part)).parse(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = opt(char(';')).parse(input)?;
    let (input, _) = ws(input)?;
    Ok((input, Entity { id, parts }))
}

/// Parses one data-section statement (with or without its trailing `;`).
///
/// # Errors
///
/// Returns a message describing where parsing stopped.
pub fn parse_statement(text: &str) -> Result<Entity<'_>, String> {
    match statement(text) {
        Ok(("", entity)) => Ok(entity),
        Ok((rest, _)) => Err(format!("unexpected trailing input {:?}", snippet(rest))),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(format!("cannot parse {:?}", snippet(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete statement".into()),
    }
}

/// Extracts the leading `#id` of a statement, for error reporting.
#[must_use]
pub fn leading_id(text: &str) -> Option<u32> {
    let (rest, ()) = ws(text).ok()?;
    entity_id(rest).ok().map(|(_, id)| id)
}

fn snippet(s: &str) -> &str {
    let end = s
        .char_indices()
        .nth(40)
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn simple_entity() {
        let e = parse_statement("#12 = CARTESIAN_POINT('', (0., 1.5, -2.E-01));").unwrap();
        assert_eq!(e.id, 12);
        assert_eq!(e.name(), "CARTESIAN_POINT");
        assert_eq!(
            e.parts[0].params,
            vec![
                Token::Str(""),
                Token::List(vec![Token::Real(0.0), Token::Real(1.5), Token::Real(-0.2)]),
            ]
        );
    }

    #[test]
    fn references_enums_and_unset() {
        let e = parse_statement("#7=ORIENTED_EDGE('',*,*,#40,.F.)").unwrap();
        assert_eq!(
            e.parts[0].params,
            vec![
                Token::Str(""),
                Token::Derived,
                Token::Derived,
                Token::Ref(40),
                Token::Enum("F"),
            ]
        );
        let e = parse_statement("#8=AXIS2_PLACEMENT_3D('',#1,$,$);").unwrap();
        assert_eq!(e.parts[0].params[2], Token::Null);
    }

    #[test]
    fn complex_entity() {
        let text = "#30 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) );";
        let e = parse_statement(text).unwrap();
        assert!(e.is_complex());
        assert_eq!(e.parts.len(), 3);
        assert!(e.has("SI_UNIT"));
        assert_eq!(e.part("SI_UNIT").unwrap().params[1], Token::Enum("METRE"));
    }

    #[test]
    fn typed_values_and_escaped_strings() {
        let e = parse_statement("#5=MEASURE('it''s',LENGTH_MEASURE(2.5),(1,2));").unwrap();
        assert_eq!(e.parts[0].params[0], Token::Str("it''s"));
        assert_eq!(
            e.parts[0].params[1],
            Token::Typed("LENGTH_MEASURE", vec![Token::Real(2.5)])
        );
        assert_eq!(
            e.parts[0].params[2],
            Token::List(vec![Token::Int(1), Token::Int(2)])
        );
    }

    #[test]
    fn comments_are_whitespace() {
        let e = parse_statement("/* face */ #3 = VERTEX_POINT( '' , /* p */ #2 ) ;").unwrap();
        assert_eq!(e.parts[0].params[1], Token::Ref(2));
    }

    #[test]
    fn malformed_statements() {
        assert!(parse_statement("#3 = VERTEX_POINT('', #2").is_err());
        assert!(parse_statement("3 = VERTEX_POINT('', #2);").is_err());
        assert!(parse_statement("#3 = VERTEX_POINT('', #2) junk").is_err());
        assert_eq!(leading_id("  #44 = X("), Some(44));
    }
}
