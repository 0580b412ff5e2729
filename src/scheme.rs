//! The reader: turns source text into [`Value`] trees.
//!
//! Grammar, informally:
//!
//! ```text
//! datum    := number | constant | symbol | quoted | list
//! number   := "-"? digit+ ("." digit*)?
//! constant := "#t" | "#f" | "#\" char
//! symbol   := (letter | digit | one of +-*/!@$%^&_=<>?)+
//! quoted   := ("'" | "`" | "," | ",@") datum
//! list     := "(" datum* ("." datum)? ")"
//! ```
//!
//! Whitespace separates tokens and `;` starts a comment running to the end of
//! the line. [`Reader`] yields one top-level form at a time; after a malformed
//! form it skips past that form and carries on with the next one.

use std::iter::FusedIterator;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    sequence::{pair, preceded},
};

use crate::ast::{Value, is_symbol_char, list_from, list_with_tail, sym};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Treat `;` as the start of a line comment. When disabled a `;` is
    /// reported as an unexpected character.
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// Error produced inside the nom parsers, positioned at the offending input
#[derive(Debug)]
struct ReadError<'a> {
    input: &'a str,
    kind: ParseErrorKind,
    message: String,
}

impl<'a> nom::error::ParseError<&'a str> for ReadError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        let kind = if input.is_empty() {
            ParseErrorKind::Incomplete
        } else {
            ParseErrorKind::InvalidSyntax
        };
        ReadError {
            input,
            kind,
            message: "invalid syntax".to_owned(),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type ReadResult<'a, T> = IResult<&'a str, T, ReadError<'a>>;

/// Abort the current datum with a non-recoverable error at `input`
fn fail<'a, T>(input: &'a str, kind: ParseErrorKind, message: impl Into<String>) -> ReadResult<'a, T> {
    Err(nom::Err::Failure(ReadError {
        input,
        kind,
        message: message.into(),
    }))
}

fn is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

/// Characters that may follow a character constant such as `#\a`
fn is_delimiter(c: char) -> bool {
    is_whitespace(c) || matches!(c, '(' | ')' | ';')
}

fn whitespace(input: &str) -> ReadResult<'_, &str> {
    take_while(is_whitespace).parse(input)
}

fn comment(input: &str) -> ReadResult<'_, &str> {
    recognize(pair(char(';'), take_while(|c: char| c != '\n'))).parse(input)
}

/// Skip whitespace and, when enabled, comments
fn skip_atmosphere(input: &str, config: ParseConfig) -> ReadResult<'_, ()> {
    let (mut rest, _) = whitespace(input)?;
    while config.handle_comments {
        match comment(rest) {
            Ok((after_comment, _)) => (rest, _) = whitespace(after_comment)?,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((rest, ()))
}

/// Parse a number: optional minus sign, digits, optional fraction
fn parse_number(input: &str) -> ReadResult<'_, Value> {
    let number: ReadResult<'_, (Option<char>, (&str, Option<(char, &str)>))> = pair(
        opt(char('-')),
        pair(digit1, opt(pair(char('.'), digit0))),
    )
    .parse(input);
    let (rest, _) = number?;
    let lexeme = &input[..input.len() - rest.len()];

    match lexeme.parse::<f64>() {
        Ok(n) => Ok((rest, Value::Number(n))),
        Err(_) => fail(
            input,
            ParseErrorKind::InvalidSyntax,
            format!("invalid number '{lexeme}'"),
        ),
    }
}

/// Parse the character after `#\`. The names `#\n...` and `#\t...` are
/// reserved and rejected.
fn parse_character(input: &str) -> ReadResult<'_, Value> {
    let mut chars = input.chars();
    match chars.next() {
        None => fail(
            input,
            ParseErrorKind::Incomplete,
            "invalid character: unexpected end of input",
        ),
        Some('n' | 't') => fail(input, ParseErrorKind::InvalidSyntax, "invalid character"),
        Some(c) => {
            let rest = chars.as_str();
            if rest.chars().next().is_none_or(is_delimiter) {
                Ok((rest, Value::Character(c)))
            } else {
                fail(
                    input,
                    ParseErrorKind::InvalidSyntax,
                    format!("invalid character: #\\{c} must be followed by a delimiter"),
                )
            }
        }
    }
}

/// Parse a `#` constant: a boolean or a character
fn parse_constant(input: &str) -> ReadResult<'_, Value> {
    let constant: ReadResult<'_, Value> = preceded(
        char('#'),
        alt((
            value(Value::Bool(true), char('t')),
            value(Value::Bool(false), char('f')),
            preceded(char('\\'), parse_character),
        )),
    )
    .parse(input);

    match constant {
        Err(nom::Err::Error(_)) => fail(input, ParseErrorKind::InvalidSyntax, "invalid constant"),
        other => other,
    }
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> ReadResult<'_, Value> {
    let symbol: ReadResult<'_, &str> = take_while1(is_symbol_char).parse(input);
    let (rest, name) = symbol?;
    Ok((rest, Value::Symbol(name.to_owned())))
}

/// Parse a prefix mark and the datum after it: `'d` into `(quote d)`,
/// `` `d `` into `(quasiquote d)`, `,d` into `(unquote d)` and `,@d` into
/// `(unquote-splicing d)`
fn parse_quoted(input: &str, config: ParseConfig, depth: usize) -> ReadResult<'_, Value> {
    let mark: ReadResult<'_, &str> = alt((
        value("quote", char('\'')),
        value("quasiquote", char('`')),
        value("unquote-splicing", tag(",@")),
        value("unquote", char(',')),
    ))
    .parse(input);
    let (rest, name) = mark?;
    let (rest, ()) = skip_atmosphere(rest, config)?;
    if rest.is_empty() {
        return fail(
            rest,
            ParseErrorKind::Incomplete,
            format!("expected an expression after {name}, got end of input"),
        );
    }
    let (rest, datum) = parse_datum(rest, config, depth + 1)?;
    Ok((rest, list_from([sym(name), datum])))
}

/// Consume the `)` closing a list, reporting what was found otherwise
fn close_paren(input: &str) -> ReadResult<'_, ()> {
    match input.chars().next() {
        Some(')') => Ok((&input[1..], ())),
        None => fail(
            input,
            ParseErrorKind::Incomplete,
            "expected ')', got end of input",
        ),
        Some(c) => fail(
            input,
            ParseErrorKind::InvalidSyntax,
            format!("expected ')', got '{c}'"),
        ),
    }
}

/// Parse a proper or dotted list. Elements are read in a loop, so only
/// nesting counts toward [`MAX_PARSE_DEPTH`].
fn parse_list(input: &str, config: ParseConfig, depth: usize) -> ReadResult<'_, Value> {
    let open: ReadResult<'_, char> = char('(').parse(input);
    let (mut rest, _) = open?;
    let mut items = Vec::new();

    loop {
        let (after_space, ()) = skip_atmosphere(rest, config)?;
        rest = after_space;
        match rest.chars().next() {
            None | Some(')') => {
                let (rest, ()) = close_paren(rest)?;
                return Ok((rest, list_from(items)));
            }
            Some('.') if !items.is_empty() => {
                let (after_dot, ()) = skip_atmosphere(&rest[1..], config)?;
                if after_dot.is_empty() {
                    return fail(
                        after_dot,
                        ParseErrorKind::Incomplete,
                        "expected an expression after '.', got end of input",
                    );
                }
                let (after_tail, tail) = parse_datum(after_dot, config, depth + 1)?;
                let (after_tail, ()) = skip_atmosphere(after_tail, config)?;
                let (rest, ()) = close_paren(after_tail)?;
                return Ok((rest, list_with_tail(items, tail)));
            }
            Some(_) => {
                let (after_item, item) = parse_datum(rest, config, depth + 1)?;
                items.push(item);
                rest = after_item;
            }
        }
    }
}

/// Parse a single datum starting exactly at `input`
fn parse_datum(input: &str, config: ParseConfig, depth: usize) -> ReadResult<'_, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return fail(
            input,
            ParseErrorKind::TooDeeplyNested,
            format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        );
    }

    let mut chars = input.chars();
    match chars.next() {
        None => fail(input, ParseErrorKind::Incomplete, "unexpected end of input"),
        Some('(') => parse_list(input, config, depth),
        Some('\'' | '`' | ',') => parse_quoted(input, config, depth),
        Some('#') => parse_constant(input),
        Some(')') => fail(input, ParseErrorKind::InvalidSyntax, "unexpected ')'"),
        Some('.') => fail(input, ParseErrorKind::InvalidSyntax, "unexpected '.'"),
        Some(c) if c.is_ascii_digit() => parse_number(input),
        Some('-') if chars.next().is_some_and(|c| c.is_ascii_digit()) => parse_number(input),
        Some(c) if is_symbol_char(c) => parse_symbol(input),
        Some(c) => fail(
            input,
            ParseErrorKind::InvalidSyntax,
            format!("unexpected character '{c}'"),
        ),
    }
}

/// Input left after the top-level datum that starts `input` and failed to
/// read. A list is skipped through its matching `)` (or to the end of input);
/// any other datum is skipped as a single token.
fn skip_datum(input: &str, config: ParseConfig) -> &str {
    let start = input
        .trim_start_matches(|c: char| matches!(c, '\'' | '`' | ',' | '@') || is_whitespace(c));
    if !start.starts_with('(') {
        return skip_token(start);
    }

    let mut rest = start;
    let mut depth = 0usize;
    loop {
        let mut chars = rest.chars();
        let Some(c) = chars.next() else {
            return rest;
        };
        rest = chars.as_str();
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return rest;
                }
            }
            '#' if rest.starts_with('\\') => {
                // A character constant may name a paren
                let mut chars = rest[1..].chars();
                chars.next();
                rest = chars.as_str();
            }
            ';' if config.handle_comments => {
                rest = rest.find('\n').map_or("", |newline| &rest[newline..]);
            }
            _ => {}
        }
    }
}

/// Input left after the malformed token at the start of `input`
fn skip_token(input: &str) -> &str {
    let mut chars = input.chars();
    if chars.next() == Some('#') && chars.as_str().starts_with('\\') {
        chars.next();
        chars.next();
    }
    let rest = chars.as_str();
    rest.find(is_delimiter).map_or("", |end| &rest[end..])
}

/// Reads top-level forms from a source text one at a time.
///
/// As an iterator it yields `Ok(form)` for every well-formed form and
/// `Err(..)` for every malformed one. After an error, reading resumes right
/// after the malformed top-level form.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    source: &'a str,
    rest: &'a str,
    config: ParseConfig,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_config(source, ParseConfig::default())
    }

    pub fn with_config(source: &'a str, config: ParseConfig) -> Self {
        Reader {
            source,
            rest: source,
            config,
        }
    }

    /// Byte offset of the next unread character
    pub fn offset(&self) -> usize {
        self.source.len() - self.rest.len()
    }

    /// True when only whitespace and comments remain
    pub fn is_at_end(&self) -> bool {
        skip_atmosphere(self.rest, self.config).is_ok_and(|(rest, ())| rest.is_empty())
    }

    /// Read the next form, or `Ok(None)` once the input is exhausted
    pub fn read(&mut self) -> Result<Option<Value>, Error> {
        let start = match skip_atmosphere(self.rest, self.config) {
            Ok((start, ())) => start,
            Err(err) => return Err(self.recover(err, self.rest)),
        };
        self.rest = start;
        if start.is_empty() {
            return Ok(None);
        }

        match parse_datum(start, self.config, 0) {
            Ok((rest, form)) => {
                tracing::debug!(offset = self.offset(), %form, "read form");
                self.rest = rest;
                Ok(Some(form))
            }
            Err(err) => Err(self.recover(err, start)),
        }
    }

    /// Convert a parser failure inside the datum at `start` into an
    /// [`Error`] and move past that datum
    fn recover(&mut self, err: nom::Err<ReadError<'a>>, start: &'a str) -> Error {
        let (at, kind, message) = match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.kind, e.message),
            nom::Err::Incomplete(_) => (
                "",
                ParseErrorKind::Incomplete,
                "unexpected end of input".to_owned(),
            ),
        };

        let offset = self.source.len() - at.len();
        self.rest = skip_datum(start, self.config);
        tracing::debug!(offset, %message, resume = self.offset(), "reader error");

        Error::ParseError(ParseError::with_context(kind, message, self.source, offset))
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

impl FusedIterator for Reader<'_> {}

/// Parse exactly one form from `input`
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    parse_scheme_with_config(input, ParseConfig::default())
}

/// Parse exactly one form from `input` with the given reader options
pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    let mut reader = Reader::with_config(input, config);
    let form = reader.read()?.ok_or_else(|| {
        Error::ParseError(ParseError::from_message(
            ParseErrorKind::Incomplete,
            "empty input",
        ))
    })?;

    if !reader.is_at_end() {
        return Err(Error::ParseError(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "unexpected remaining input",
            input,
            reader.offset(),
        )));
    }
    Ok(form)
}

/// Parse every form in `input`, stopping at the first error
pub fn parse_all(input: &str) -> Result<Vec<Value>, Error> {
    Reader::new(input).collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::ast::{nil, sym, val};

    /// Test result variants for comprehensive parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Value),              // Parsing should succeed with this value
        SpecificError(&'static str), // Parsing should fail with error containing this string
        FailsWith(ParseErrorKind),   // Parsing should fail with this kind
        Error,                       // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    /// Helper for successful parse test cases
    fn success<T: Into<Value>>(value: T) -> ParseTestResult {
        Success(value.into())
    }

    fn quoted(datum: Value) -> Value {
        list_from([sym("quote"), datum])
    }

    /// Run comprehensive parse tests with display validation for successes
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} '{input}'", i + 1);
            let result = parse_scheme(input);

            match (result, expected) {
                (Ok(actual), Success(expected_val)) => {
                    assert_eq!(actual, *expected_val, "{test_id}: value mismatch");

                    // The printed form reads back as the same value
                    let displayed = format!("{actual}");
                    if let Ok(reparsed) = parse_scheme(&displayed) {
                        assert_eq!(reparsed, actual, "{test_id}: reparse mismatch for '{displayed}'");
                    }
                }

                (Err(_), Error) => {}
                (Err(err), SpecificError(expected_text)) => {
                    let error_msg = format!("{err}");
                    assert!(
                        error_msg.contains(expected_text),
                        "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                    );
                }
                (Err(Error::ParseError(err)), FailsWith(expected_kind)) => {
                    assert_eq!(err.kind, *expected_kind, "{test_id}: error kind mismatch");
                }

                (Ok(actual), _) => panic!("{test_id}: expected error, got {actual:?}"),
                (Err(err), _) => panic!("{test_id}: unexpected error {err:?}"),
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== NUMBER PARSING =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("0", success(0)),
            ("2.75", success(2.75)),
            ("-0.5", success(-0.5)),
            ("1.", success(1)),
            ("007", success(7)),
            ("123abc", FailsWith(ParseErrorKind::TrailingContent)),
            // ===== SYMBOL PARSING =====
            ("foo", success(sym("foo"))),
            ("+", success(sym("+"))),
            (">=", success(sym(">="))),
            ("-", success(sym("-"))),
            ("-abc", success(sym("-abc"))),
            ("isNumber?", success(sym("isNumber?"))),
            ("a+b*c/d!e@f$g%h^i&j_k=l<m>n?", success(sym("a+b*c/d!e@f$g%h^i&j_k=l<m>n?"))),
            ("var123", success(sym("var123"))),
            ("CamelCase", success(sym("CamelCase"))),
            // ===== CONSTANTS =====
            ("#t", success(true)),
            ("#f", success(false)),
            ("#\\a", success('a')),
            ("#\\Z", success('Z')),
            ("#\\1", success('1')),
            ("#\\(", success('(')),
            ("#\\n", SpecificError("invalid character")),
            ("#\\t", SpecificError("invalid character")),
            ("#\\newline", SpecificError("invalid character")),
            ("#\\ab", SpecificError("invalid character")),
            ("#\\", FailsWith(ParseErrorKind::Incomplete)),
            ("#x", SpecificError("invalid constant")),
            ("#", SpecificError("invalid constant")),
            // ===== LISTS =====
            ("()", success(nil())),
            ("( )", success(nil())),
            ("(1 2 3)", success([1, 2, 3])),
            ("(a (b c) d)", success([sym("a"), val([sym("b"), sym("c")]), sym("d")])),
            ("((()))", success([val([nil()])])),
            ("(1 . 2)", success(Value::cons(val(1), val(2)))),
            ("(1 2 . 3)", success(list_with_tail([val(1), val(2)], val(3)))),
            ("(1 . (2 3))", success([1, 2, 3])),
            ("(1 .2)", success(Value::cons(val(1), val(2)))),
            ("(#\\a #\\b)", success(['a', 'b'])),
            ("(  1\n\t2  )", success([1, 2])),
            ("(. 1)", SpecificError("unexpected '.'")),
            ("(1 . 2 3)", SpecificError("expected ')'")),
            ("(1 .)", SpecificError("unexpected ')'")),
            ("(1 2", FailsWith(ParseErrorKind::Incomplete)),
            ("(", FailsWith(ParseErrorKind::Incomplete)),
            (")", SpecificError("unexpected ')'")),
            ("(1 2))", FailsWith(ParseErrorKind::TrailingContent)),
            // ===== QUOTE SHORTHAND =====
            ("'a", success(quoted(sym("a")))),
            ("'()", success(quoted(nil()))),
            ("'(1 2)", success(quoted(val([1, 2])))),
            ("''a", success(quoted(quoted(sym("a"))))),
            ("' a", success(quoted(sym("a")))),
            ("(quote a)", success(quoted(sym("a")))),
            ("'", FailsWith(ParseErrorKind::Incomplete)),
            ("`a", success([sym("quasiquote"), sym("a")])),
            ("`(1 ,x)", success([sym("quasiquote"), val([val(1), val([sym("unquote"), sym("x")])])])),
            (",@xs", success([sym("unquote-splicing"), sym("xs")])),
            (", x", success([sym("unquote"), sym("x")])),
            (",", FailsWith(ParseErrorKind::Incomplete)),
            ("`", SpecificError("after quasiquote")),
            // ===== COMMENTS AND WHITESPACE =====
            ("  42  ", success(42)),
            ("; leading\n42", success(42)),
            ("42 ; trailing", success(42)),
            ("(1 ; inside\n 2)", success([1, 2])),
            ("#\\a; comment", success('a')),
            // ===== INVALID CHARACTERS =====
            ("[1]", SpecificError("unexpected character '['")),
            ("\"str\"", SpecificError("unexpected character")),
            ("a,b", FailsWith(ParseErrorKind::TrailingContent)),
            ("", FailsWith(ParseErrorKind::Incomplete)),
            ("; only a comment", FailsWith(ParseErrorKind::Incomplete)),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_comments_can_be_disabled() {
        let config = ParseConfig {
            handle_comments: false,
        };
        assert_eq!(parse_scheme_with_config("(1 2)", config).unwrap(), val([1, 2]));

        let err = parse_scheme_with_config("; note\n1", config).unwrap_err();
        assert!(format!("{err}").contains("unexpected character ';'"));
    }

    #[test]
    fn test_parse_depth_limit() {
        let within = format!("{}{}", "(".repeat(MAX_PARSE_DEPTH - 1), ")".repeat(MAX_PARSE_DEPTH - 1));
        assert!(parse_scheme(&within).is_ok());

        let too_deep = format!("{}{}", "(".repeat(MAX_PARSE_DEPTH + 1), ")".repeat(MAX_PARSE_DEPTH + 1));
        match parse_scheme(&too_deep) {
            Err(Error::ParseError(err)) => {
                assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
            }
            other => panic!("expected depth error, got {other:?}"),
        }

        let quotes = format!("{}a", "'".repeat(MAX_PARSE_DEPTH + 1));
        assert!(parse_scheme(&quotes).is_err());
    }

    #[test]
    fn test_long_flat_list_is_not_depth_limited() {
        let source = format!("({})", "1 ".repeat(MAX_PARSE_DEPTH * 4));
        let list = parse_scheme(&source).unwrap();
        assert_eq!(list.list_to_vec().unwrap().len(), MAX_PARSE_DEPTH * 4);
    }

    #[test]
    fn test_reader_yields_forms_in_order() {
        let forms = parse_all("(define x 1)\n'x ; comment\n#t 2.5").unwrap();
        assert_eq!(
            forms,
            vec![
                val([sym("define"), sym("x"), val(1)]),
                quoted(sym("x")),
                val(true),
                val(2.5),
            ]
        );
        assert_eq!(parse_all("  ; nothing\n").unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_decimal_keeps_fraction_at_end_of_input() {
        assert_eq!(parse_scheme("2.75").unwrap(), val(2.75));
        assert_eq!(parse_scheme("-2.5").unwrap(), val(-2.5));
        assert_eq!(parse_all("1 0.125").unwrap(), vec![val(1), val(0.125)]);
    }

    #[test]
    fn test_reader_resumes_after_malformed_form() {
        let source = "1 #\\nope 2\n3\n(4 5\n";
        let results: Vec<_> = Reader::new(source).collect();

        assert_eq!(results.len(), 5, "{results:?}");
        assert_eq!(results[0], Ok(val(1)));
        assert!(
            matches!(&results[1], Err(Error::ParseError(e)) if e.message == "invalid character")
        );
        assert_eq!(results[2], Ok(val(2)));
        assert_eq!(results[3], Ok(val(3)));
        assert!(
            matches!(&results[4], Err(Error::ParseError(e)) if e.kind == ParseErrorKind::Incomplete)
        );

        let mut reader = Reader::new(") 1\n2");
        assert!(reader.read().is_err());
        assert_eq!(reader.read().unwrap(), Some(val(1)));
        assert_eq!(reader.read().unwrap(), Some(val(2)));
        assert_eq!(reader.read().unwrap(), None);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_skips_whole_malformed_list() {
        let source = "(a #\\bc\n (b #\\) (c))) 7\n'(1 . ) 8 [x] 9";
        let results: Vec<_> = Reader::new(source).collect();

        assert_eq!(results.len(), 6, "{results:?}");
        assert!(results[0].is_err());
        assert_eq!(results[1], Ok(val(7)));
        assert!(results[2].is_err());
        assert_eq!(results[3], Ok(val(8)));
        assert!(results[4].is_err());
        assert_eq!(results[5], Ok(val(9)));
    }

    #[test]
    fn test_skip_datum_ignores_parens_in_comments() {
        let config = ParseConfig::default();
        assert_eq!(skip_datum("(a ; )\n b) c", config), " c");
        assert_eq!(skip_datum("'(a (b) c", config), "");
        assert_eq!(skip_datum("#\\xyz(1)", config), "(1)");

        let no_comments = ParseConfig {
            handle_comments: false,
        };
        assert_eq!(skip_datum("(a ; ) b", no_comments), " b");
    }

    #[test]
    fn test_error_context_points_at_offending_input() {
        let err = parse_scheme("(1 2 ])").unwrap_err();
        let Error::ParseError(err) = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(err.found.as_deref(), Some("]"));
        assert_eq!(err.context.as_deref(), Some("(1 2 ])"));
    }

    #[test]
    fn test_shared_structure_is_not_created_by_reader() {
        let forms = parse_all("'(1 2) '(1 2)").unwrap();
        let (Value::Pair(a), Value::Pair(b)) = (&forms[0], &forms[1]) else {
            panic!("expected two quote forms");
        };
        assert!(!gc::Gc::ptr_eq(a, b));
        assert_eq!(forms[0], forms[1]);
    }
}
