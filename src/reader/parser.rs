// File: src/reader/parser.rs
//
// Recursive-descent parser turning a token stream into `Value`s: lists
// for `(...)`, vectors for `[...]`, objects for `{...}` (flat key/value
// pairs, even count required), and `'x` expanding to `(quote x)`.

use super::lexer::{Token, TokenKind};
use crate::errors::{AleError, AleResult, SourceLocation};
use crate::value::{List, Object, Symbol, Value, Vector};
use num_bigint::BigInt;
use std::str::FromStr;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn loc_or_eof(&self) -> SourceLocation {
        self.tokens.last().map(|t| SourceLocation::new(t.line, t.column)).unwrap_or_default()
    }

    fn parse_form(&mut self) -> AleResult<Value> {
        let tok = self.advance().ok_or_else(|| AleError::reader("unexpected end of input").at(self.loc_or_eof()))?;
        match &tok.kind {
            TokenKind::LParen => self.parse_seq(TokenKind::RParen, ")"),
            TokenKind::LBracket => self.parse_vector(),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => Err(AleError::reader("unexpected closing delimiter")
                .at(SourceLocation::new(tok.line, tok.column))),
            TokenKind::Quote => {
                let inner = self.parse_form()?;
                Ok(Value::List(List::from_vec(vec![Value::symbol("quote"), inner])))
            }
            TokenKind::String(s) => Ok(Value::str(s.clone())),
            TokenKind::Keyword(k) => Ok(Value::keyword(k)),
            TokenKind::Integer(text) => parse_integer(text, tok),
            TokenKind::Float(text) => parse_float(text, tok),
            TokenKind::Symbol(name) => Ok(symbol_value(name)),
        }
    }

    fn parse_seq(&mut self, close: TokenKind, close_str: &str) -> AleResult<Value> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(AleError::reader(format!("unterminated list, expected '{close_str}'")).at(self.loc_or_eof())),
                Some(t) if t.kind == close => {
                    self.advance();
                    break;
                }
                _ => items.push(self.parse_form()?),
            }
        }
        Ok(Value::List(List::from_vec(items)))
    }

    fn parse_vector(&mut self) -> AleResult<Value> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(AleError::reader("unterminated vector, expected ']'").at(self.loc_or_eof())),
                Some(t) if t.kind == TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                _ => items.push(self.parse_form()?),
            }
        }
        Ok(Value::Vector(Vector::from_vec(items)))
    }

    fn parse_object(&mut self) -> AleResult<Value> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(AleError::reader("unterminated object, expected '}'").at(self.loc_or_eof())),
                Some(t) if t.kind == TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                _ => items.push(self.parse_form()?),
            }
        }
        if items.len() % 2 != 0 {
            return Err(AleError::reader("object literal needs an even number of forms").at(self.loc_or_eof()));
        }
        let mut obj = Object::empty();
        let mut it = items.into_iter();
        while let (Some(k), Some(v)) = (it.next(), it.next()) {
            obj = obj.put(k, v);
        }
        Ok(Value::Object(obj))
    }
}

fn symbol_value(name: &str) -> Value {
    match name {
        "nil" => Value::Nil,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match name.split_once('/') {
            Some((domain, local)) if !domain.is_empty() && !local.is_empty() => {
                Value::Symbol(Symbol::Qualified(domain.into(), local.into()))
            }
            _ => Value::symbol(name),
        },
    }
}

fn parse_integer(text: &str, tok: &Token) -> AleResult<Value> {
    BigInt::from_str(text)
        .map(Value::Integer)
        .map_err(|_| AleError::reader(format!("malformed integer literal '{text}'")).at(SourceLocation::new(tok.line, tok.column)))
}

fn parse_float(text: &str, tok: &Token) -> AleResult<Value> {
    let f = match text {
        "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        _ => f64::from_str(text)
            .map_err(|_| AleError::reader(format!("malformed float literal '{text}'")).at(SourceLocation::new(tok.line, tok.column)))?,
    };
    Ok(Value::Float(f))
}

/// Parses every top-level form in `tokens` into a persistent `List`.
pub fn parse_all(tokens: &[Token]) -> AleResult<List> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut forms = Vec::new();
    while parser.peek().is_some() {
        forms.push(parser.parse_form()?);
    }
    Ok(List::from_vec(forms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::lexer::tokenize;

    fn parse(src: &str) -> List {
        parse_all(&tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_nested_list() {
        let forms = parse("(def x (+ 1 2))");
        assert_eq!(forms.count(), 1);
        let form = forms.first();
        assert_eq!(form.count().unwrap(), 3);
    }

    #[test]
    fn quote_shorthand_expands() {
        let forms = parse("'x");
        let form = forms.first();
        assert_eq!(form.first().unwrap(), Value::symbol("quote"));
    }

    #[test]
    fn vector_and_object_literals() {
        let forms = parse("[1 2 3]");
        assert!(matches!(forms.first(), Value::Vector(_)));
        let forms = parse("{:a 1 :b 2}");
        assert!(matches!(forms.first(), Value::Object(_)));
    }

    #[test]
    fn unbalanced_parens_is_a_reader_error() {
        assert!(parse_all(&tokenize("(+ 1 2)").unwrap().into_iter().take(4).collect::<Vec<_>>()).is_err());
    }

    #[test]
    fn qualified_symbols_split_on_slash() {
        let forms = parse("math/pi");
        match forms.first() {
            Value::Symbol(Symbol::Qualified(d, n)) => {
                assert_eq!(&*d, "math");
                assert_eq!(&*n, "pi");
            }
            other => panic!("expected qualified symbol, got {other:?}"),
        }
    }
}
