// File: src/reader/lexer.rs
//
// Tokenizes source text into `Token`s (spec §4.J): parens/brackets/
// braces, symbols, keywords (`:name`), strings, numbers, the `'` quote
// shorthand, and the infinity literals the ISA's `PosInfinity`/
// `NegInfinity` constant-push opcodes need a surface form for.

use crate::errors::{AleError, AleResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Quote,
    Symbol(String),
    Keyword(String),
    String(String),
    Integer(String),
    Float(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '"' | ':' | ';')
}

pub fn tokenize(source: &str) -> AleResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut col = 1;

    macro_rules! advance {
        () => {{
            let c = chars.next();
            if c == Some('\n') {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
            c
        }};
    }

    while let Some(&c) = chars.peek() {
        let (start_line, start_col) = (line, col);
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                advance!();
            }
            ';' => {
                while let Some(&ch) = chars.peek() {
                    if ch == '\n' {
                        break;
                    }
                    advance!();
                }
            }
            '(' => {
                advance!();
                tokens.push(Token { kind: TokenKind::LParen, line: start_line, column: start_col });
            }
            ')' => {
                advance!();
                tokens.push(Token { kind: TokenKind::RParen, line: start_line, column: start_col });
            }
            '[' => {
                advance!();
                tokens.push(Token { kind: TokenKind::LBracket, line: start_line, column: start_col });
            }
            ']' => {
                advance!();
                tokens.push(Token { kind: TokenKind::RBracket, line: start_line, column: start_col });
            }
            '{' => {
                advance!();
                tokens.push(Token { kind: TokenKind::LBrace, line: start_line, column: start_col });
            }
            '}' => {
                advance!();
                tokens.push(Token { kind: TokenKind::RBrace, line: start_line, column: start_col });
            }
            '\'' => {
                advance!();
                tokens.push(Token { kind: TokenKind::Quote, line: start_line, column: start_col });
            }
            '"' => {
                advance!();
                let mut s = String::new();
                loop {
                    match chars.peek() {
                        None => {
                            return Err(AleError::reader("unterminated string literal")
                                .at(crate::errors::SourceLocation::new(start_line, start_col)));
                        }
                        Some('"') => {
                            advance!();
                            break;
                        }
                        Some('\\') => {
                            advance!();
                            match advance!() {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some('r') => s.push('\r'),
                                Some('\\') => s.push('\\'),
                                Some('"') => s.push('"'),
                                Some(other) => s.push(other),
                                None => {
                                    return Err(AleError::reader("unterminated string literal")
                                        .at(crate::errors::SourceLocation::new(start_line, start_col)));
                                }
                            }
                        }
                        Some(&ch) => {
                            advance!();
                            s.push(ch);
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::String(s), line: start_line, column: start_col });
            }
            ':' => {
                advance!();
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if is_symbol_char(ch) {
                        name.push(ch);
                        advance!();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(AleError::reader("empty keyword")
                        .at(crate::errors::SourceLocation::new(start_line, start_col)));
                }
                tokens.push(Token { kind: TokenKind::Keyword(name), line: start_line, column: start_col });
            }
            '+' | '-' if starts_number(&mut chars.clone()) => {
                let tok = lex_number(&mut chars, &mut line, &mut col, start_line, start_col)?;
                tokens.push(tok);
            }
            '0'..='9' => {
                let tok = lex_number(&mut chars, &mut line, &mut col, start_line, start_col)?;
                tokens.push(tok);
            }
            _ => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if is_symbol_char(ch) {
                        name.push(ch);
                        advance!();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(AleError::reader(format!("unexpected character '{c}'"))
                        .at(crate::errors::SourceLocation::new(start_line, start_col)));
                }
                tokens.push(Token { kind: TokenKind::Symbol(name), line: start_line, column: start_col });
            }
        }
    }

    Ok(tokens)
}

/// Peeks ahead from a `+`/`-` to decide whether it starts a signed
/// number (`+Inf`, `-1`, `-3.5`) rather than a symbol like `+` or `->`.
fn starts_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    chars.next();
    matches!(chars.peek(), Some(c) if c.is_ascii_digit()) || {
        let rest: String = chars.clone().collect();
        rest.starts_with("Inf")
    }
}

fn lex_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line: &mut usize,
    col: &mut usize,
    start_line: usize,
    start_col: usize,
) -> AleResult<Token> {
    let mut text = String::new();
    macro_rules! take {
        () => {{
            if let Some(c) = chars.next() {
                text.push(c);
                *col += 1;
            }
        }};
    }

    if matches!(chars.peek(), Some('+') | Some('-')) {
        take!();
    }

    let rest: String = chars.clone().collect();
    if rest.starts_with("Inf") {
        for _ in 0.."Inf".len() {
            take!();
        }
        let kind = TokenKind::Float(text);
        return Ok(Token { kind, line: start_line, column: start_col });
    }

    let mut is_float = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            take!();
        } else if c == '.' && !is_float {
            is_float = true;
            take!();
        } else if (c == 'e' || c == 'E') && !text.is_empty() {
            take!();
            if matches!(chars.peek(), Some('+') | Some('-')) {
                take!();
            }
            is_float = true;
        } else {
            break;
        }
    }
    let _ = line;
    let kind = if is_float { TokenKind::Float(text) } else { TokenKind::Integer(text) };
    Ok(Token { kind, line: start_line, column: start_col })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_a_simple_call() {
        assert_eq!(
            kinds("(+ 1 2)"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol("+".to_string()),
                TokenKind::Integer("1".to_string()),
                TokenKind::Integer("2".to_string()),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn negative_numbers_are_numbers_but_bare_minus_is_a_symbol() {
        assert_eq!(kinds("-5"), vec![TokenKind::Integer("-5".to_string())]);
        assert_eq!(kinds("-"), vec![TokenKind::Symbol("-".to_string())]);
    }

    #[test]
    fn keywords_and_quote_and_strings() {
        assert_eq!(
            kinds("':ok \"hi\\n\""),
            vec![TokenKind::Quote, TokenKind::Keyword("ok".to_string()), TokenKind::String("hi\n".to_string())]
        );
    }

    #[test]
    fn infinities_tokenize_as_floats() {
        assert_eq!(kinds("+Inf -Inf"), vec![TokenKind::Float("+Inf".to_string()), TokenKind::Float("-Inf".to_string())]);
    }

    #[test]
    fn unterminated_string_is_a_reader_error() {
        assert!(tokenize("\"abc").is_err());
    }
}
