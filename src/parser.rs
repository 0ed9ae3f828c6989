/// Lexer and parser for calculator input lines
///
/// One input line is either a function definition (`F = 2*x + 1`) or a bare
/// expression to evaluate (`F(3) + 1`). The parser produces a [`Statement`]
/// carrying the expression tree and the optional definition name, or a
/// non-empty list of [`ParseError`]s. A line that fails to parse never
/// reaches the compiler.
use std::fmt;

use crate::ast::{BinaryOp, Expr, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Pipe,
    Equals,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{}", v),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Pipe => write!(f, "|"),
            Token::Equals => write!(f, "="),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// A single diagnostic from the lexer or parser
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// 1-based column of the offending input, where known
    pub column: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, column: usize) -> Self {
        ParseError {
            message: message.into(),
            column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}: {}", self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// One parsed input line: an expression tree plus the optional name it is
/// being defined under.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub name: Option<String>,
    pub expr: Expr,
}

/// Hand-written lexer over the calculator's token set
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch.is_some() {
            self.pos += 1;
            self.column += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, ParseError> {
        let start = self.column;
        let mut text = String::new();

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current() == Some('.') && self.peek(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            text.push('.');
            self.advance();
            while let Some(ch) = self.current() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        text.parse()
            .map_err(|_| ParseError::new(format!("invalid number '{}'", text), start))
    }

    fn read_ident(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    /// Tokenize the whole line, collecting every lexical error rather than
    /// stopping at the first one.
    pub fn tokenize(mut self) -> Result<Vec<(Token, usize)>, Vec<ParseError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            self.skip_whitespace();
            let column = self.column;
            let token = match self.current() {
                None => {
                    tokens.push((Token::Eof, column));
                    break;
                }
                Some('+') => {
                    self.advance();
                    Token::Plus
                }
                Some('-') => {
                    self.advance();
                    Token::Minus
                }
                Some('*') => {
                    self.advance();
                    Token::Star
                }
                Some('/') => {
                    self.advance();
                    Token::Slash
                }
                Some('(') => {
                    self.advance();
                    Token::LParen
                }
                Some(')') => {
                    self.advance();
                    Token::RParen
                }
                Some('|') => {
                    self.advance();
                    Token::Pipe
                }
                Some('=') => {
                    self.advance();
                    Token::Equals
                }
                Some(ch) if ch.is_ascii_digit() || ch == '.' => match self.read_number() {
                    Ok(v) => Token::Number(v),
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
                Some(ch) if ch.is_alphabetic() || ch == '_' => Token::Ident(self.read_ident()),
                Some(ch) => {
                    errors.push(ParseError::new(
                        format!("unexpected character '{}'", ch),
                        column,
                    ));
                    self.advance();
                    continue;
                }
            };
            tokens.push((token, column));
        }

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }
}

/// Recursive-descent parser over the lexed token stream
pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, usize)>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn column(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, c)| *c).unwrap_or(1)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected '{}', found '{}'", expected, self.current()),
                self.column(),
            ))
        }
    }

    /// Parse a whole statement: `IDENT = expr` or a bare `expr`.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let name = if let (Token::Ident(name), column) = (self.current().clone(), self.column()) {
            if matches!(self.tokens.get(self.pos + 1).map(|(t, _)| t), Some(Token::Equals)) {
                if name == "x" || name == "X" {
                    return Err(ParseError::new(
                        "'x' is reserved for the function argument",
                        column,
                    ));
                }
                self.advance();
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };

        let expr = self.parse_expr()?;

        if self.current() != &Token::Eof {
            return Err(ParseError::new(
                format!("unexpected '{}' after expression", self.current()),
                self.column(),
            ));
        }

        Ok(Statement { name, expr })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let column = self.column();
        match self.advance() {
            Token::Minus => {
                let inner = self.parse_factor()?;
                Ok(Expr::unary(UnaryOp::Negate, inner))
            }
            Token::Pipe => {
                let inner = self.parse_expr()?;
                self.expect(&Token::Pipe)?;
                Ok(Expr::unary(UnaryOp::Abs, inner))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Number(v) => Ok(Expr::Number(v)),
            Token::Ident(name) => {
                if name == "x" || name == "X" {
                    return Ok(Expr::Variable);
                }
                // Any other identifier is a function application
                if self.current() == &Token::LParen {
                    self.advance();
                    let arg = self.parse_expr()?;
                    self.expect(&Token::RParen)?;
                    Ok(Expr::apply(name, arg))
                } else {
                    Err(ParseError::new(
                        format!("expected '(' after function name '{}'", name),
                        self.column(),
                    ))
                }
            }
            token => Err(ParseError::new(
                format!("unexpected '{}'", token),
                column,
            )),
        }
    }
}

/// Parse one input line into a [`Statement`].
///
/// Returns every lexical diagnostic at once when tokenization fails, or the
/// single parse diagnostic otherwise. The error list is always non-empty on
/// the `Err` side.
pub fn parse_line(line: &str) -> Result<Statement, Vec<ParseError>> {
    let tokens = Lexer::new(line).tokenize()?;
    Parser::new(tokens)
        .parse_statement()
        .map_err(|e| vec![e])
}
