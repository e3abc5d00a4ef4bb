use crate::{
    error::{ErrorMsg, LexError},
    token::{Literal, Position, Span, Token, TokenKind},
};
use log::trace;
use std::{iter::Peekable, rc::Rc, str::CharIndices};

#[derive(Debug)]
pub struct Lexer<'a> {
    name: Rc<str>,
    source: &'a str,
    stream: Peekable<CharIndices<'a>>,
    start: Position,
    current: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(name: &str, source: &'a str) -> Self {
        Self {
            name: Rc::from(name),
            source,
            stream: source.char_indices().peekable(),
            start: Position::default(),
            current: Position::default(),
        }
    }

    /// Lexes the entire source, stopping at the first error.
    /// The returned stream always ends with an `EOF` token.
    pub fn lex_all(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens: Vec<Token> = Vec::default();
        loop {
            let t = self.lex()?;
            let done = t.kind == TokenKind::EOF;
            tokens.push(t);
            if done {
                break;
            }
        }
        trace!("Lexed {} tokens from {}", tokens.len(), self.name);
        Ok(tokens)
    }

    pub fn lex(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        self.start = self.current;
        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::EOF));
        };
        match c {
            '!' => {
                if self.advance_if(|c| c == '=').is_some() {
                    Ok(self.make_token(TokenKind::BANG_EQUAL))
                } else {
                    Err(self.error(ErrorMsg::ExpectedEqualAfterBang))
                }
            }
            '=' => Ok(self.lookahead_for_token('=', TokenKind::EQUAL_EQUAL, TokenKind::EQUAL)),
            '>' => Ok(self.lookahead_for_token(
                '=',
                TokenKind::GREATER_EQUAL,
                TokenKind::GREATER,
            )),
            '<' => Ok(self.lookahead_for_token('=', TokenKind::LESS_EQUAL, TokenKind::LESS)),
            '-' => Ok(self.lookahead_for_token('>', TokenKind::ARROW, TokenKind::MINUS)),
            '"' => self.lex_string(),
            _ => {
                if let Some(t) = TokenKind::from_char(c) {
                    Ok(self.make_token(t))
                } else if c.is_ascii_alphabetic() || c == '_' {
                    Ok(self.lex_ident())
                } else if c.is_ascii_digit() {
                    self.lex_number()
                } else {
                    Err(self.error(ErrorMsg::IllegalChar(c)))
                }
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            self.advance_while(|c| matches!(c, ' ' | '\t' | '\r'));
            if self.advance_if(|c| c == '#').is_some() {
                self.advance_while(|c| c != '\n');
            } else {
                break;
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        // Dots are part of identifiers so that namespaced
        // builtins like `math.abs` form a single name
        self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        match TokenKind::from_keyword(self.lexeme_from_range()) {
            Some(t) => self.make_token(t),
            None => self.make_token(TokenKind::IDENT),
        }
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let mut seen_dot = false;
        while let Some(c) = self.advance_if(|c| c.is_ascii_digit() || c == '.') {
            if c == '.' {
                if seen_dot {
                    // Point the error at the offending dot
                    let mut at = self.current;
                    at.offset -= 1;
                    at.column -= 1;
                    self.start = at;
                    return Err(self.error(ErrorMsg::MalformedNumber));
                }
                seen_dot = true;
            }
        }
        let lexeme = self.lexeme_from_range();
        let Ok(n) = lexeme.parse::<f64>() else {
            return Err(self.error(ErrorMsg::MalformedNumber));
        };
        Ok(self.make_literal(TokenKind::NUMBER, Literal::Number(n)))
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let mut value = String::default();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(self.error(ErrorMsg::UnterminatedString)),
                },
                Some(c) => value.push(c),
                None => return Err(self.error(ErrorMsg::UnterminatedString)),
            }
        }
        Ok(self.make_literal(TokenKind::STRING, Literal::Str(value)))
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme_from_range().to_string(), None, self.span())
    }

    fn make_literal(&self, kind: TokenKind, literal: Literal) -> Token {
        Token::new(
            kind,
            self.lexeme_from_range().to_string(),
            Some(literal),
            self.span(),
        )
    }

    fn lexeme_from_range(&self) -> &'a str {
        &self.source[self.start.offset..self.current.offset]
    }

    fn span(&self) -> Span {
        Span::new(self.name.clone(), self.start, self.current)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.stream.next()?;
        self.current.offset += c.len_utf8();
        if c == '\n' {
            self.current.line += 1;
            self.current.column = 0;
        } else {
            self.current.column += 1;
        }
        Some(c)
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<char>
    where
        F: FnOnce(char) -> bool,
    {
        if self.stream.peek().filter(|&&(_, c)| cond(c)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_while<F>(&mut self, cond: F) -> Option<usize>
    where
        F: Fn(char) -> bool,
    {
        let mut count: usize = 0;
        while self.stream.peek().filter(|&&(_, c)| cond(c)).is_some() {
            count += 1;
            self.advance();
        }
        count.ne(&0).then_some(count)
    }

    fn lookahead_for_token(
        &mut self,
        match_char: char,
        if_match: TokenKind,
        no_match: TokenKind,
    ) -> Token {
        if self.advance_if(|c| c == match_char).is_some() {
            self.make_token(if_match)
        } else {
            self.make_token(no_match)
        }
    }

    fn error(&self, msg: ErrorMsg) -> LexError {
        LexError::new(msg, self.span())
    }
}
