use std::{iter::Peekable, rc::Rc, slice::Iter};

use log::trace;

use crate::{
    ast::{BinOp, FuncDecl, LogicalOp, Node, NodeKind, UnaryOp},
    error::{ErrorMsg, SyntaxError},
    token::{Literal, Position, Span, Token, TokenKind},
};

#[derive(Clone, Copy, Debug)]
enum Infix {
    Binary(BinOp),
    Logical(LogicalOp),
}

/// Left and right binding powers of infix operators. A higher
/// power binds tighter, and a right power lower than the left
/// one makes the operator right associative.
fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, Infix)> {
    let bp = match kind {
        TokenKind::OR => (1, 2),
        TokenKind::AND => (3, 4),
        TokenKind::EQUAL_EQUAL
        | TokenKind::BANG_EQUAL
        | TokenKind::LESS
        | TokenKind::LESS_EQUAL
        | TokenKind::GREATER
        | TokenKind::GREATER_EQUAL => (7, 8),
        TokenKind::PLUS | TokenKind::MINUS => (9, 10),
        TokenKind::STAR | TokenKind::SLASH | TokenKind::MODULO => (11, 12),
        TokenKind::CARET => (16, 15),
        _ => return None,
    };
    let op = match LogicalOp::from_token(kind) {
        Some(op) => Infix::Logical(op),
        None => Infix::Binary(BinOp::from_token(kind)?),
    };
    Some((bp.0, bp.1, op))
}

fn prefix_binding_power(kind: TokenKind) -> Option<(u8, UnaryOp)> {
    let bp = match kind {
        TokenKind::NOT => 5,
        TokenKind::MINUS | TokenKind::PLUS => 13,
        _ => return None,
    };
    Some((bp, UnaryOp::from_token(kind)?))
}

#[derive(Debug)]
pub struct Parser<'a> {
    stream: Peekable<Iter<'a, Token>>,
    eof: Span,
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a [Token]) -> Self {
        let eof = stream.last().map_or_else(
            || Span::new(Rc::from(""), Position::default(), Position::default()),
            |t| t.span.clone(),
        );
        Self {
            stream: stream.iter().peekable(),
            eof,
        }
    }

    /// Parses the whole token stream into a single statement list.
    /// The first error aborts parsing.
    pub fn parse(mut self) -> Result<Node, SyntaxError> {
        let root = self.parse_statements()?;
        match self.stream.peek() {
            Some(&t) if t.kind != TokenKind::EOF => {
                Err(Self::error(t, ErrorMsg::Expected("end of file")))
            }
            _ => {
                trace!("Parsed {root}");
                Ok(root)
            }
        }
    }

    fn parse_statements(&mut self) -> Result<Node, SyntaxError> {
        let start = self.peek_span();
        let mut items = Vec::default();
        loop {
            self.skip_newlines();
            if self.at_block_end() {
                break;
            }
            items.push(self.parse_statement()?);
            if !self.at_block_end() && self.peek_kind() != TokenKind::NEWLINE {
                let msg = ErrorMsg::Expected(TokenKind::NEWLINE.describe());
                return Err(self.error_at_peek(msg));
            }
        }
        let span = match items.last() {
            Some(last) => start.to(&last.span),
            None => start,
        };
        Ok(Node::new(NodeKind::Block(items), span))
    }

    fn parse_statement(&mut self) -> Result<Node, SyntaxError> {
        match self.peek_kind() {
            TokenKind::RETURN => {
                let keyword =
                    self.advance_or_err(TokenKind::RETURN, ErrorMsg::Expected("'return'"))?;
                if self.at_block_end() || self.peek_kind() == TokenKind::NEWLINE {
                    return Ok(Node::new(NodeKind::Return(None), keyword.span.clone()));
                }
                let value = self.parse_expr()?;
                let span = keyword.span.to(&value.span);
                Ok(Node::new(NodeKind::Return(Some(Box::new(value))), span))
            }
            TokenKind::CONTINUE => {
                let keyword =
                    self.advance_or_err(TokenKind::CONTINUE, ErrorMsg::Expected("'continue'"))?;
                Ok(Node::new(NodeKind::Continue, keyword.span.clone()))
            }
            TokenKind::BREAK => {
                let keyword = self.advance_or_err(TokenKind::BREAK, ErrorMsg::Expected("'break'"))?;
                Ok(Node::new(NodeKind::Break, keyword.span.clone()))
            }
            _ => self.parse_expr(),
        }
    }

    fn parse_expr(&mut self) -> Result<Node, SyntaxError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Node, SyntaxError> {
        let lhs = self.parse_binary(0)?;
        let Some(eq) = self.advance_if(|t| t.kind == TokenKind::EQUAL) else {
            return Ok(lhs);
        };
        let rhs = self.parse_assignment()?;
        let span = lhs.span.to(&rhs.span);
        match lhs.kind {
            NodeKind::Access(name) => Ok(Node::new(
                NodeKind::Assign {
                    name,
                    value: Box::new(rhs),
                },
                span,
            )),
            NodeKind::Index { target, index } => Ok(Node::new(
                NodeKind::IndexAssign {
                    target,
                    index,
                    value: Box::new(rhs),
                },
                span,
            )),
            _ => Err(Self::error(eq, ErrorMsg::InvalidAssignment)),
        }
    }

    fn parse_binary(&mut self, min_bp: u8) -> Result<Node, SyntaxError> {
        let mut lhs = if let Some((rbp, op)) = prefix_binding_power(self.peek_kind()) {
            let op_span = self.peek_span();
            self.advance();
            let expr = self.parse_binary(rbp)?;
            let span = op_span.to(&expr.span);
            Node::new(
                NodeKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                span,
            )
        } else {
            self.parse_postfix()?
        };

        while let Some((lbp, rbp, infix)) = infix_binding_power(self.peek_kind()) {
            if lbp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(rbp)?;
            let span = lhs.span.to(&rhs.span);
            let (lhs_box, rhs_box) = (Box::new(lhs), Box::new(rhs));
            let kind = match infix {
                Infix::Binary(op) => NodeKind::Binary {
                    lhs: lhs_box,
                    op,
                    rhs: rhs_box,
                },
                Infix::Logical(op) => NodeKind::Logical {
                    lhs: lhs_box,
                    op,
                    rhs: rhs_box,
                },
            };
            lhs = Node::new(kind, span);
        }

        Ok(lhs)
    }

    fn parse_postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::LPAREN => {
                    // Consume the opening parenthesis
                    self.advance();
                    let (args, close) = self.parse_delimited(TokenKind::RPAREN, "',' or ')'")?;
                    let span = expr.span.to(&close.span);
                    expr = Node::new(
                        NodeKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBRACKET => {
                    // Consume the opening bracket
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    let close =
                        self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::Expected("']'"))?;
                    let span = expr.span.to(&close.span);
                    expr = Node::new(
                        NodeKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Node, SyntaxError> {
        let Some(t) = self.advance() else {
            return Err(self.eof_error(ErrorMsg::Expected("expression")));
        };
        let kind = match t.kind {
            TokenKind::NUMBER => match &t.literal {
                Some(Literal::Number(n)) => NodeKind::Number(*n),
                _ => return Err(Self::error(t, ErrorMsg::Expected("number"))),
            },
            TokenKind::STRING => match &t.literal {
                Some(Literal::Str(s)) => NodeKind::Str(s.clone()),
                _ => return Err(Self::error(t, ErrorMsg::Expected("string"))),
            },
            TokenKind::IDENT => NodeKind::Access(t.lexeme.clone()),
            TokenKind::LPAREN => {
                self.skip_newlines();
                let expr = self.parse_expr()?;
                self.skip_newlines();
                let close = self.advance_or_err(TokenKind::RPAREN, ErrorMsg::Expected("')'"))?;
                return Ok(Node::new(expr.kind, t.span.to(&close.span)));
            }
            TokenKind::LBRACKET => {
                let (items, close) = self.parse_delimited(TokenKind::RBRACKET, "',' or ']'")?;
                return Ok(Node::new(NodeKind::List(items), t.span.to(&close.span)));
            }
            TokenKind::IF => return self.parse_if(t),
            TokenKind::FOR => return self.parse_for(t),
            TokenKind::WHILE => return self.parse_while(t),
            TokenKind::FUNC => return self.parse_func(t),
            _ => return Err(Self::error(t, ErrorMsg::Expected("expression"))),
        };
        Ok(Node::new(kind, t.span.clone()))
    }

    /// Parses a comma separated list of expressions up to `close`,
    /// the opening delimiter having been consumed already
    fn parse_delimited(
        &mut self,
        close: TokenKind,
        expected: &'static str,
    ) -> Result<(Vec<Node>, &'a Token), SyntaxError> {
        let mut items = vec![];
        self.skip_newlines();
        if let Some(t) = self.advance_if(|t| t.kind == close) {
            return Ok((items, t));
        }
        loop {
            self.skip_newlines();
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                break;
            }
        }
        let t = self.advance_or_err(close, ErrorMsg::Expected(expected))?;
        Ok((items, t))
    }

    fn parse_if(&mut self, keyword: &'a Token) -> Result<Node, SyntaxError> {
        let mut cases = vec![];
        loop {
            let condition = self.parse_expr()?;
            self.advance_or_err(TokenKind::THEN, ErrorMsg::Expected("'then'"))?;
            let body = self.parse_statements()?;
            cases.push((condition, body));
            if self.advance_if(|t| t.kind == TokenKind::ELIF).is_none() {
                break;
            }
        }
        let else_case = if self.advance_if(|t| t.kind == TokenKind::ELSE).is_some() {
            Some(Box::new(self.parse_statements()?))
        } else {
            None
        };
        let end = self.advance_or_err(TokenKind::END, ErrorMsg::Expected("'end'"))?;

        Ok(Node::new(
            NodeKind::If { cases, else_case },
            keyword.span.to(&end.span),
        ))
    }

    fn parse_for(&mut self, keyword: &'a Token) -> Result<Node, SyntaxError> {
        let var = self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::Expected("identifier"))?
            .lexeme
            .clone();

        if self.advance_if(|t| t.kind == TokenKind::IN).is_some() {
            let iterable = self.parse_expr()?;
            let body = self.parse_loop_body()?;
            let end = self.advance_or_err(TokenKind::END, ErrorMsg::Expected("'end'"))?;
            return Ok(Node::new(
                NodeKind::ForIn {
                    var,
                    iterable: Box::new(iterable),
                    body: Box::new(body),
                },
                keyword.span.to(&end.span),
            ));
        }

        self.advance_or_err(TokenKind::EQUAL, ErrorMsg::Expected("'=' or 'in'"))?;
        let start = self.parse_expr()?;
        self.advance_or_err(TokenKind::COMMA, ErrorMsg::Expected("','"))?;
        let stop = self.parse_expr()?;
        let step = if self.advance_if(|t| t.kind == TokenKind::COMMA).is_some() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let body = self.parse_loop_body()?;
        let end = self.advance_or_err(TokenKind::END, ErrorMsg::Expected("'end'"))?;

        Ok(Node::new(
            NodeKind::For {
                var,
                start: Box::new(start),
                stop: Box::new(stop),
                step,
                body: Box::new(body),
            },
            keyword.span.to(&end.span),
        ))
    }

    fn parse_while(&mut self, keyword: &'a Token) -> Result<Node, SyntaxError> {
        let condition = self.parse_expr()?;
        let body = self.parse_loop_body()?;
        let end = self.advance_or_err(TokenKind::END, ErrorMsg::Expected("'end'"))?;

        Ok(Node::new(
            NodeKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            keyword.span.to(&end.span),
        ))
    }

    fn parse_loop_body(&mut self) -> Result<Node, SyntaxError> {
        self.advance_or_err(TokenKind::DO, ErrorMsg::Expected("'do'"))?;
        self.parse_statements()
    }

    fn parse_func(&mut self, keyword: &'a Token) -> Result<Node, SyntaxError> {
        let name = self
            .advance_if(|t| t.kind == TokenKind::IDENT)
            .map(|t| t.lexeme.clone());
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::Expected("'('"))?;
        let mut params = vec![];
        if self.advance_if(|t| t.kind == TokenKind::RPAREN).is_none() {
            loop {
                params.push(
                    self.advance_or_err(TokenKind::IDENT, ErrorMsg::Expected("identifier"))?
                        .lexeme
                        .clone(),
                );
                if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                    break;
                }
            }
            self.advance_or_err(TokenKind::RPAREN, ErrorMsg::Expected("',' or ')'"))?;
        }

        let arrow = self.advance_if(|t| t.kind == TokenKind::ARROW).is_some();
        let (body, auto_return, end) = if arrow {
            let body = self.parse_expr()?;
            let end = body.span.clone();
            (body, true, end)
        } else {
            let body = self.parse_statements()?;
            let end = self.advance_or_err(TokenKind::END, ErrorMsg::Expected("'end'"))?;
            (body, false, end.span.clone())
        };

        Ok(Node::new(
            NodeKind::FuncDef(Rc::new(FuncDecl {
                name,
                params,
                body,
                auto_return,
            })),
            keyword.span.to(&end),
        ))
    }

    fn at_block_end(&mut self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::END | TokenKind::ELSE | TokenKind::ELIF | TokenKind::EOF
        )
    }

    fn skip_newlines(&mut self) {
        while self.advance_if(|t| t.kind == TokenKind::NEWLINE).is_some() {}
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.stream.peek().map_or(TokenKind::EOF, |t| t.kind)
    }

    fn peek_span(&mut self) -> Span {
        match self.stream.peek() {
            Some(t) => t.span.clone(),
            None => self.eof.clone(),
        }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        self.stream.next()
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<&'a Token>
    where
        F: FnOnce(&Token) -> bool,
    {
        if self.stream.peek().filter(|&&t| cond(t)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_or_err(&mut self, kind: TokenKind, msg: ErrorMsg) -> Result<&'a Token, SyntaxError> {
        if let Some(&t) = self.stream.peek() {
            if t.kind == kind {
                self.advance();
                Ok(t)
            } else {
                Err(Self::error(t, msg))
            }
        } else {
            Err(self.eof_error(msg))
        }
    }

    fn error_at_peek(&mut self, msg: ErrorMsg) -> SyntaxError {
        SyntaxError::new(msg, self.peek_span())
    }

    fn error(token: &Token, msg: ErrorMsg) -> SyntaxError {
        SyntaxError::new(msg, token.span.clone())
    }

    fn eof_error(&self, msg: ErrorMsg) -> SyntaxError {
        SyntaxError::new(msg, self.eof.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;
    use pretty_assertions::assert_eq;

    fn parse_test(input: &str, expected: &str) {
        let tokens = Lexer::new("<test>", input).lex_all().unwrap();
        let root = Parser::new(&tokens).parse().unwrap();
        assert_eq!(root.to_string(), expected);
    }

    fn parse_err_test(input: &str, expected: &str) -> SyntaxError {
        let tokens = Lexer::new("<test>", input).lex_all().unwrap();
        let err = Parser::new(&tokens).parse().unwrap_err();
        assert_eq!(err.message, expected);
        err
    }

    #[test]
    fn precedence() {
        parse_test("1 + 2 * 3", "{(+ 1 (* 2 3))}");
        parse_test("x = 1 + 2 * 3", "{(= x (+ 1 (* 2 3)))}");
        parse_test("(1 + 2) * 3", "{(* (+ 1 2) 3)}");
        parse_test("10 - 4 - 3", "{(- (- 10 4) 3)}");
        parse_test("7 % 4 / 2", "{(/ (% 7 4) 2)}");
    }

    #[test]
    fn power_and_unary() {
        parse_test("2 ^ 3 ^ 2", "{(^ 2 (^ 3 2))}");
        parse_test("-2 ^ 2", "{(- (^ 2 2))}");
        parse_test("2 ^ -1 * 3", "{(* (^ 2 (- 1)) 3)}");
        parse_test("-a * b", "{(* (- a) b)}");
    }

    #[test]
    fn logical() {
        parse_test("a or b and c", "{(or a (and b c))}");
        parse_test("not a == b and c", "{(and (not (== a b)) c)}");
        parse_test("a < b == c >= d", "{(>= (== (< a b) c) d)}");
    }

    #[test]
    fn assignment_is_right_associative() {
        parse_test("a = b = 3", "{(= a (= b 3))}");
    }

    #[test]
    fn calls_and_indexing() {
        parse_test("f()", "{(call f)}");
        parse_test("f(1, 2)[0]", "{(index (call f 1 2) 0)}");
        parse_test("math.max([1,\n 2])", "{(call math.max [1 2])}");
        parse_test("xs[1] = \"a\"", "{(= (index xs 1) \"a\")}");
        parse_test("make(1)(2)", "{(call (call make 1) 2)}");
    }

    #[test]
    fn list_literal() {
        parse_test("[]", "{[]}");
        parse_test("[1, [2, 3], \"x\"]", "{[1 [2 3] \"x\"]}");
    }

    #[test]
    fn if_chain() {
        parse_test(
            "if x then 1 elif y then 2 else 3 end",
            "{(if x {1} y {2} else {3})}",
        );
        parse_test("if x then\n  a = 1\nend", "{(if x {(= a 1)})}");
    }

    #[test]
    fn for_loops() {
        parse_test(
            "for i = 1, 3 do printf(i) end",
            "{(for i 1 3 {(call printf i)})}",
        );
        parse_test("for i = 10, 0, -2 do end", "{(for i 10 0 (- 2) {})}");
        parse_test("for x in [1, 2] do x end", "{(for x in [1 2] {x})}");
    }

    #[test]
    fn while_loop() {
        parse_test(
            "while i < 3 do\n  i = i + 1\n  if i == 2 then break end\nend",
            "{(while (< i 3) {(= i (+ i 1)) (if (== i 2) {(break)})})}",
        );
    }

    #[test]
    fn functions() {
        parse_test("func add(a, b) -> a + b", "{(func add(a, b) -> (+ a b))}");
        parse_test("func f()\n  return 1\nend", "{(func f() {(return 1)})}");
        parse_test("g = func (x) -> x", "{(= g (func (x) -> x))}");
        parse_test("func f() return end", "{(func f() {(return)})}");
    }

    #[test]
    fn separators() {
        parse_test("\n\n a = 1;; b = 2 \n\n", "{(= a 1) (= b 2)}");
        parse_test("", "{}");
        parse_test("continue; break", "{(continue) (break)}");
    }

    #[test]
    fn missing_operand() {
        let err = parse_err_test("1 +", "Expected expression");
        assert_eq!(err.span.start.offset, 3);
    }

    #[test]
    fn missing_closing_paren() {
        parse_err_test("(1 + 2", "Expected ')'");
    }

    #[test]
    fn missing_then() {
        let err = parse_err_test("if x 1 end", "Expected 'then'");
        assert_eq!(err.span.start.offset, 5);
    }

    #[test]
    fn missing_end() {
        parse_err_test("while x do\n  x = x - 1\n", "Expected 'end'");
    }

    #[test]
    fn missing_separator() {
        parse_err_test("1 2", "Expected newline or ';'");
    }

    #[test]
    fn invalid_assignment() {
        parse_err_test("1 + 2 = 3", "Expected identifier or index before '='");
    }

    #[test]
    fn malformed_for() {
        parse_err_test("for i = 1 do end", "Expected ','");
        parse_err_test("for 1 = 1, 2 do end", "Expected identifier");
    }

    #[test]
    fn stray_end() {
        parse_err_test("x = 1\nend", "Expected end of file");
    }
}
