//! Recursive-descent parser for QGraphic.
//!
//! Two grammar features need multi-token lookahead:
//!
//! - a top-level item is a function declaration when an identifier is
//!   followed by a balanced `{...}` and then `=>`; otherwise the same
//!   tokens are a brace call in statement position;
//! - postfix indexing `base < index >` collides with the `<` comparison
//!   operator. The parser saves its cursor, tries the index rule with a
//!   restricted index grammar (capped at the bit-or level so the closing
//!   `>` is never consumed as a comparison), and rewinds on failure.

use std::rc::Rc;

use crate::{
    exception::Exception,
    expressions::{BinOp, Expr, FunctionDecl, Item, LiteralValue, Param, Program, Stmt, TypeName, UnaryOp},
    lex::{Token, TokenKind, TokenValue},
};

type PResult<T> = Result<T, Exception>;

/// Parses a lexed token stream into a [`Program`].
///
/// # Errors
/// Returns a `ParseError` exception tagged with the offending token's line.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Exception> {
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(
            tokens.last().is_some_and(|t| t.kind == TokenKind::Eof),
            "token stream must end with EOF"
        );
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream always ends with EOF"))
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        self.pos += 1;
        token
    }

    fn check(&self, text: &str) -> bool {
        self.current().is(text)
    }

    fn peek_is(&self, offset: usize, text: &str) -> bool {
        self.tokens.get(self.pos + offset).is_some_and(|t| t.is(text))
    }

    fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn match_value(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.advance();
            return true;
        }
        false
    }

    fn expect_value(&mut self, text: &str) -> PResult<Token> {
        if !self.check(text) {
            return Err(Exception::parse(format!("Expected {text:?}"), self.current().line));
        }
        Ok(self.advance())
    }

    fn expect_ident(&mut self) -> PResult<Token> {
        if self.current().kind != TokenKind::Ident {
            return Err(Exception::parse("Expected identifier", self.current().line));
        }
        Ok(self.advance())
    }

    /// The textual payload of a token known to carry text.
    fn text_of(token: &Token) -> Rc<str> {
        match &token.value {
            TokenValue::Text(text) => text.clone(),
            TokenValue::Int(_) => Rc::from(""),
        }
    }

    /// The type name at `offset` tokens ahead, when that token is a type
    /// keyword.
    fn type_kw_at(&self, offset: usize) -> Option<TypeName> {
        let token = self.tokens.get(self.pos + offset)?;
        if token.kind != TokenKind::Kw {
            return None;
        }
        TypeName::from_keyword(token.text())
    }

    // ---- items ----

    fn parse_program(mut self) -> PResult<Program> {
        let mut items = Vec::new();
        while self.current().kind != TokenKind::Eof {
            if self.is_function_decl() {
                items.push(Item::Function(Rc::new(self.parse_function_decl()?)));
            } else {
                items.push(Item::Stmt(self.parse_statement()?));
            }
        }
        Ok(Program { items })
    }

    /// Lookahead: `IDENT` followed by a balanced `{...}` and then `=>`.
    fn is_function_decl(&self) -> bool {
        if self.current().kind != TokenKind::Ident || !self.peek_is(1, "{") {
            return false;
        }
        let mut depth = 0usize;
        for i in self.pos..self.tokens.len() {
            let token = &self.tokens[i];
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                depth -= 1;
                if depth == 0 {
                    return self.peek_is(i - self.pos + 1, "=>");
                }
            }
        }
        false
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        let name_tok = self.expect_ident()?;
        self.expect_value("{")?;
        let params = if self.check("}") { Vec::new() } else { self.parse_param_list()? };
        self.expect_value("}")?;
        self.expect_value("=>")?;
        let return_type = self.parse_type_name()?;
        self.expect_value(":")?;
        let body = self.parse_block_end()?;
        Ok(FunctionDecl {
            name: Self::text_of(&name_tok),
            params,
            return_type,
            body,
            line: name_tok.line,
        })
    }

    /// Parameters are whitespace-separated `Type name` pairs, no commas.
    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            let type_name = self.parse_type_name()?;
            let name_tok = self.expect_ident()?;
            params.push(Param {
                type_name,
                name: Self::text_of(&name_tok),
                line: name_tok.line,
            });
            if self.check("}") || self.check("=>") {
                break;
            }
        }
        Ok(params)
    }

    // ---- statements ----

    /// Statements until the closing `!`, which is consumed.
    fn parse_block_end(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check("!") {
            stmts.push(self.parse_statement()?);
        }
        self.expect_value("!")?;
        Ok(stmts)
    }

    /// Statements until (excluding) any of `stop_values`.
    fn parse_block_body(&mut self, stop_values: &[&str]) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !stop_values.iter().any(|stop| self.check(stop)) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        if self.check("if") || self.looks_like_if() {
            return self.parse_if_stmt();
        }
        if self.check("While") {
            return self.parse_while_stmt();
        }
        if self.check("For") {
            return self.parse_for_stmt();
        }
        let stmt = self.parse_simple_stmt()?;
        self.expect_value(".")?;
        Ok(stmt)
    }

    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        if self.type_kw_at(0).is_some() {
            return self.parse_var_decl();
        }
        if self.check("Publish") {
            let tok = self.advance();
            let expr = self.parse_expr()?;
            return Ok(Stmt::Publish { expr, line: tok.line });
        }
        if self.check("Send") {
            let tok = self.advance();
            let expr = self.parse_expr()?;
            return Ok(Stmt::Send { expr, line: tok.line });
        }
        if self.check("return") {
            return self.parse_return_stmt();
        }
        self.parse_assignment_or_expr()
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let type_name = self.parse_type_name()?;
        let name_tok = self.expect_ident()?;
        let value = if self.match_value("=") { Some(self.parse_expr()?) } else { None };
        Ok(Stmt::VarDecl {
            type_name,
            name: Self::text_of(&name_tok),
            value,
            line: name_tok.line,
        })
    }

    /// `return` or `return ( expr )` — a bare value needs the parentheses.
    fn parse_return_stmt(&mut self) -> PResult<Stmt> {
        let tok = self.expect_value("return")?;
        let expr = if self.match_value("(") {
            let expr = self.parse_expr()?;
            self.expect_value(")")?;
            Some(expr)
        } else {
            None
        };
        Ok(Stmt::Return { expr, line: tok.line })
    }

    fn parse_assignment_or_expr(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        let expr = self.parse_expr()?;
        if self.match_value("=") {
            let value = self.parse_expr()?;
            return match expr {
                Expr::Var { .. } | Expr::Index { .. } => Ok(Stmt::Assign { target: expr, value, line }),
                Expr::Binary { op: BinOp::Pointer, .. } => Ok(Stmt::PixelAssign { pointer: expr, value, line }),
                _ => Err(Exception::parse("Invalid assignment target", line)),
            };
        }
        Ok(Stmt::Expr { expr, line })
    }

    /// Lookahead for an `If` without the `if` keyword: a balanced
    /// parenthesised expression immediately followed by `?` at statement
    /// position.
    fn looks_like_if(&self) -> bool {
        if !self.check("(") {
            return false;
        }
        let mut depth = 0usize;
        for i in self.pos..self.tokens.len() {
            let token = &self.tokens[i];
            if token.is("(") {
                depth += 1;
            } else if token.is(")") {
                depth -= 1;
                if depth == 0 {
                    return self.peek_is(i - self.pos + 1, "?");
                }
            }
        }
        false
    }

    fn parse_if_stmt(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        if self.check("if") {
            self.advance();
        }
        self.expect_value("(")?;
        let condition = self.parse_expr()?;
        self.expect_value(")")?;
        self.expect_value("?")?;
        let then_body = self.parse_block_body(&["!?", "!"])?;
        let else_body = if self.match_value("!?") {
            Some(self.parse_block_body(&["!"])?)
        } else {
            None
        };
        self.expect_value("!")?;
        Ok(Stmt::If {
            condition,
            then_body,
            else_body,
            line,
        })
    }

    fn parse_while_stmt(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        self.expect_value("While")?;
        self.expect_value("(")?;
        let condition = self.parse_expr()?;
        self.expect_value(")")?;
        let body = self.parse_block_end()?;
        Ok(Stmt::While { condition, body, line })
    }

    fn parse_for_stmt(&mut self) -> PResult<Stmt> {
        let line = self.current().line;
        self.expect_value("For")?;
        let type_name = if self.type_kw_at(0).is_some() {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let var_tok = self.expect_ident()?;
        self.expect_value("in")?;
        let iterable = self.parse_expr()?;
        self.expect_value(":")?;
        let body = self.parse_block_end()?;
        Ok(Stmt::For {
            type_name,
            var: Self::text_of(&var_tok),
            iterable,
            body,
            line,
        })
    }

    fn parse_type_name(&mut self) -> PResult<TypeName> {
        match self.type_kw_at(0) {
            Some(type_name) => {
                self.advance();
                Ok(type_name)
            }
            None => Err(Exception::parse("Expected type name", self.current().line)),
        }
    }

    // ---- expressions, lowest precedence first ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_pointer_expr()
    }

    fn parse_pointer_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bool_expr()?;
        while self.check("->") {
            let line = self.advance().line;
            let right = self.parse_bool_expr()?;
            left = Expr::Binary {
                op: BinOp::Pointer,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_bool_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_compare_expr()?;
        loop {
            let op = if self.check("and") {
                BinOp::And
            } else if self.check("or") {
                BinOp::Or
            } else if self.check("xor") {
                BinOp::Xor
            } else {
                return Ok(left);
            };
            let line = self.advance().line;
            let right = self.parse_compare_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
    }

    /// Comparison is non-associative: at most one comparison per level.
    fn parse_compare_expr(&mut self) -> PResult<Expr> {
        let left = self.parse_bitor_expr()?;
        let op = if self.check("==") {
            BinOp::Eq
        } else if self.check("<") {
            BinOp::Lt
        } else if self.check(">") {
            BinOp::Gt
        } else if self.check("<=") {
            BinOp::Le
        } else if self.check(">=") {
            BinOp::Ge
        } else {
            return Ok(left);
        };
        let line = self.advance().line;
        let right = self.parse_bitor_expr()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            line,
        })
    }

    fn parse_bitor_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bitand_expr()?;
        while self.check("|") {
            let line = self.advance().line;
            let right = self.parse_bitand_expr()?;
            left = Expr::Binary {
                op: BinOp::BitOr,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_bitand_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_add_expr()?;
        while self.check("&") {
            let line = self.advance().line;
            let right = self.parse_add_expr()?;
            left = Expr::Binary {
                op: BinOp::BitAnd,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_add_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = if self.check("+") {
                BinOp::Add
            } else if self.check("-") {
                BinOp::Sub
            } else {
                return Ok(left);
            };
            let line = self.advance().line;
            let right = self.parse_mul_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
    }

    fn parse_mul_expr(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary_expr()?;
        while self.check("*") {
            let line = self.advance().line;
            let right = self.parse_unary_expr()?;
            left = Expr::Binary {
                op: BinOp::Mul,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let op = if self.check("not") {
            UnaryOp::Not
        } else if self.check("~") {
            UnaryOp::BitNot
        } else if self.check("-") {
            UnaryOp::Neg
        } else {
            return self.parse_postfix_expr();
        };
        let line = self.advance().line;
        let expr = self.parse_unary_expr()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            line,
        })
    }

    /// Postfix `< index >` with backtracking: when the bracketed index does
    /// not parse through the closing `>`, the cursor rewinds and the `<` is
    /// left for [`parse_compare_expr`] to consume.
    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        while self.check("<") {
            let saved = self.pos;
            let line = self.current().line;
            match self.try_parse_index() {
                Ok(index) => {
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                Err(_) => {
                    self.pos = saved;
                    break;
                }
            }
        }
        Ok(expr)
    }

    /// Index expressions must not consume the closing `>` as a comparison
    /// operator, so the index grammar starts at the bit-or level.
    fn try_parse_index(&mut self) -> PResult<Expr> {
        self.expect_value("<")?;
        let index = self.parse_bitor_expr()?;
        self.expect_value(">")?;
        Ok(index)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        // Zero-argument type constructor call, e.g. `Frame()`.
        if self.type_kw_at(0).is_some() && self.peek_is(1, "(") && self.peek_is(2, ")") {
            let tok = self.advance();
            self.expect_value("(")?;
            self.expect_value(")")?;
            return Ok(Expr::Call {
                name: Self::text_of(&tok),
                args: Vec::new(),
                line: tok.line,
            });
        }
        match self.current().kind {
            TokenKind::Int => {
                let tok = self.advance();
                let TokenValue::Int(value) = tok.value else {
                    return Err(Exception::parse("malformed integer token", tok.line));
                };
                return Ok(Expr::Literal {
                    value: LiteralValue::Int(value),
                    line: tok.line,
                });
            }
            TokenKind::Str => {
                let tok = self.advance();
                return Ok(Expr::Literal {
                    value: LiteralValue::Str(Self::text_of(&tok)),
                    line: tok.line,
                });
            }
            _ => {}
        }
        if self.check("true") || self.check("false") || self.check("none") {
            let tok = self.advance();
            let value = match tok.text() {
                "true" => LiteralValue::Bool(true),
                "false" => LiteralValue::Bool(false),
                _ => LiteralValue::None,
            };
            return Ok(Expr::Literal { value, line: tok.line });
        }
        if self.check("Do") {
            return self.parse_call_expr();
        }
        if self.current().kind == TokenKind::Ident {
            let name_tok = self.advance();
            if self.check("{") {
                return self.parse_brace_call(&name_tok, None);
            }
            return Ok(Expr::Var {
                name: Self::text_of(&name_tok),
                line: name_tok.line,
            });
        }
        if self.check("[") {
            return self.parse_list_lit();
        }
        if self.check("(") {
            return self.parse_paren_expr();
        }
        Err(Exception::parse(
            format!("Unexpected token '{}'", self.current()),
            self.current().line,
        ))
    }

    fn parse_call_expr(&mut self) -> PResult<Expr> {
        let tok = self.expect_value("Do")?;
        let name_tok = self.expect_ident()?;
        self.parse_brace_call(&name_tok, Some(tok.line))
    }

    /// `name { args }` — arguments are whitespace-separated expressions.
    fn parse_brace_call(&mut self, name_tok: &Token, line_override: Option<u32>) -> PResult<Expr> {
        let line = line_override.unwrap_or(name_tok.line);
        self.expect_value("{")?;
        let mut args = Vec::new();
        while !self.check("}") {
            args.push(self.parse_expr()?);
        }
        self.expect_value("}")?;
        Ok(Expr::Call {
            name: Self::text_of(name_tok),
            args,
            line,
        })
    }

    fn parse_list_lit(&mut self) -> PResult<Expr> {
        let tok = self.expect_value("[")?;
        let mut items = Vec::new();
        while !self.check("]") {
            items.push(self.parse_expr()?);
        }
        self.expect_value("]")?;
        Ok(Expr::List { items, line: tok.line })
    }

    /// Disambiguates the parenthesised forms by content: walrus
    /// declaration, walrus assignment, then one, two or three
    /// whitespace-separated expressions (paren / pixel / color).
    fn parse_paren_expr(&mut self) -> PResult<Expr> {
        let line = self.current().line;
        self.expect_value("(")?;

        if let Some(type_name) = self.type_kw_at(0)
            && self.peek_kind(1) == Some(TokenKind::Ident)
            && self.peek_is(2, "=")
        {
            self.advance();
            let name_tok = self.expect_ident()?;
            self.expect_value("=")?;
            let expr = self.parse_expr()?;
            self.expect_value(")")?;
            return Ok(Expr::WalrusDecl {
                type_name,
                name: Self::text_of(&name_tok),
                expr: Box::new(expr),
                line,
            });
        }
        if self.current().kind == TokenKind::Ident && self.peek_is(1, "=") {
            let name_tok = self.expect_ident()?;
            self.expect_value("=")?;
            let expr = self.parse_expr()?;
            self.expect_value(")")?;
            return Ok(Expr::WalrusAssign {
                name: Self::text_of(&name_tok),
                expr: Box::new(expr),
                line,
            });
        }

        let first = self.parse_expr()?;
        if self.match_value(")") {
            return Ok(Expr::Paren {
                expr: Box::new(first),
                line,
            });
        }
        let second = self.parse_expr()?;
        if self.match_value(")") {
            return Ok(Expr::Pixel {
                x: Box::new(first),
                y: Box::new(second),
                line,
            });
        }
        let third = self.parse_expr()?;
        self.expect_value(")")?;
        Ok(Expr::Color {
            r: Box::new(first),
            g: Box::new(second),
            b: Box::new(third),
            line,
        })
    }
}
