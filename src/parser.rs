//! Recursive-descent parser producing the statement list the resolver and
//! interpreter consume.
//!
//! One token of lookahead plus a `peek_next` helper; `put_back` rewinds the
//! cursor by a single token and is used in exactly one place, to
//! disambiguate `fun (` (a lambda in expression position) from `fun name(`
//! (a function declaration).  On a parse error the parser records the
//! diagnostic, resynchronizes at the next statement boundary, and keeps
//! going, so one run can report several errors.

use std::rc::Rc;

use log::debug;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::error::LoxError;
use crate::token::{Token, TokenType};

/// Parameter and argument lists are capped at this many entries.
const MAX_ARITY: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    next_id: ExprId,
    errors: Vec<LoxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            loop_depth: 0,
            next_id: 0,
            errors: Vec::new(),
        }
    }

    /// Parses the whole token stream, returning every statement that parsed
    /// cleanly together with every error encountered.  Callers must not
    /// execute the statements when any error was reported.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<LoxError>) {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    debug!("Parse error, resynchronizing: {}", e);

                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        (statements, self.errors)
    }

    fn fresh_id(&mut self) -> ExprId {
        let id: ExprId = self.next_id;

        self.next_id += 1;

        id
    }

    // ─────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt, LoxError> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.check(&TokenType::FUN) {
            // `fun (` begins a lambda in expression position, not a
            // declaration.
            let lambda: bool = self.peek_next().token_type == TokenType::LEFT_PAREN;

            self.advance();

            if lambda {
                // Hand the keyword back to the expression parser.
                self.put_back();

                return self.statement();
            }

            return self.function_declaration();
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected class name")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            let super_name: Token =
                self.consume(&TokenType::IDENTIFIER, "Expected superclass name after '<'")?;

            let id: ExprId = self.fresh_id();

            Some(Expr::Variable {
                id,
                name: super_name,
            })
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expected '{' before class body")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut statics: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            // A leading `class` keyword marks a static method.
            if self.match_tokens(&[TokenType::CLASS]) {
                statics.push(self.method()?);
            } else {
                methods.push(self.method()?);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expected '}' after class body")?;

        debug!(
            "Parsed class '{}' with {} method(s), {} static(s)",
            name.lexeme,
            methods.len(),
            statics.len()
        );

        Ok(Stmt::Class {
            name,
            superclass,
            statics,
            methods,
        })
    }

    fn method(&mut self) -> Result<Rc<FunctionDecl>, LoxError> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected method name")?;

        self.function_body(Some(name))
    }

    fn function_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected function name")?;

        let decl: Rc<FunctionDecl> = self.function_body(Some(name))?;

        Ok(Stmt::Function(decl))
    }

    /// Parses `'(' params? ')' block` into a shared declaration record.
    fn function_body(&mut self, name: Option<Token>) -> Result<Rc<FunctionDecl>, LoxError> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' before parameter list")?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    let err: LoxError =
                        self.error_at_current("Can't have more than 255 parameters");

                    self.errors.push(err);
                }

                params.push(self.consume(&TokenType::IDENTIFIER, "Expected parameter name")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after parameter list")?;
        self.consume(&TokenType::LEFT_BRACE, "Expected '{' before function body")?;

        let body: Vec<Stmt> = self.block_statements()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected variable name")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "Expected ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::BREAK]) {
            return self.break_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    fn print_statement(&mut self) -> Result<Stmt, LoxError> {
        let expr: Expr = self.expression()?;

        self.consume(&TokenType::SEMICOLON, "Expected ';' after value")?;

        Ok(Stmt::Print(expr))
    }

    fn break_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            return Err(self.error_at(&keyword, "'break' used outside of a loop"));
        }

        self.consume(&TokenType::SEMICOLON, "Expected ';' after 'break'")?;

        Ok(Stmt::Break(keyword))
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "Expected ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'if'")?;

        let condition: Expr = self.expression()?;

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after if condition")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);

        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'while'")?;

        let condition: Expr = self.expression()?;

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after while condition")?;

        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;

        Ok(Stmt::While {
            condition,
            body: Box::new(body?),
        })
    }

    /// `for` has no AST node; it desugars to
    /// `Block[init?, While(cond, Block[body, increment?])]`.
    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'for'")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Expr = if self.check(&TokenType::SEMICOLON) {
            Expr::Literal(LiteralValue::True)
        } else {
            self.expression()?
        };

        self.consume(&TokenType::SEMICOLON, "Expected ';' after loop condition")?;

        let increment: Option<Expr> = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after for clauses")?;

        self.loop_depth += 1;
        let body_result = self.statement();
        self.loop_depth -= 1;

        let mut body: Stmt = body_result?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        } else {
            body = Stmt::Block(vec![body]);
        }

        Ok(body)
    }

    fn block_statements(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expected '}' after block")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, LoxError> {
        let expr: Expr = self.expression()?;

        self.consume(&TokenType::SEMICOLON, "Expected ';' after expression")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions, highest precedence last
    // ─────────────────────────────────────────────────────────────────────

    /// `expression := assignment (',' assignment)*`, always wrapped in a
    /// `List` even when singleton; evaluation yields the last element.
    fn expression(&mut self) -> Result<Expr, LoxError> {
        let mut exprs: Vec<Expr> = vec![self.assignment()?];

        while self.match_tokens(&[TokenType::COMMA]) {
            exprs.push(self.assignment()?);
        }

        Ok(Expr::List(exprs))
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr: Expr = self.ternary()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            return Ok(self.rewrite_assignment_target(expr, &equals, value));
        }

        if self.match_tokens(&[
            TokenType::PLUS_EQUAL,
            TokenType::MINUS_EQUAL,
            TokenType::STAR_EQUAL,
            TokenType::SLASH_EQUAL,
        ]) {
            let compound: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            return Ok(self.rewrite_compound_assignment(expr, &compound, value));
        }

        Ok(expr)
    }

    /// On seeing `=`: a `Variable` target becomes an `Assign`, a `Get`
    /// target becomes a `Set`; anything else is an invalid target,
    /// reported at the `=` token without aborting the parse.
    fn rewrite_assignment_target(&mut self, target: Expr, equals: &Token, value: Expr) -> Expr {
        match target {
            Expr::Variable { name, .. } => {
                let id: ExprId = self.fresh_id();

                Expr::Assign {
                    id,
                    name,
                    value: Box::new(value),
                }
            }

            Expr::Get { object, name } => Expr::Set {
                object,
                name,
                value: Box::new(value),
            },

            other => {
                let err: LoxError = self.error_at(equals, "Invalid assignment target");

                self.errors.push(err);

                other
            }
        }
    }

    /// `a += e` desugars to `a = a + e` (and likewise for `-=`, `*=`,
    /// `/=`); `obj.f += e` desugars to `obj.f = obj.f + e`.  The read side
    /// gets its own fresh node so the resolver binds it independently.
    fn rewrite_compound_assignment(&mut self, target: Expr, compound: &Token, value: Expr) -> Expr {
        let operator: Token = Parser::desugared_operator(compound);

        match target {
            Expr::Variable { name, .. } => {
                let read_id: ExprId = self.fresh_id();
                let write_id: ExprId = self.fresh_id();

                let read: Expr = Expr::Variable {
                    id: read_id,
                    name: name.clone(),
                };

                Expr::Assign {
                    id: write_id,
                    name,
                    value: Box::new(Expr::Binary {
                        left: Box::new(read),
                        operator,
                        right: Box::new(value),
                    }),
                }
            }

            Expr::Get { object, name } => {
                let read: Expr = Expr::Get {
                    object: object.clone(),
                    name: name.clone(),
                };

                Expr::Set {
                    object,
                    name,
                    value: Box::new(Expr::Binary {
                        left: Box::new(read),
                        operator,
                        right: Box::new(value),
                    }),
                }
            }

            other => {
                let err: LoxError = self.error_at(compound, "Invalid assignment target");

                self.errors.push(err);

                other
            }
        }
    }

    fn desugared_operator(compound: &Token) -> Token {
        let (token_type, lexeme) = match compound.token_type {
            TokenType::PLUS_EQUAL => (TokenType::PLUS, "+"),
            TokenType::MINUS_EQUAL => (TokenType::MINUS, "-"),
            TokenType::STAR_EQUAL => (TokenType::STAR, "*"),
            _ => (TokenType::SLASH, "/"),
        };

        Token::new(
            token_type,
            lexeme.to_string(),
            compound.line,
            compound.column,
        )
    }

    fn ternary(&mut self) -> Result<Expr, LoxError> {
        let condition: Expr = self.logic_or()?;

        if self.match_tokens(&[TokenType::QUESTION]) {
            let then_branch: Expr = self.ternary()?;

            self.consume(&TokenType::COLON, "Expected ':' in ternary expression")?;

            let else_branch: Expr = self.ternary()?;

            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(condition)
    }

    fn logic_or(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.logic_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logic_and()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name: Token =
                    self.consume(&TokenType::IDENTIFIER, "Expected property name after '.'")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let err: LoxError =
                        self.error_at_current("Can't have more than 255 arguments");

                    self.errors.push(err);
                }

                arguments.push(self.assignment()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after arguments")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        if self.match_tokens(&[TokenType::NUMBER(0.0)]) {
            if let TokenType::NUMBER(n) = self.previous().token_type {
                return Ok(Expr::Literal(LiteralValue::Number(n)));
            }
        }

        if self.match_tokens(&[TokenType::STRING(String::new())]) {
            if let TokenType::STRING(s) = &self.previous().token_type {
                return Ok(Expr::Literal(LiteralValue::Str(s.clone())));
            }
        }

        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(LiteralValue::True));
        }

        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(LiteralValue::False));
        }

        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            let keyword: Token = self.previous().clone();
            let id: ExprId = self.fresh_id();

            return Ok(Expr::This { id, keyword });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();

            self.consume(&TokenType::DOT, "Expected '.' after 'super'")?;

            let method: Token =
                self.consume(&TokenType::IDENTIFIER, "Expected superclass method name")?;

            let id: ExprId = self.fresh_id();

            return Ok(Expr::Super {
                id,
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            let name: Token = self.previous().clone();
            let id: ExprId = self.fresh_id();

            return Ok(Expr::Variable { id, name });
        }

        if self.match_tokens(&[TokenType::FUN]) {
            let keyword: Token = self.previous().clone();
            let decl: Rc<FunctionDecl> = self.function_body(None)?;

            return Ok(Expr::Lambda { keyword, decl });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr: Expr = self.expression()?;

            self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after expression")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(self.error_at_current("Expected expression"))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cursor helpers
    // ─────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();

                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        !self.is_at_end() && &self.peek().token_type == token_type
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> Result<Token, LoxError> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(self.error_at_current(message))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    /// Rewinds the cursor by one token.  Only ever called immediately
    /// after an `advance`.
    fn put_back(&mut self) {
        debug_assert!(self.current > 0);

        self.current -= 1;
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Second token of lookahead; saturates at the trailing `EOF`.
    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.current + 1)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error_at(&self, token: &Token, message: &str) -> LoxError {
        LoxError::parse(token.line, token.column, message)
    }

    fn error_at_current(&self, message: &str) -> LoxError {
        let token: &Token = self.peek();

        LoxError::parse(token.line, token.column, message)
    }

    /// Discards tokens until a likely statement boundary: just past a
    /// `;`, or just before a keyword that can begin a declaration.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }
}
