//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String, bool>`
//!    tracking declared (false) and fully defined (true) names in each
//!    nested block, function, or class frame.
//! 2. **Assign slots**: parallel stacks map every name to the index the
//!    interpreter's `define` will hand out at runtime, so each variable
//!    occurrence can be bound to a `(depth, slot)` coordinate and the
//!    runtime never looks anything up by name.
//! 3. **Enforce static rules**: redeclaration, reading a variable in its
//!    own initializer, invalid `return`, illegal `this`/`super`, and
//!    class self-inheritance are all reported here, in place; resolution
//!    continues after an error so one pass can report as many problems
//!    as possible.
//! 4. **Track liveness**: `var` declarations that are never read are
//!    reported when their scope ends (for globals, when the whole program
//!    has been resolved).
//!
//! Globals live in a single flat namespace owned by the interpreter; its
//! initial entries are the native functions, preregistered before the
//! resolver is constructed so both sides agree on slot order.  A global
//! referenced before its declaration is registered on first use, which
//! keeps mutual recursion between top-level functions legal.
//!
//! # Usage
//!
//! After parsing, before interpretation:
//! ```ignore
//! let mut resolver = Resolver::new(&mut interpreter);
//! resolver.resolve(&statements);
//! resolver.end_program(); // file mode only: report unused globals
//! let errors = resolver.into_errors();
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;

/// What kind of function body are we inside?  Used to validate `return`,
/// `this`, and initializer rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Static,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// coordinates (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,

    // Parallel per-scope stacks.
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    var_indices: Vec<HashMap<String, usize>>,
    scope_indices: Vec<usize>,
    unused_vars: Vec<HashMap<String, Token>>,

    // `var` declarations of the current run's global scope that have not
    // been read yet.
    unused_globals: HashMap<String, Token>,

    current_function: FunctionType,
    current_class: ClassType,

    errors: Vec<LoxError>,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.  The
    /// interpreter must already have its native functions registered.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            var_indices: Vec::new(),
            scope_indices: Vec::new(),
            unused_vars: Vec::new(),
            unused_globals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements, accumulating diagnostics.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    /// Report global `var` declarations that the whole program never read.
    /// Must run once, after the entire top-level program is resolved; the
    /// REPL skips it because a line is not a whole program.
    pub fn end_program(&mut self) {
        let mut survivors: Vec<Token> = self.unused_globals.drain().map(|(_, tok)| tok).collect();

        survivors.sort_by_key(|tok| (tok.line, tok.column));

        for token in survivors {
            self.errors.push(LoxError::resolve(
                token.line,
                token.column,
                format!("Unused variable '{}'", token.lexeme),
            ));
        }
    }

    /// Consumes the resolver, yielding every diagnostic it produced.
    pub fn into_errors(self) -> Vec<LoxError> {
        self.errors
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                statics,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), statics, methods),

            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // Declare first so the self-initializer check can see the
                // name in a declared-but-undefined state.
                self.declare(name, true);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(decl) => {
                if let Some(name) = &decl.name {
                    // Declare and define eagerly so the body may recurse.
                    self.declare(name, false);
                    self.define(name);
                }

                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            // The parser already rejects `break` outside a loop.
            Stmt::Break(_) => {}

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        keyword.column,
                        "can only return from functions or methods",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(LoxError::resolve(
                            keyword.line,
                            keyword.column,
                            "Cannot return value from an initializer",
                        ));
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        statics: &[Rc<FunctionDecl>],
        methods: &[Rc<FunctionDecl>],
    ) {
        // 1. Self-inheritance guard.
        if let Some(Expr::Variable {
            name: super_name, ..
        }) = superclass
        {
            if super_name.lexeme == name.lexeme {
                self.errors.push(LoxError::resolve(
                    super_name.line,
                    super_name.column,
                    "A class cannot inherit from itself",
                ));
            }
        }

        // 2. Declare & define the class name so methods can refer to it.
        self.declare(name, false);
        self.define(name);

        // 3. Save and enter the class context.
        let enclosing_class: ClassType = self.current_class;

        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        // 4. If there is a superclass, resolve it and open a scope binding
        //    `super` in slot 0.
        if let Some(super_expr) = superclass {
            self.resolve_expr(super_expr);

            self.begin_scope();
            self.declare_keyword("super");
        }

        // 5. Open the implicit `this` scope for method bodies; `this`
        //    occupies slot 0, matching the frame the interpreter builds.
        self.begin_scope();
        self.declare_keyword("this");

        // 6. Static methods resolve in the same frame but may not touch
        //    `this`; instance methods named `init` are initializers.
        for decl in statics {
            self.resolve_function(decl, FunctionType::Static);
        }

        for decl in methods {
            let kind: FunctionType = match &decl.name {
                Some(token) if token.lexeme == "init" => FunctionType::Initializer,
                _ => FunctionType::Method,
            };

            self.resolve_function(decl, kind);
        }

        // 7. Close the `this` scope, then the `super` scope if present.
        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        // 8. Restore the outer class context.
        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::List(exprs) => {
                for expr in exprs {
                    self.resolve_expr(expr);
                }
            }

            Expr::Variable { id, name } => {
                // Prevent `var a = a;` from reading the half-born binding.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.errors.push(LoxError::resolve(
                            name.line,
                            name.column,
                            "can't read local variable in its own initializer",
                        ));

                        return;
                    }
                }

                self.resolve_local(*id, name, true);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);

                // A write alone does not count as a use.
                self.resolve_local(*id, name, false);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Lambda { decl, .. } => {
                self.resolve_function(decl, FunctionType::Lambda);
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        keyword.column,
                        "can't use 'this' outside of a class",
                    ));

                    return;
                }

                if self.current_function == FunctionType::Static {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        keyword.column,
                        "can't use 'this' in a static method",
                    ));

                    return;
                }

                self.resolve_local(*id, keyword, true);
            }

            Expr::Super { id, keyword, .. } => {
                if self.current_class != ClassType::Subclass {
                    self.errors.push(LoxError::resolve(
                        keyword.line,
                        keyword.column,
                        "can't use 'super' outside of a sub class",
                    ));

                    return;
                }

                self.resolve_local(*id, keyword, true);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing: FunctionType = self.current_function;

        self.current_function = kind;

        self.begin_scope();

        for param in &decl.params {
            self.declare(param, false);
            self.define(param);
        }

        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
        self.var_indices.push(HashMap::new());
        self.scope_indices.push(0);
        self.unused_vars.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        // Anything still tracked here was declared but never read.
        if let Some(unused) = self.unused_vars.last() {
            let mut survivors: Vec<Token> = unused.values().cloned().collect();

            survivors.sort_by_key(|tok| (tok.line, tok.column));

            for token in survivors {
                self.errors.push(LoxError::resolve(
                    token.line,
                    token.column,
                    format!("Unused variable '{}'", token.lexeme),
                ));
            }
        }

        self.scopes.pop();
        self.var_indices.pop();
        self.scope_indices.pop();
        self.unused_vars.pop();
    }

    /// Declares `name` in the innermost scope, assigning the slot the
    /// interpreter's next `define` in that scope will produce.  In the
    /// global scope the name registers in the interpreter's flat
    /// namespace instead.  `track_unused` is set for `var` declarations
    /// only.
    fn declare(&mut self, name: &Token, track_unused: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(LoxError::resolve(
                    name.line,
                    name.column,
                    format!("'{}' already declared in the same scope", name.lexeme),
                ));

                return;
            }

            scope.insert(name.lexeme.clone(), false);

            let next: &mut usize = self
                .scope_indices
                .last_mut()
                .expect("scope stacks are pushed together");
            let slot: usize = *next;
            *next += 1;

            self.var_indices
                .last_mut()
                .expect("scope stacks are pushed together")
                .insert(name.lexeme.clone(), slot);

            if track_unused {
                self.unused_vars
                    .last_mut()
                    .expect("scope stacks are pushed together")
                    .insert(name.lexeme.clone(), name.clone());
            }

            debug!("Declared local '{}' at slot {}", name.lexeme, slot);
        } else {
            match self.interpreter.global_slot(&name.lexeme) {
                Some(slot) if self.interpreter.global_is_declared(slot) => {
                    self.errors.push(LoxError::resolve(
                        name.line,
                        name.column,
                        format!("'{}' already declared in global scope", name.lexeme),
                    ));

                    return;
                }

                // Seen earlier as a forward reference; now it is real.
                Some(slot) => self.interpreter.mark_global_declared(slot),

                None => {
                    self.interpreter.register_global(&name.lexeme, true);
                }
            }

            if track_unused {
                self.unused_globals
                    .insert(name.lexeme.clone(), name.clone());
            }

            debug!("Declared global '{}'", name.lexeme);
        }
    }

    /// Marks the name as fully defined in the current scope.
    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Installs an implicit binding (`this`, `super`) in slot 0 of a
    /// freshly opened scope.
    fn declare_keyword(&mut self, name: &str) {
        let scope = self
            .scopes
            .last_mut()
            .expect("declare_keyword requires an open scope");

        scope.insert(name.to_string(), true);

        let next: &mut usize = self
            .scope_indices
            .last_mut()
            .expect("scope stacks are pushed together");
        let slot: usize = *next;
        *next += 1;

        self.var_indices
            .last_mut()
            .expect("scope stacks are pushed together")
            .insert(name.to_string(), slot);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either a local at `(depth,
    /// slot)` or a global slot.  A global not seen before is registered as
    /// a forward reference; whether it is ever declared is the runtime's
    /// problem, which keeps mutually recursive top-level functions legal.
    fn resolve_local(&mut self, id: ExprId, name: &Token, is_read: bool) {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(&name.lexeme) {
                let depth: usize = self.scopes.len() - 1 - i;
                let slot: usize = self.var_indices[i][&name.lexeme];

                debug!(
                    "Resolved '{}' at depth {}, slot {}",
                    name.lexeme, depth, slot
                );

                if is_read {
                    self.unused_vars[i].remove(&name.lexeme);
                }

                self.interpreter.resolve_local(id, depth, slot);

                return;
            }
        }

        let slot: usize = match self.interpreter.global_slot(&name.lexeme) {
            Some(slot) => slot,
            None => self.interpreter.register_global(&name.lexeme, false),
        };

        debug!("Resolved '{}' as global slot {}", name.lexeme, slot);

        if is_read {
            self.unused_globals.remove(&name.lexeme);
        }

        self.interpreter.resolve_global(id, slot);
    }
}
