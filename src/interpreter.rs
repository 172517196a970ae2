use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::{Class, Function, Instance, NativeFn, Value};

/// Non-local control transfer, distinct from the error channel.
///
/// `break` and `return` unwind through nested `execute_block` calls as a
/// typed signal; `while` absorbs `Break`, function calls absorb `Return`.
/// No other value is ever smuggled this way.
#[derive(Debug)]
pub enum Signal {
    Normal,
    Break,
    Return(Value),
}

/// One registered global name.  `declared` distinguishes names introduced
/// by a declaration (or preregistered natives) from names first seen as a
/// forward reference.
#[derive(Debug, Clone)]
struct GlobalName {
    name: String,
    declared: bool,
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,

    // Resolution side-tables, populated by the resolver.
    locals: HashMap<ExprId, (usize, usize)>,
    globals_idx: HashMap<ExprId, usize>,

    // Persistent global namespace: slot-ordered names, natives first.
    // Survives REPL lines so the resolver of a later line agrees with the
    // slots of an earlier one.
    registry: Vec<GlobalName>,
    registry_index: HashMap<String, usize>,

    // Line-writer for `print`.
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        let globals: Rc<RefCell<Environment>> = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter: Interpreter = Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            globals_idx: HashMap::new(),
            registry: Vec::new(),
            registry_index: HashMap::new(),
            out,
        };

        interpreter.define_native("clock", 0, clock_native);

        interpreter
    }

    fn define_native(
        &mut self,
        name: &str,
        arity: usize,
        func: fn(&[Value]) -> std::result::Result<Value, String>,
    ) {
        let native: Value = Value::Native(Rc::new(NativeFn {
            name: name.to_string(),
            arity,
            func,
        }));

        let slot: usize = self.register_global(name, true);

        self.globals.borrow_mut().define_at(slot, native);

        info!("Registered native function '{}' in global slot {}", name, slot);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolver interface
    // ─────────────────────────────────────────────────────────────────────

    /// Records a local binding for an expression node.
    pub fn resolve_local(&mut self, id: ExprId, depth: usize, slot: usize) {
        debug!("Noting local: id={}, depth={}, slot={}", id, depth, slot);

        self.locals.insert(id, (depth, slot));
    }

    /// Records a global binding for an expression node.
    pub fn resolve_global(&mut self, id: ExprId, slot: usize) {
        debug!("Noting global: id={}, slot={}", id, slot);

        self.globals_idx.insert(id, slot);
    }

    /// Slot of a registered global name, if any.
    pub fn global_slot(&self, name: &str) -> Option<usize> {
        self.registry_index.get(name).copied()
    }

    pub fn global_is_declared(&self, slot: usize) -> bool {
        self.registry[slot].declared
    }

    /// Registers a global name at the next free slot.
    pub fn register_global(&mut self, name: &str, declared: bool) -> usize {
        let slot: usize = self.registry.len();

        self.registry.push(GlobalName {
            name: name.to_string(),
            declared,
        });

        self.registry_index.insert(name.to_string(), slot);

        slot
    }

    pub fn mark_global_declared(&mut self, slot: usize) {
        let entry: &mut GlobalName = &mut self.registry[slot];

        entry.declared = true;

        debug!("Global '{}' declared at slot {}", entry.name, slot);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────

    /// Runs a resolved top-level statement list.  The first runtime error
    /// aborts the remainder of the list.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt)?;
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Signal::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value)?;

                Ok(Signal::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.define_variable(name, value);

                Ok(Signal::Normal)
            }

            Stmt::Block(statements) => {
                let enclosing: Rc<RefCell<Environment>> = Rc::clone(&self.environment);
                let environment: Rc<RefCell<Environment>> =
                    Rc::new(RefCell::new(Environment::with_enclosing(enclosing)));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Signal::Normal => {}

                        Signal::Break => break,

                        Signal::Return(value) => return Ok(Signal::Return(value)),
                    }
                }

                Ok(Signal::Normal)
            }

            Stmt::Break(_) => Ok(Signal::Break),

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Signal::Return(value))
            }

            Stmt::Function(decl) => {
                let function: Value = Value::Function(Rc::new(Function::new(
                    Rc::clone(decl),
                    Rc::clone(&self.environment),
                    false,
                )));

                if let Some(name) = &decl.name {
                    self.define_variable(name, function);
                }

                Ok(Signal::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                statics,
                methods,
            } => {
                self.execute_class(name, superclass.as_ref(), statics, methods)?;

                Ok(Signal::Normal)
            }
        }
    }

    /// Executes statements inside `environment`, restoring the previous
    /// environment pointer on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Signal> {
        let previous: Rc<RefCell<Environment>> =
            std::mem::replace(&mut self.environment, environment);

        let mut signal: Signal = Signal::Normal;

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Signal::Normal) => {}

                Ok(other) => {
                    signal = other;
                    break;
                }

                Err(e) => {
                    self.environment = previous;
                    return Err(e);
                }
            }
        }

        self.environment = previous;

        Ok(signal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        statics: &[Rc<crate::ast::FunctionDecl>],
        methods: &[Rc<crate::ast::FunctionDecl>],
    ) -> Result<()> {
        // Evaluate the superclass expression first; it must name a class.
        let superclass_value: Option<Rc<Class>> = match superclass {
            Some(expr) => {
                let value: Value = self.evaluate(expr)?;

                match value {
                    Value::Class(class) => Some(class),

                    _ => {
                        let token: &Token = match expr {
                            Expr::Variable { name, .. } => name,
                            _ => name,
                        };

                        return Err(LoxError::runtime(
                            token.line,
                            token.column,
                            "Superclass must be a class",
                        ));
                    }
                }
            }

            None => None,
        };

        // Reserve the class slot so methods can refer to the class by name.
        let slot: usize = self.define_variable(name, Value::Nil);

        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        // A frame binding `super` sits outside the class frame.
        if let Some(superclass_rc) = &superclass_value {
            let mut super_frame: Environment =
                Environment::with_enclosing(Rc::clone(&self.environment));

            super_frame.define(Value::Class(Rc::clone(superclass_rc)));

            self.environment = Rc::new(RefCell::new(super_frame));
        }

        // The class frame holds `this` in slot 0. The placeholder is never
        // read during construction; binding a method replaces this frame
        // with one holding the receiving instance at the same coordinate.
        let mut class_frame: Environment = Environment::with_enclosing(Rc::clone(&self.environment));

        class_frame.define(Value::Nil);

        let class_env: Rc<RefCell<Environment>> = Rc::new(RefCell::new(class_frame));

        self.environment = Rc::clone(&class_env);

        let mut method_map: HashMap<String, Rc<Function>> = HashMap::new();

        for decl in methods {
            let method_name: String = match &decl.name {
                Some(token) => token.lexeme.clone(),
                None => continue,
            };

            let is_initializer: bool = method_name == "init";

            method_map.insert(
                method_name,
                Rc::new(Function::new(
                    Rc::clone(decl),
                    Rc::clone(&class_env),
                    is_initializer,
                )),
            );
        }

        let mut static_map: HashMap<String, Rc<Function>> = HashMap::new();

        for decl in statics {
            let method_name: String = match &decl.name {
                Some(token) => token.lexeme.clone(),
                None => continue,
            };

            static_map.insert(
                method_name,
                Rc::new(Function::new(Rc::clone(decl), Rc::clone(&class_env), false)),
            );
        }

        self.environment = previous;

        let class: Value = Value::Class(Rc::new(Class {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
            statics: static_map,
        }));

        info!("Constructed class '{}'", name.lexeme);

        self.set_variable_slot(slot, class);

        Ok(())
    }

    /// Defines a fresh variable in the current scope, returning its slot.
    ///
    /// Local scopes append, mirroring the resolver's per-scope counter;
    /// the global scope lands on the registry-assigned slot.
    fn define_variable(&mut self, name: &Token, value: Value) -> usize {
        if Rc::ptr_eq(&self.environment, &self.globals) {
            let slot: usize = match self.global_slot(&name.lexeme) {
                Some(slot) => slot,
                None => self.register_global(&name.lexeme, true),
            };

            self.globals.borrow_mut().define_at(slot, value);

            slot
        } else {
            self.environment.borrow_mut().define(value)
        }
    }

    /// Writes a value into an already-reserved slot of the current scope.
    fn set_variable_slot(&mut self, slot: usize, value: Value) {
        if Rc::ptr_eq(&self.environment, &self.globals) {
            self.globals.borrow_mut().define_at(slot, value);
        } else {
            self.environment.borrow_mut().write_slot(slot, value);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::List(exprs) => {
                let mut last: Value = Value::Nil;

                for expr in exprs {
                    last = self.evaluate(expr)?;
                }

                Ok(last)
            }

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                if let Some(&(depth, slot)) = self.locals.get(id) {
                    Environment::assign_at(&self.environment, depth, slot, value.clone());
                } else if let Some(&slot) = self.globals_idx.get(id) {
                    if !self.globals.borrow_mut().write_slot(slot, value.clone()) {
                        return Err(undefined_variable(name));
                    }
                } else {
                    return Err(undefined_variable(name));
                }

                Ok(value)
            }

            Expr::Lambda { decl, .. } => Ok(Value::Function(Rc::new(Function::new(
                Rc::clone(decl),
                Rc::clone(&self.environment),
                false,
            )))),

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => self.evaluate_get(object, name),

            Expr::Set {
                object,
                name,
                value,
            } => self.evaluate_set(object, name, value),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&mut self, id: ExprId, name: &Token) -> Result<Value> {
        if let Some(&(depth, slot)) = self.locals.get(&id) {
            return Ok(Environment::get_at(&self.environment, depth, slot));
        }

        if let Some(&slot) = self.globals_idx.get(&id) {
            return self
                .globals
                .borrow()
                .read_slot(slot)
                .ok_or_else(|| undefined_variable(name));
        }

        Err(undefined_variable(name))
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    "Operand must be a number",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(
                operator.line,
                operator.column,
                "Invalid unary operator",
            )),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        // Logical operators are strict in this dialect: both operands are
        // always evaluated, then combined by truthiness.
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        let numeric_operands = "Operands must be numbers";

        match operator.token_type {
            TokenType::OR => {
                if is_truthy(&left_val) {
                    Ok(left_val)
                } else {
                    Ok(right_val)
                }
            }

            TokenType::AND => {
                if is_truthy(&left_val) {
                    Ok(right_val)
                } else {
                    Ok(left_val)
                }
            }

            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(_), _) | (_, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", left_val, right_val)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    "Operands must be two numbers or two strings",
                )),
            },

            TokenType::MINUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::STAR => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::SLASH => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(LoxError::runtime(
                            operator.line,
                            operator.column,
                            "Divide by zero",
                        ))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::LESS_EQUAL => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::GREATER => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            TokenType::GREATER_EQUAL => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    operator.column,
                    numeric_operands,
                )),
            },

            _ => Err(LoxError::runtime(
                operator.line,
                operator.column,
                "Invalid binary operator",
            )),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee_val: Value = self.evaluate(callee)?;

        let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        match callee_val {
            Value::Native(native) => {
                self.check_arity(native.arity, args.len(), paren)?;

                (native.func)(&args)
                    .map_err(|msg| LoxError::runtime(paren.line, paren.column, msg))
            }

            Value::Function(function) => {
                self.check_arity(function.arity(), args.len(), paren)?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                let arity: usize = class
                    .find_method("init")
                    .map(|init| init.arity())
                    .unwrap_or(0);

                self.check_arity(arity, args.len(), paren)?;

                self.instantiate(class, args)
            }

            _ => Err(LoxError::runtime(
                paren.line,
                paren.column,
                "Can only call functions and classes",
            )),
        }
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token) -> Result<()> {
        if expected != got {
            return Err(LoxError::runtime(
                paren.line,
                paren.column,
                format!("Expected {} arguments but got {}", expected, got),
            ));
        }

        Ok(())
    }

    /// Invokes a user function: a fresh frame encloses the captured
    /// closure, parameters fill consecutive slots in declaration order,
    /// then the body runs.  Initializers always yield the bound `this`.
    pub fn call_function(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Result<Value> {
        debug!(
            "Calling function {:?} with {} argument(s)",
            function.name(),
            args.len()
        );

        let mut frame: Environment = Environment::with_enclosing(Rc::clone(&function.closure));

        for arg in args {
            frame.define(arg);
        }

        let signal: Signal = self.execute_block(&function.decl.body, Rc::new(RefCell::new(frame)))?;

        let returned: Value = match signal {
            Signal::Return(value) => value,
            _ => Value::Nil,
        };

        if function.is_initializer {
            Ok(Environment::get_at(&function.closure, 0, 0))
        } else {
            Ok(returned)
        }
    }

    fn instantiate(&mut self, class: Rc<Class>, args: Vec<Value>) -> Result<Value> {
        let instance: Value = Value::Instance(Rc::new(RefCell::new(Instance::new(Rc::clone(
            &class,
        )))));

        if let Some(init) = class.find_method("init") {
            let bound: Rc<Function> = Rc::new(init.bind(instance.clone()));

            self.call_function(&bound, args)?;
        }

        Ok(instance)
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> Result<Value> {
        let object_val: Value = self.evaluate(object)?;

        match object_val {
            Value::Instance(instance) => {
                if let Some(field) = instance.borrow().fields.get(&name.lexeme) {
                    return Ok(field.clone());
                }

                let class: Rc<Class> = Rc::clone(&instance.borrow().class);

                if let Some(method) = class.find_method(&name.lexeme) {
                    let bound: Function = method.bind(Value::Instance(Rc::clone(&instance)));

                    return Ok(Value::Function(Rc::new(bound)));
                }

                Err(LoxError::runtime(
                    name.line,
                    name.column,
                    format!("Undefined property '{}'", name.lexeme),
                ))
            }

            Value::Class(class) => match class.find_static(&name.lexeme) {
                Some(method) => Ok(Value::Function(method)),

                None => Err(LoxError::runtime(
                    name.line,
                    name.column,
                    format!("Undefined property '{}'", name.lexeme),
                )),
            },

            _ => Err(LoxError::runtime(
                name.line,
                name.column,
                "Only instances have properties",
            )),
        }
    }

    fn evaluate_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value> {
        let object_val: Value = self.evaluate(object)?;

        match object_val {
            Value::Instance(instance) => {
                let value: Value = self.evaluate(value)?;

                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), value.clone());

                Ok(value)
            }

            _ => Err(LoxError::runtime(
                name.line,
                name.column,
                "Only instances have fields",
            )),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let (depth, slot): (usize, usize) = self
            .locals
            .get(&id)
            .copied()
            .ok_or_else(|| undefined_variable(keyword))?;

        let superclass: Rc<Class> = match Environment::get_at(&self.environment, depth, slot) {
            Value::Class(class) => class,

            _ => {
                return Err(LoxError::runtime(
                    keyword.line,
                    keyword.column,
                    "'super' does not name a class",
                ))
            }
        };

        // The instance lives one scope inside the `super` frame.
        let instance: Value = Environment::get_at(&self.environment, depth - 1, 0);

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),

            None => Err(LoxError::runtime(
                method.line,
                method.column,
                format!("Undefined property '{}'", method.lexeme),
            )),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(
        name.line,
        name.column,
        format!("Undefined variable '{}'", name.lexeme),
    )
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let millis: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_millis() as f64;

    Ok(Value::Number(millis))
}
