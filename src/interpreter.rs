//! Tree‑walking evaluator.
//!
//! The interpreter owns the global environment, the current environment, the
//! resolver's binding table and the sink `print` writes to.  Statements
//! complete with a [`Flow`]: `return` is carried upward as
//! `Flow::Return(value)` until the enclosing call consumes it, and is never
//! confused with a runtime error.

use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info, trace};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{self, EnvRef, Environment};
use crate::error::{LoxError, Reporter, Result};
use crate::resolver::Bindings;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<'a> {
    /// Fell off the end; carry on with the next statement.
    Normal,

    /// A `return` is unwinding to the nearest call.
    Return(Value<'a>),
}

pub struct Interpreter<'a, W: Write> {
    globals: EnvRef<'a>,
    environment: EnvRef<'a>,
    locals: Bindings,
    out: W,
}

/// `clock()`: seconds since the Unix epoch.
fn clock<'a>(_args: &[Value<'a>]) -> std::result::Result<Value<'a>, String> {
    let millis = Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}

impl<'a, W: Write> Interpreter<'a, W> {
    /// Creates an interpreter printing to `out`, with native functions such
    /// as `clock` defined as globals.
    pub fn new(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            }),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Bindings::new(),
            out,
        }
    }

    /// Add resolver output.  Must cover every statement later passed to
    /// [`interpret`](Self::interpret); code fed in several pieces has to be
    /// parsed with [`Parser::with_first_id`](crate::parser::Parser::with_first_id)
    /// so its ids don't clash with earlier entries.
    pub fn resolve(&mut self, bindings: Bindings) {
        self.locals.extend(bindings);
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Interprets a list of statements (a "program"), stopping at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt<'a>]) -> Result<()> {
        info!("Interpreting {} statements", statements.len());

        for stmt in statements {
            // The resolver rejects top-level `return`, so the flow is always Normal.
            self.execute(stmt)?;
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ───────────────────────────── statements ─────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                trace!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, environment.into_ref())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment
                    .borrow_mut()
                    .define(declaration.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                trace!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name, .. } => *name,
                                _ => *name,
                            };
                            return Err(LoxError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                debug!("Defining class '{}'", name.lexeme);

                self.environment.borrow_mut().define(name.lexeme, Value::Nil);

                // Methods of a subclass close over an extra scope holding `super`.
                let enclosing = superclass.as_ref().map(|superclass| {
                    let mut scope = Environment::with_enclosing(Rc::clone(&self.environment));
                    scope.define("super", Value::Class(Rc::clone(superclass)));
                    mem::replace(&mut self.environment, scope.into_ref())
                });

                let methods: HashMap<&'a str, Rc<LoxFunction<'a>>> = methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&self.environment),
                            method.name.lexeme == INITIALIZER,
                        );
                        (method.name.lexeme, Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme, superclass, methods);

                if let Some(enclosing) = enclosing {
                    self.environment = enclosing;
                }

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;

                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` inside `environment`, restoring the current
    /// environment afterwards whether they complete, return or fail.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: EnvRef<'a>,
    ) -> Result<Flow<'a>> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt<'a>]) -> Result<Flow<'a>> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    // ───────────────────────────── expressions ────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                self.evaluate_unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.evaluate_binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let decided = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(*id) {
                    Some(distance) => {
                        environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call_value(callee, paren, values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&self, operator: &Token<'a>, right: Value<'a>) -> Result<Value<'a>> {
        match (&operator.token_type, right) {
            (TokenType::BANG, right) => Ok(Value::Bool(!right.is_truthy())),
            (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
            (TokenType::MINUS, _) => Err(LoxError::runtime(operator, "Operand must be a number.")),
            _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &self,
        operator: &Token<'a>,
        left: Value<'a>,
        right: Value<'a>,
    ) -> Result<Value<'a>> {
        trace!(
            "Binary '{}' on {} and {}",
            operator.lexeme,
            left.type_name(),
            right.type_name()
        );

        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
            TokenType::PLUS => {
                return match (left, right) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                    _ => Err(LoxError::runtime(
                        operator,
                        "Operands must be two numbers or two strings.",
                    )),
                };
            }
            _ => {}
        }

        let (Value::Number(a), Value::Number(b)) = (left, right) else {
            return Err(LoxError::runtime(operator, "Operands must be numbers."));
        };

        match operator.token_type {
            TokenType::MINUS => Ok(Value::Number(a - b)),
            TokenType::STAR => Ok(Value::Number(a * b)),
            TokenType::SLASH => Ok(Value::Number(a / b)),
            TokenType::GREATER => Ok(Value::Bool(a > b)),
            TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
            TokenType::LESS => Ok(Value::Bool(a < b)),
            TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
            _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token<'a>) -> Result<Value<'a>> {
        match self.locals.get(id) {
            Some(distance) => environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the resolver put `super` at `distance` and `this` one
    /// scope closer.
    fn evaluate_super(
        &self,
        id: ExprId,
        keyword: &Token<'a>,
        method: &Token<'a>,
    ) -> Result<Value<'a>> {
        let distance = self
            .locals
            .get(id)
            .ok_or_else(|| LoxError::runtime(keyword, "Can't use 'super' here."))?;

        let Some(Value::Class(superclass)) =
            environment::get_implicit_at(&self.environment, distance, "super")
        else {
            return Err(LoxError::runtime(keyword, "Can't use 'super' here."));
        };

        let Some(Value::Instance(instance)) = distance
            .checked_sub(1)
            .and_then(|d| environment::get_implicit_at(&self.environment, d, "this"))
        else {
            return Err(LoxError::runtime(keyword, "Can't use 'super' here."));
        };

        match superclass.find_method(method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    /// Invoke `callee` after checking that it is callable with this many
    /// arguments.
    fn call_value(
        &mut self,
        callee: Value<'a>,
        paren: &Token<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        let arity = match &callee {
            Value::NativeFunction(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(LoxError::runtime(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };

        if arguments.len() != arity {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    arity,
                    arguments.len()
                ),
            ));
        }

        match callee {
            Value::NativeFunction(native) => native
                .call(&arguments)
                .map_err(|message| LoxError::runtime(paren, message)),
            Value::Function(function) => function.call(self, arguments),
            Value::Class(class) => class.call(self, arguments),
            _ => Err(LoxError::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }
}

/// Execute a resolved program, writing `print` output to `out`.
///
/// A runtime error stops execution and is handed to `reporter`; the return
/// value says whether that happened.
pub fn interpret<'a, W: Write>(
    statements: &[Stmt<'a>],
    bindings: Bindings,
    out: W,
    reporter: &mut dyn Reporter,
) -> bool {
    let mut interpreter = Interpreter::new(out);
    interpreter.resolve(bindings);

    match interpreter.interpret(statements) {
        Ok(()) => false,
        Err(e) => {
            debug!("Runtime error: {}", e);
            reporter.report(e);
            true
        }
    }
}
