use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use log::trace;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to an environment.  Closures hold one of these, which keeps
/// their defining scope alive for as long as they are.
pub type EnvRef<'a> = Rc<RefCell<Environment<'a>>>;

/// One lexical scope at runtime: name → value plus the enclosing scope.
#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<EnvRef<'a>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap in a fresh shared handle.
    pub fn into_ref(self) -> EnvRef<'a> {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef<'a>> {
        self.enclosing.clone()
    }

    /// Bind `name` in this scope, replacing any previous binding.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        trace!("define '{}' = {}", name, value);
        self.values.insert(name, value);
    }

    /// Look `name` up here, then outward.
    pub fn get(&self, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Assign to an existing binding, searching outward.
    pub fn assign(&mut self, name: &Token<'a>, value: Value<'a>) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Value bound to `name` in exactly this scope, if any.
    pub fn get_here(&self, name: &str) -> Option<Value<'a>> {
        self.values.get(name).cloned()
    }
}

/// Walk `distance` enclosing links up from `env`.
///
/// Returns `None` if the chain is shorter than the resolver expected.
pub fn ancestor<'a>(env: &EnvRef<'a>, distance: usize) -> Option<EnvRef<'a>> {
    let mut current: EnvRef<'a> = Rc::clone(env);

    for _ in 0..distance {
        let next = current.borrow().enclosing()?;
        current = next;
    }

    Some(current)
}

/// Read `name` from the scope exactly `distance` levels up.
pub fn get_at<'a>(env: &EnvRef<'a>, distance: usize, name: &Token<'a>) -> Result<Value<'a>> {
    ancestor(env, distance)
        .and_then(|scope| {
            let value = scope.borrow().get_here(name.lexeme);
            value
        })
        .ok_or_else(|| undefined(name))
}

/// Read an implicit binding (`this`, `super`) exactly `distance` levels up.
pub fn get_implicit_at<'a>(env: &EnvRef<'a>, distance: usize, name: &str) -> Option<Value<'a>> {
    ancestor(env, distance).and_then(|scope| {
        let value = scope.borrow().get_here(name);
        value
    })
}

/// Assign `name` in the scope exactly `distance` levels up.
pub fn assign_at<'a>(
    env: &EnvRef<'a>,
    distance: usize,
    name: &Token<'a>,
    value: Value<'a>,
) -> Result<()> {
    let scope = ancestor(env, distance).ok_or_else(|| undefined(name))?;
    let mut scope = scope.borrow_mut();

    match scope.values.get_mut(name.lexeme) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(undefined(name)),
    }
}

fn undefined(name: &Token<'_>) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}
