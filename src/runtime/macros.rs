//! Macro objects
//!
//!     `{% macro %}` compiles to a [Macro] value bound in the defining scope. Calling it
//!     binds arguments to parameters, runs the body into a fresh buffer and returns the
//!     output (safe when autoescaping is on).
//!
//! Argument Binding
//!
//!     Positional arguments fill parameters in order. Parameters left over are looked up
//!     among the keyword arguments, then fall back to their default expression, evaluated
//!     inside the macro so defaults may refer to earlier parameters. A parameter with
//!     neither stays undefined.
//!
//!     Extra positional arguments go to `varargs` and extra keyword arguments to `kwargs`,
//!     but only when the body reads those names; otherwise they are errors. The same goes
//!     for `caller`, which `{% call %}` passes as a keyword argument.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ops::kwargs_to_map;
use super::state::{Context, State};
use super::undefined::UndefinedHint;
use super::value::{Args, Object, Value};
use crate::compiling::{Eval, Exec};
use crate::error::{Error, Result};

pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub defaults: Vec<Option<Eval>>,
    pub body: Exec,
    pub catch_kwargs: bool,
    pub catch_varargs: bool,
    pub caller: bool,
    /// Enclosing locals the body reads, captured at definition.
    pub closure: IndexMap<String, Value>,
    /// The context of the defining template.
    pub ctx: Arc<Context>,
    pub template: Arc<str>,
}

impl fmt::Debug for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Macro")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("catch_kwargs", &self.catch_kwargs)
            .field("catch_varargs", &self.catch_varargs)
            .field("caller", &self.caller)
            .finish()
    }
}

impl Macro {
    fn missing(&self, state: &State<'_>, message: String) -> Value {
        Value::undefined(UndefinedHint::Message(message), state.undefined_policy())
    }

    /// Bind `args` to the parameter names. Returns the bound scope and the indices of
    /// parameters still waiting for their default.
    fn bind(&self, state: &State<'_>, args: Args) -> Result<(IndexMap<String, Value>, Vec<usize>)> {
        let Args {
            mut positional,
            mut kwargs,
        } = args;
        if positional.len() > self.params.len() && !self.catch_varargs {
            return Err(Error::runtime(format!(
                "macro '{}' takes not more than {} argument(s)",
                self.name,
                self.params.len()
            )));
        }
        let extra = if positional.len() > self.params.len() {
            positional.split_off(self.params.len())
        } else {
            Vec::new()
        };

        let mut scope = self.closure.clone();
        let mut pending = Vec::new();
        let given = positional.len();
        for (index, name) in self.params.iter().enumerate() {
            if index < given {
                continue;
            }
            match kwargs.shift_remove(name) {
                Some(value) => {
                    scope.insert(name.clone(), value);
                }
                None => pending.push(index),
            }
        }
        for (name, value) in self.params.iter().zip(positional) {
            scope.insert(name.clone(), value);
        }

        if self.caller {
            let caller = kwargs
                .shift_remove("caller")
                .unwrap_or_else(|| self.missing(state, "No caller defined".to_string()));
            scope.insert("caller".to_string(), caller);
        }
        if self.catch_kwargs {
            scope.insert("kwargs".to_string(), kwargs_to_map(kwargs));
        } else if let Some(name) = kwargs.keys().next() {
            return Err(Error::runtime(format!(
                "macro '{}' takes no keyword argument '{}'",
                self.name, name
            )));
        }
        if self.catch_varargs {
            scope.insert("varargs".to_string(), Value::from(extra));
        }
        Ok((scope, pending))
    }

    fn run(&self, state: &mut State<'_>, scope: IndexMap<String, Value>, pending: Vec<usize>) -> Result<String> {
        state.with_scope(scope, true, |state| {
            for index in pending {
                let name = &self.params[index];
                let value = match &self.defaults[index] {
                    Some(default) => default(state)?,
                    None => self.missing(state, format!("parameter '{}' was not provided", name)),
                };
                state.set_local(name, value);
            }
            let mut buf = String::new();
            (self.body)(state, &mut buf)?;
            Ok(buf)
        })
    }
}

impl Object for Macro {
    fn type_name(&self) -> &str {
        "Macro"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        Some(match name {
            "name" => Value::from(self.name.as_str()),
            "arguments" => Value::from(
                self.params
                    .iter()
                    .map(|p| Value::from(p.as_str()))
                    .collect::<Vec<_>>(),
            ),
            "catch_kwargs" => Value::from(self.catch_kwargs),
            "catch_varargs" => Value::from(self.catch_varargs),
            "caller" => Value::from(self.caller),
            _ => return None,
        })
    }

    /// The result is markup when escaping is on at the call site.
    fn call(&self, state: &mut State<'_>, args: Args) -> Result<Value> {
        let safe = state.autoescape();
        let (scope, pending) = self.bind(state, args)?;
        let buf = state.nested(|state| {
            state.with_context(self.ctx.clone(), self.template.clone(), |state| {
                self.run(state, scope, pending)
            })
        })?;
        Ok(Value::from_output(buf, safe))
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Macro '{}'>", self.name)
    }
}
