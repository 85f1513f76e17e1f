//! Per-render state
//!
//!     A [State] is what compiled code runs against. It holds:
//!
//!         - the [Context]: variables passed by the caller plus everything assigned at the
//!           top level of the template (those are also the template's exports);
//!         - a stack of local scopes pushed by loops, `with`, macros and blocks. Macro and
//!           block scopes are barriers: lookups do not see past them;
//!         - the runtime autoescape flag, which `{% autoescape %}` toggles and volatile
//!           output sites consult;
//!         - the block chains for inheritance: for every block name, the implementations
//!           from the most derived template to the root.
//!
//!     Variable lookup goes local scopes (up to the nearest barrier), then the context,
//!     then the environment globals. Anything else is an undefined value.
//!
//! Inheritance
//!
//!     Rendering a template first registers its blocks, then runs its top-level code. An
//!     `{% extends %}` statement only records the parent; once the child's top level is
//!     done the parent's blocks are appended to the chains and the parent's top level runs
//!     with the same context. Repeat until no parent is recorded. A block site always
//!     renders the head of its chain; `super()` renders the next link.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::trace;

use super::undefined::{UndefinedHint, UndefinedPolicy};
use super::value::{Object, Value, ValueMap};
use crate::compiling::{CompiledBlock, CompiledTemplate};
use crate::parsing::Target;
use crate::environment::Environment;
use crate::error::{Error, ErrorKind, Result};

/// Nesting limit for includes, imports and macro calls.
pub const MAX_RECURSION: usize = 128;

/// Longest `extends` chain followed before giving up.
pub const MAX_INHERITANCE: usize = 64;

/// Template-level variables. Shared between a template's top level and the macros it
/// defines, so a macro imported elsewhere still resolves names against its own module.
#[derive(Debug, Default)]
pub struct Context {
    vars: Mutex<IndexMap<String, Value>>,
    exported: Mutex<Vec<String>>,
}

impl Context {
    pub fn new(vars: IndexMap<String, Value>) -> Self {
        Context {
            vars: Mutex::new(vars),
            exported: Mutex::new(Vec::new()),
        }
    }

    /// Build a context from a map value; non-string keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Map(map) => Ok(Context::new(
                map.iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
                    .collect(),
            )),
            Value::None => Ok(Context::default()),
            other => Err(Error::new(
                ErrorKind::BadSerialization,
                format!("render context must be a mapping, not '{}'", other.type_name()),
            )),
        }
    }

    fn lock_vars(&self) -> MutexGuard<'_, IndexMap<String, Value>> {
        self.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_exported(&self) -> MutexGuard<'_, Vec<String>> {
        self.exported.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock_vars().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.lock_vars().insert(name.to_string(), value);
    }

    /// Set a variable and list it in the exports, unless it is private (`_name`).
    pub fn set_exported(&self, name: &str, value: Value) {
        self.set(name, value);
        if !name.starts_with('_') {
            let mut exported = self.lock_exported();
            if !exported.iter().any(|n| n == name) {
                exported.push(name.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.lock_vars().clone()
    }

    /// Exported names with their current values.
    pub fn exports(&self) -> IndexMap<String, Value> {
        let vars = self.lock_vars();
        self.lock_exported()
            .iter()
            .filter_map(|name| vars.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}

#[derive(Debug, Default)]
struct Scope {
    vars: IndexMap<String, Value>,
    barrier: bool,
}

pub struct State<'env> {
    env: &'env Environment,
    name: Arc<str>,
    ctx: Arc<Context>,
    scopes: Vec<Scope>,
    autoescape: bool,
    blocks: IndexMap<String, Vec<Arc<CompiledBlock>>>,
    block_stack: Vec<(String, usize)>,
    parent: Option<Arc<CompiledTemplate>>,
    depth: usize,
}

impl fmt::Debug for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("scopes", &self.scopes.len())
            .field("autoescape", &self.autoescape)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<'env> State<'env> {
    /// A fresh state for rendering `template` against `ctx`.
    pub fn new(env: &'env Environment, template: &CompiledTemplate, ctx: Arc<Context>) -> Self {
        State {
            env,
            name: template.name.clone(),
            ctx,
            scopes: Vec::new(),
            autoescape: template.autoescape,
            blocks: IndexMap::new(),
            block_stack: Vec::new(),
            parent: None,
            depth: 0,
        }
    }

    pub fn env(&self) -> &'env Environment {
        self.env
    }

    /// Name of the template whose code is executing.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn autoescape(&self) -> bool {
        self.autoescape
    }

    /// Change the runtime escaping flag, returning the previous value.
    pub fn set_autoescape(&mut self, on: bool) -> bool {
        mem::replace(&mut self.autoescape, on)
    }

    pub fn undefined_policy(&self) -> UndefinedPolicy {
        self.env.undefined_policy()
    }

    /// The undefined value for a missing variable.
    pub fn undefined(&self, name: &str) -> Value {
        Value::undefined(UndefinedHint::Name(name.to_string()), self.undefined_policy())
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Look a name up through the local scopes, then the context and globals.
    pub fn lookup(&self, name: &str) -> Value {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.vars.get(name) {
                return value.clone();
            }
            if scope.barrier {
                break;
            }
        }
        self.lookup_context(name)
    }

    /// Look a name up in the context and globals only.
    pub fn lookup_context(&self, name: &str) -> Value {
        self.ctx
            .get(name)
            .or_else(|| self.env.global(name))
            .unwrap_or_else(|| self.undefined(name))
    }

    pub fn push_scope(&mut self, vars: IndexMap<String, Value>, barrier: bool) {
        self.scopes.push(Scope { vars, barrier });
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Run `f` inside a new scope, popping it afterwards even on error.
    pub fn with_scope<T>(
        &mut self,
        vars: IndexMap<String, Value>,
        barrier: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.push_scope(vars, barrier);
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Assign in the innermost local scope.
    pub fn set_local(&mut self, name: &str, value: Value) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.vars.insert(name.to_string(), value);
            }
            None => self.ctx.set(name, value),
        }
    }

    /// Assign at template level: visible to blocks and exported to importers.
    pub fn set_context(&mut self, name: &str, value: Value) {
        self.ctx.set_exported(name, value);
    }

    /// Bind `value` to an assignment target, unpacking tuples. Top-level assignments go
    /// to the context, everything else to the innermost scope.
    pub fn assign(&mut self, target: &Target, value: Value, top_level: bool) -> Result<()> {
        match target {
            Target::Name(name) => {
                if top_level {
                    self.set_context(name, value);
                } else {
                    self.set_local(name, value);
                }
                Ok(())
            }
            Target::Tuple(targets) => {
                let items = value.try_iter()?;
                if items.len() < targets.len() {
                    return Err(Error::runtime(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                if items.len() > targets.len() {
                    return Err(Error::runtime(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, top_level)?;
                }
                Ok(())
            }
            Target::Attr { name, attr } => match self.lookup(name) {
                Value::Object(obj) if obj.type_name() == "namespace" => obj.set_attr(attr, value),
                Value::Undefined(u) => Err(u.error()),
                _ => Err(Error::runtime("cannot assign attribute on non-namespace object")),
            },
        }
    }

    /// The locals visible from here, innermost binding winning.
    pub fn visible_locals(&self) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        for scope in self.scopes.iter().rev() {
            for (name, value) in &scope.vars {
                out.entry(name.clone()).or_insert_with(|| value.clone());
            }
            if scope.barrier {
                break;
            }
        }
        out
    }

    /// A copy of the context with the visible locals folded in.
    pub fn derived_context(&self) -> Arc<Context> {
        let mut vars = self.ctx.snapshot();
        for (name, value) in self.visible_locals() {
            vars.insert(name, value);
        }
        Arc::new(Context::new(vars))
    }

    /// Context variables (and optionally locals) as a map value.
    pub fn context_value(&self, with_locals: bool) -> Value {
        let mut map = ValueMap::new();
        for (name, value) in self.ctx.snapshot() {
            map.insert(Value::from(name), value);
        }
        if with_locals {
            for (name, value) in self.visible_locals() {
                map.insert(Value::from(name), value);
            }
        }
        Value::from(map)
    }

    /// Run `f` with another context and template name installed, e.g. for macros
    /// defined in an imported module.
    pub(crate) fn with_context<T>(
        &mut self,
        ctx: Arc<Context>,
        name: Arc<str>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved_ctx = mem::replace(&mut self.ctx, ctx);
        let saved_name = mem::replace(&mut self.name, name);
        let result = f(self);
        self.ctx = saved_ctx;
        self.name = saved_name;
        result
    }

    /// Count one level of nesting for the duration of `f`.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_RECURSION {
            return Err(Error::runtime(format!(
                "maximum recursion depth of {} exceeded",
                MAX_RECURSION
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Render `template` into `out`, following its `extends` chain.
    pub fn render_template(&mut self, template: &Arc<CompiledTemplate>, out: &mut String) -> Result<()> {
        self.register_blocks(template);
        let saved_name = mem::replace(&mut self.name, template.name.clone());
        let result = self.run_with_parents(template, out);
        self.name = saved_name;
        result
    }

    fn register_blocks(&mut self, template: &CompiledTemplate) {
        for (name, block) in &template.blocks {
            self.blocks
                .entry(name.clone())
                .or_default()
                .push(block.clone());
        }
    }

    fn run_with_parents(&mut self, template: &Arc<CompiledTemplate>, out: &mut String) -> Result<()> {
        (template.root)(self, out)?;
        let mut links = 0;
        while let Some(parent) = self.parent.take() {
            links += 1;
            if links > MAX_INHERITANCE {
                return Err(Error::runtime(format!(
                    "template inheritance deeper than {} levels",
                    MAX_INHERITANCE
                )));
            }
            trace!(child = %self.name, parent = %parent.name, "following extends");
            self.register_blocks(&parent);
            self.name = parent.name.clone();
            (parent.root)(self, out)?;
        }
        Ok(())
    }

    /// Record the parent template named by `{% extends %}`.
    pub(crate) fn extend(&mut self, target: &Value) -> Result<()> {
        if self.parent.is_some() {
            return Err(Error::new(ErrorKind::AssertionError, "extended multiple times"));
        }
        let name = template_name(target)?;
        self.parent = Some(self.env.compiled(&name)?);
        Ok(())
    }

    /// Render the most derived implementation of block `name`.
    pub(crate) fn render_block(&mut self, name: &str, out: &mut String) -> Result<()> {
        let block = self
            .blocks
            .get(name)
            .and_then(|chain| chain.first())
            .cloned()
            .ok_or_else(|| Error::runtime(format!("no block named '{}'", name)))?;
        if block.required {
            return Err(Error::runtime(format!("Required block '{}' not found", name)));
        }
        self.run_block(name, 0, &block, out)
    }

    fn run_block(&mut self, name: &str, index: usize, block: &Arc<CompiledBlock>, out: &mut String) -> Result<()> {
        self.block_stack.push((name.to_string(), index));
        let saved_name = mem::replace(&mut self.name, block.template.clone());
        let result = self.with_scope(IndexMap::new(), true, |state| (block.body)(state, out));
        self.name = saved_name;
        self.block_stack.pop();
        result.map(|_| ())
    }

    /// `super()`: render the next implementation of the current block.
    pub(crate) fn render_super(&mut self) -> Result<Value> {
        let (name, index) = self
            .block_stack
            .last()
            .cloned()
            .ok_or_else(|| Error::runtime("super() is only available inside blocks"))?;
        let next = self
            .blocks
            .get(&name)
            .and_then(|chain| chain.get(index + 1))
            .cloned()
            .ok_or_else(|| Error::runtime(format!("there is no parent block called '{}'.", name)))?;
        let mut buf = String::new();
        self.run_block(&name, index + 1, &next, &mut buf)?;
        Ok(Value::from_output(buf, self.autoescape))
    }

    /// `self.name()`: render a block of this render as a value.
    pub(crate) fn render_block_value(&mut self, name: &str) -> Result<Value> {
        let mut buf = String::new();
        self.render_block(name, &mut buf)?;
        Ok(Value::from_output(buf, self.autoescape))
    }

    fn child_context(&self, with_context: bool) -> Arc<Context> {
        if with_context {
            self.derived_context()
        } else {
            Arc::new(Context::default())
        }
    }

    /// `{% include %}`: render another template into `out` with its own state.
    pub(crate) fn include(
        &mut self,
        target: &Value,
        with_context: bool,
        ignore_missing: bool,
        out: &mut String,
    ) -> Result<()> {
        let candidates = match target {
            Value::Seq(list) => list
                .snapshot()
                .iter()
                .map(template_name)
                .collect::<Result<Vec<_>>>()?,
            other => vec![template_name(other)?],
        };
        let mut found = None;
        for name in &candidates {
            match self.env.compiled(name) {
                Ok(template) => {
                    found = Some(template);
                    break;
                }
                Err(err) if err.kind() == ErrorKind::TemplateNotFound => continue,
                Err(err) => return Err(err),
            }
        }
        let Some(template) = found else {
            if ignore_missing {
                return Ok(());
            }
            return Err(match candidates.as_slice() {
                [single] => Error::not_found(single),
                many => Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("none of the templates given were found: {}", many.join(", ")),
                ),
            });
        };
        let mut sub = self.sub_state(&template, self.child_context(with_context))?;
        sub.render_template(&template, out)
    }

    /// `{% import %}`: render a template for its exports and wrap them in a module.
    pub(crate) fn import(&mut self, target: &Value, with_context: bool) -> Result<Value> {
        let name = template_name(target)?;
        let template = self.env.compiled(&name)?;
        let ctx = self.child_context(with_context);
        let mut sub = self.sub_state(&template, ctx.clone())?;
        let mut body = String::new();
        sub.render_template(&template, &mut body)?;
        Ok(Value::from_object(Module {
            name: template.name.clone(),
            exports: ctx.exports(),
            body,
        }))
    }

    fn sub_state(&self, template: &CompiledTemplate, ctx: Arc<Context>) -> Result<State<'env>> {
        if self.depth >= MAX_RECURSION {
            return Err(Error::runtime(format!(
                "maximum recursion depth of {} exceeded",
                MAX_RECURSION
            )));
        }
        let mut sub = State::new(self.env, template, ctx);
        sub.depth = self.depth + 1;
        Ok(sub)
    }
}

/// Template names come from strings only.
fn template_name(value: &Value) -> Result<String> {
    match value {
        Value::String(name, _) => Ok(name.to_string()),
        Value::Undefined(u) => Err(u.error()),
        other => Err(Error::runtime(format!(
            "template name must be a string, not '{}'",
            other.type_name()
        ))),
    }
}

/// An imported template: its exported names as attributes, its output when printed.
#[derive(Debug)]
pub struct Module {
    name: Arc<str>,
    exports: IndexMap<String, Value>,
    body: String,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exports(&self) -> &IndexMap<String, Value> {
        &self.exports
    }
}

impl Object for Module {
    fn type_name(&self) -> &str {
        "module"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.exports.get(name).cloned()
    }

    fn iterate(&self) -> Option<Vec<Value>> {
        Some(self.exports.keys().map(|k| Value::from(k.as_str())).collect())
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

/// `self` inside a template: every block of the current render as a callable.
#[derive(Debug)]
pub struct BlockReference;

impl Object for BlockReference {
    fn type_name(&self) -> &str {
        "TemplateReference"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        let block = name.to_string();
        Some(Value::from_function(name, move |state, _args| {
            state.render_block_value(&block)
        }))
    }
}
