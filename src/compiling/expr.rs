//! Expression code generation
//!
//!     Every [Expr] becomes an [Eval] closure. Filters and tests are looked up while
//!     compiling, so a template naming an unknown one fails to compile instead of failing
//!     on first render. `and`/`or` short-circuit and return one of their operands, and
//!     chained comparisons evaluate each operand once.

use std::sync::Arc;

use super::codegen::Codegen;
use super::frame::{EscapeMode, FrameId, Resolution};
use super::program::Eval;
use crate::error::{Error, Result};
use crate::parsing::ast::UnaryOp;
use crate::parsing::{CallArgs, Expr, ExprKind};
use crate::runtime::ops;
use crate::runtime::state::BlockReference;
use crate::runtime::{Args, State, UndefinedHint, Value, ValueMap};

/// Applies a filter chain to a value captured from block output.
pub type Apply = Arc<dyn Fn(&mut State<'_>, Value) -> Result<Value> + Send + Sync>;

type ArgsEval = Arc<dyn Fn(&mut State<'_>) -> Result<Args> + Send + Sync>;

fn many(evals: &[Eval], state: &mut State<'_>) -> Result<Vec<Value>> {
    evals.iter().map(|eval| eval(state)).collect()
}

fn optional_int(value: Value) -> Result<Option<i64>> {
    match value {
        Value::None => Ok(None),
        Value::Undefined(u) => {
            u.check_operate()?;
            Ok(None)
        }
        other => other.as_i64().map(Some).ok_or_else(|| {
            Error::invalid_operation(format!(
                "slice indices must be integers or None, not '{}'",
                other.type_name()
            ))
        }),
    }
}

impl Codegen<'_> {
    pub(super) fn expr(&mut self, expr: &Expr, frame: FrameId) -> Result<Eval> {
        let line = expr.line;
        Ok(match &expr.kind {
            ExprKind::TemplateData(text) => {
                let text = text.clone();
                Arc::new(move |state| Ok(Value::from_output(text.clone(), state.autoescape())))
            }
            ExprKind::Const(value) => {
                let value = value.clone();
                Arc::new(move |_| Ok(value.clone()))
            }
            ExprKind::Name(name) => self.name_lookup(name, frame),
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                let items = self.exprs(items, frame)?;
                Arc::new(move |state| Ok(Value::from(many(&items, state)?)))
            }
            ExprKind::Dict(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| Ok((self.expr(k, frame)?, self.expr(v, frame)?)))
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(move |state| {
                    let mut map = ValueMap::new();
                    for (key, value) in &pairs {
                        let key = key(state)?;
                        map.insert(key, value(state)?);
                    }
                    Ok(Value::from(map))
                })
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.expr(operand, frame)?;
                let op = *op;
                Arc::new(move |state| {
                    let value = operand(state)?;
                    match op {
                        UnaryOp::Not => Ok(Value::from(!value.is_true()?)),
                        UnaryOp::Neg => ops::neg(&value),
                        UnaryOp::Pos => ops::pos(&value),
                    }
                })
            }
            ExprKind::Binary { op, left, right } => {
                let (left, right) = (self.expr(left, frame)?, self.expr(right, frame)?);
                let op = *op;
                Arc::new(move |state| {
                    let a = left(state)?;
                    let b = right(state)?;
                    ops::binary(op, &a, &b, state.autoescape())
                })
            }
            ExprKind::And(left, right) => {
                let (left, right) = (self.expr(left, frame)?, self.expr(right, frame)?);
                Arc::new(move |state| {
                    let a = left(state)?;
                    if a.is_true()? {
                        right(state)
                    } else {
                        Ok(a)
                    }
                })
            }
            ExprKind::Or(left, right) => {
                let (left, right) = (self.expr(left, frame)?, self.expr(right, frame)?);
                Arc::new(move |state| {
                    let a = left(state)?;
                    if a.is_true()? {
                        Ok(a)
                    } else {
                        right(state)
                    }
                })
            }
            ExprKind::Concat(items) => {
                let items = self.exprs(items, frame)?;
                Arc::new(move |state| {
                    let autoescape = state.autoescape();
                    let mut acc = Value::from("");
                    for item in &items {
                        let value = item(state)?;
                        acc = ops::concat(&acc, &value, autoescape)?;
                    }
                    Ok(acc)
                })
            }
            ExprKind::Compare { expr, ops: chain } => {
                let first = self.expr(expr, frame)?;
                let chain = chain
                    .iter()
                    .map(|(op, e)| Ok((*op, self.expr(e, frame)?)))
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(move |state| {
                    let mut left = first(state)?;
                    for (op, right) in &chain {
                        let right = right(state)?;
                        if !ops::compare(*op, &left, &right)? {
                            return Ok(Value::from(false));
                        }
                        left = right;
                    }
                    Ok(Value::from(true))
                })
            }
            ExprKind::Cond {
                test,
                then,
                otherwise,
            } => {
                let test = self.expr(test, frame)?;
                let then = self.expr(then, frame)?;
                let otherwise = otherwise.as_ref().map(|e| self.expr(e, frame)).transpose()?;
                Arc::new(move |state| {
                    if test(state)?.is_true()? {
                        return then(state);
                    }
                    match &otherwise {
                        Some(otherwise) => otherwise(state),
                        None => Ok(Value::undefined(
                            UndefinedHint::Message(format!(
                                "the inline if-expression on line {} evaluated to false and no else section was defined.",
                                line
                            )),
                            state.undefined_policy(),
                        )),
                    }
                })
            }
            ExprKind::GetAttr { expr, attr } => {
                let target = self.expr(expr, frame)?;
                let attr = attr.clone();
                Arc::new(move |state| {
                    let value = target(state)?;
                    ops::get_attr(&value, &attr, state.undefined_policy())
                })
            }
            ExprKind::GetItem { expr, index } => {
                let (target, index) = (self.expr(expr, frame)?, self.expr(index, frame)?);
                Arc::new(move |state| {
                    let value = target(state)?;
                    let key = index(state)?;
                    ops::get_item(&value, &key, state.undefined_policy())
                })
            }
            ExprKind::Slice {
                expr,
                start,
                stop,
                step,
            } => {
                let target = self.expr(expr, frame)?;
                let mut bound = |e: &Option<Box<Expr>>| e.as_ref().map(|e| self.expr(e, frame)).transpose();
                let (start, stop, step) = (bound(start)?, bound(stop)?, bound(step)?);
                Arc::new(move |state| {
                    let value = target(state)?;
                    let mut ints = [None, None, None];
                    for (slot, eval) in ints.iter_mut().zip([&start, &stop, &step]) {
                        if let Some(eval) = eval {
                            *slot = optional_int(eval(state)?)?;
                        }
                    }
                    ops::slice(&value, ints[0], ints[1], ints[2])
                })
            }
            ExprKind::Call { callee, args } => self.call(callee, args, frame, None)?,
            ExprKind::Filter { input, name, args } => {
                let Some(input) = input else {
                    return Err(Error::assertion(
                        format!("filter '{}' has nothing to filter", name),
                        line,
                    ));
                };
                let input = self.expr(input, frame)?;
                let apply = self.filter_call(name, args, frame, line)?;
                Arc::new(move |state| {
                    let value = input(state)?;
                    apply(state, value)
                })
            }
            ExprKind::Test { expr, name, args } => {
                let test = self
                    .env
                    .test(name)
                    .ok_or_else(|| Error::assertion(format!("No test named '{}'.", name), line))?;
                let input = self.expr(expr, frame)?;
                let args = self.call_args(args, frame)?;
                Arc::new(move |state| {
                    let value = input(state)?;
                    let args = args(state)?;
                    Ok(Value::from(test(state, &value, &args)?))
                })
            }
            ExprKind::ExtensionCall {
                extension,
                method,
                args,
            } => {
                let (extension, method) = (extension.clone(), method.clone());
                let args = self.call_args(args, frame)?;
                Arc::new(move |state| {
                    let args = args(state)?;
                    let ext = state.env().extension(&extension).ok_or_else(|| {
                        Error::runtime(format!("extension '{}' is not registered", extension))
                    })?;
                    ext.call_method(state, &method, args)
                })
            }
            ExprKind::ContextReference { with_locals } => {
                let with_locals = *with_locals;
                Arc::new(move |state| Ok(state.context_value(with_locals)))
            }
            ExprKind::MarkSafe(inner) => {
                let inner = self.expr(inner, frame)?;
                Arc::new(move |state| mark_safe(inner(state)?))
            }
            ExprKind::MarkSafeIfAutoescape(inner) => {
                let inner = self.expr(inner, frame)?;
                Arc::new(move |state| {
                    let value = inner(state)?;
                    if state.autoescape() {
                        mark_safe(value)
                    } else {
                        Ok(value)
                    }
                })
            }
        })
    }

    fn exprs(&mut self, exprs: &[Expr], frame: FrameId) -> Result<Vec<Eval>> {
        exprs.iter().map(|e| self.expr(e, frame)).collect()
    }

    fn name_lookup(&self, name: &str, frame: FrameId) -> Eval {
        let resolution = self.frames.resolve(frame, name);
        let name = name.to_string();
        match resolution {
            Resolution::Scope => Arc::new(move |state| Ok(state.lookup(&name))),
            Resolution::Context if name == "super" && self.block.is_some() => {
                Arc::new(|_| Ok(Value::from_function("super", |state, _| state.render_super())))
            }
            Resolution::Context if name == "self" => {
                Arc::new(|state| Ok(state.context().get("self").unwrap_or_else(|| Value::from_object(BlockReference))))
            }
            Resolution::Context => Arc::new(move |state| Ok(state.lookup_context(&name))),
        }
    }

    /// A call expression. `caller` is passed as a keyword argument by `{% call %}` blocks.
    pub(super) fn call(
        &mut self,
        callee: &Expr,
        args: &CallArgs,
        frame: FrameId,
        caller: Option<Eval>,
    ) -> Result<Eval> {
        let args = self.call_args(args, frame)?;
        let mode = self.escape_mode(frame);
        let with_caller = move |state: &mut State<'_>| -> Result<Args> {
            let mut args = args(state)?;
            if let Some(caller) = &caller {
                let value = caller(state)?;
                args.kwargs.insert("caller".to_string(), value);
            }
            Ok(args)
        };
        if let ExprKind::GetAttr { expr, attr } = &callee.kind {
            let target = self.expr(expr, frame)?;
            let attr = attr.clone();
            return Ok(Arc::new(move |state| {
                let value = target(state)?;
                let args = with_caller(state)?;
                at_call_site(state, mode, |state| ops::call_method(state, &value, &attr, args))
            }));
        }
        let callee = self.expr(callee, frame)?;
        Ok(Arc::new(move |state| {
            let value = callee(state)?;
            let args = with_caller(state)?;
            at_call_site(state, mode, |state| value.call(state, args))
        }))
    }

    fn call_args(&mut self, args: &CallArgs, frame: FrameId) -> Result<ArgsEval> {
        let positional = self.exprs(&args.args, frame)?;
        let kwargs = args
            .kwargs
            .iter()
            .map(|(name, e)| Ok((name.clone(), self.expr(e, frame)?)))
            .collect::<Result<Vec<_>>>()?;
        let dyn_args = args.dyn_args.as_ref().map(|e| self.expr(e, frame)).transpose()?;
        let dyn_kwargs = args.dyn_kwargs.as_ref().map(|e| self.expr(e, frame)).transpose()?;
        Ok(Arc::new(move |state| {
            let mut out = Args::new(many(&positional, state)?);
            if let Some(dyn_args) = &dyn_args {
                out.positional.extend(dyn_args(state)?.try_iter()?);
            }
            for (name, eval) in &kwargs {
                let value = eval(state)?;
                out.kwargs.insert(name.clone(), value);
            }
            if let Some(dyn_kwargs) = &dyn_kwargs {
                let extra = dyn_kwargs(state)?;
                let map = extra.as_map().ok_or_else(|| {
                    Error::invalid_operation(format!(
                        "argument after ** must be a mapping, not '{}'",
                        extra.type_name()
                    ))
                })?;
                for (key, value) in map.iter() {
                    out.kwargs.insert(key.to_string(), value.clone());
                }
            }
            Ok(out)
        }))
    }

    fn filter_call(&mut self, name: &str, args: &CallArgs, frame: FrameId, line: usize) -> Result<Apply> {
        let filter = self
            .env
            .filter(name)
            .ok_or_else(|| Error::assertion(format!("No filter named '{}'.", name), line))?;
        let args = self.call_args(args, frame)?;
        Ok(Arc::new(move |state, value| {
            let args = args(state)?;
            filter(state, value, &args)
        }))
    }

    /// Compile `expr`, a filter chain whose innermost input is the captured block output.
    pub(super) fn filter_chain(&mut self, expr: &Expr, frame: FrameId) -> Result<Apply> {
        let ExprKind::Filter { input, name, args } = &expr.kind else {
            return Err(Error::assertion("expected a filter", expr.line));
        };
        let inner = input.as_ref().map(|e| self.filter_chain(e, frame)).transpose()?;
        let apply = self.filter_call(name, args, frame, expr.line)?;
        Ok(Arc::new(move |state, value| {
            let value = match &inner {
                Some(inner) => inner(state, value)?,
                None => value,
            };
            apply(state, value)
        }))
    }
}

fn mark_safe(value: Value) -> Result<Value> {
    if value.is_safe() {
        return Ok(value);
    }
    Ok(Value::from_safe_string(value.to_output()?))
}

/// Run a call with the runtime escaping flag matching the call site, so callees such as
/// macros see the caller's mode.
fn at_call_site<T>(state: &mut State<'_>, mode: EscapeMode, f: impl FnOnce(&mut State<'_>) -> T) -> T {
    let Some(on) = mode.fixed() else {
        return f(state);
    };
    let saved = state.set_autoescape(on);
    let result = f(state);
    state.set_autoescape(saved);
    result
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use serde_json::json;

    fn render(source: &str) -> String {
        Environment::new()
            .template_from_str(source)
            .unwrap()
            .render(json!({"items": [1, 2, 3], "user": {"name": "ann"}}))
            .unwrap()
    }

    #[rstest(
        source,
        expected,
        case("{{ 1 + 2 * 3 }}", "7"),
        case("{{ 7 // 2 }}|{{ 7 / 2 }}", "3|3.5"),
        case("{{ 1 < 2 < 3 }}|{{ 3 > 2 > 2 }}", "True|False"),
        case("{{ 0 or 'x' }}|{{ 1 and 'y' }}", "x|y"),
        case("{{ 'a' ~ 1 ~ none }}", "a1None"),
        case("{{ items[1:] }}|{{ items[::-1] }}", "[2, 3]|[3, 2, 1]"),
        case("{{ user.name }}{{ user['name'] }}", "annann"),
        case("{{ 'yes' if items else 'no' }}", "yes"),
        case("{{ items|length is even }}", "False"),
        case("{{ dict(a=1, **{'b': 2}) }}", "{'a': 1, 'b': 2}"),
        case("{{ 'x' if false }}", "")
    )]
    fn test_expressions(source: &str, expected: &str) {
        assert_eq!(render(source), expected);
    }

    #[test]
    fn test_unknown_filter_fails_at_compile_time() {
        let err = Environment::new()
            .template_from_str("\n{{ x|nope }}")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssertionError);
        assert_eq!(err.message(), "No filter named 'nope'.");
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_unknown_test_fails_at_compile_time() {
        let err = Environment::new()
            .template_from_str("{{ x is nope }}")
            .unwrap_err();
        assert_eq!(err.message(), "No test named 'nope'.");
    }
}
