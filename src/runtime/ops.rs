//! Operators, attribute access and builtin methods
//!
//!     Each function takes already-evaluated operands. Undefined operands are checked
//!     first so the sentinel's policy decides between an empty result and an error. The
//!     arithmetic follows the expression language: `/` always yields a float, `//` and `%`
//!     floor toward negative infinity, `%` on a string formats it.

use std::sync::Arc;

use indexmap::IndexMap;

use super::markup::{escape, percent_format};
use super::state::State;
use super::undefined::{UndefinedHint, UndefinedPolicy};
use super::value::{Args, StringKind, Value, ValueMap};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

fn check_operands(a: &Value, b: &Value) -> Result<()> {
    for value in [a, b] {
        if let Value::Undefined(u) = value {
            u.check_operate()?;
        }
    }
    Ok(())
}

fn unsupported(op: &str, a: &Value, b: &Value) -> Error {
    Error::invalid_operation(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        a.type_name(),
        b.type_name()
    ))
}

/// Join two strings. The result is safe when autoescaping is active and either side is
/// already safe; the plain side is escaped so nothing is escaped twice.
pub fn join_strings(a: &Value, b: &Value, autoescape: bool) -> Result<Value> {
    if autoescape && (a.is_safe() || b.is_safe()) {
        let mut out = String::new();
        for part in [a, b] {
            if part.is_safe() {
                out.push_str(&part.to_output()?);
            } else {
                out.push_str(&escape(&part.to_output()?));
            }
        }
        return Ok(Value::from_safe_string(out));
    }
    Ok(Value::from(format!("{}{}", a.to_output()?, b.to_output()?)))
}

/// The `~` operator.
pub fn concat(a: &Value, b: &Value, autoescape: bool) -> Result<Value> {
    join_strings(a, b, autoescape)
}

pub fn binary(op: BinOp, a: &Value, b: &Value, autoescape: bool) -> Result<Value> {
    check_operands(a, b)?;
    match op {
        BinOp::Add => add(a, b, autoescape),
        BinOp::Sub => arith(op, a, b, i64::checked_sub, |x, y| x - y),
        BinOp::Mul => mul(a, b),
        BinOp::Div => {
            let (x, y) = floats(op, a, b)?;
            if y == 0.0 {
                return Err(Error::invalid_operation("division by zero"));
            }
            Ok(Value::Float(x / y))
        }
        BinOp::FloorDiv => {
            if let (Value::Int(x), Value::Int(y)) = (a, b) {
                if *y == 0 {
                    return Err(Error::invalid_operation("integer division by zero"));
                }
                let q = x.checked_div(*y).ok_or_else(overflow)?;
                let floored = if x % y != 0 && ((*x < 0) != (*y < 0)) { q - 1 } else { q };
                return Ok(Value::Int(floored));
            }
            let (x, y) = floats(op, a, b)?;
            if y == 0.0 {
                return Err(Error::invalid_operation("float floor division by zero"));
            }
            Ok(Value::Float((x / y).floor()))
        }
        BinOp::Mod => {
            if let Value::String(format, kind) = a {
                let safe = *kind == StringKind::Safe;
                let text = percent_format(format, b, safe)?;
                return Ok(Value::String(Arc::from(text), *kind));
            }
            if let (Value::Int(x), Value::Int(y)) = (a, b) {
                if *y == 0 {
                    return Err(Error::invalid_operation("integer modulo by zero"));
                }
                let r = x.checked_rem(*y).ok_or_else(overflow)?;
                let r = if r != 0 && ((r < 0) != (*y < 0)) { r + y } else { r };
                return Ok(Value::Int(r));
            }
            let (x, y) = floats(op, a, b)?;
            if y == 0.0 {
                return Err(Error::invalid_operation("float modulo"));
            }
            Ok(Value::Float(x - y * (x / y).floor()))
        }
        BinOp::Pow => {
            if let (Value::Int(x), Value::Int(y)) = (a, b) {
                if *y >= 0 {
                    return u32::try_from(*y)
                        .ok()
                        .and_then(|exp| x.checked_pow(exp))
                        .map(Value::Int)
                        .ok_or_else(overflow);
                }
            }
            let (x, y) = floats(op, a, b)?;
            Ok(Value::Float(x.powf(y)))
        }
    }
}

fn floats(op: BinOp, a: &Value, b: &Value) -> Result<(f64, f64)> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() || b.is_number() => Ok((x, y)),
        _ => Err(unsupported(op.symbol(), a, b)),
    }
}

fn arith(
    op: BinOp,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (Some(x), Some(y)) = (int_like(a), int_like(b)) {
        return int_op(x, y).map(Value::Int).ok_or_else(overflow);
    }
    let (x, y) = floats(op, a, b)?;
    Ok(Value::Float(float_op(x, y)))
}

fn overflow() -> Error {
    Error::invalid_operation("integer overflow")
}

fn int_like(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn add(a: &Value, b: &Value, autoescape: bool) -> Result<Value> {
    match (a, b) {
        (Value::String(..), Value::String(..)) => join_strings(a, b, autoescape),
        (Value::Seq(x), Value::Seq(y)) => {
            let mut items = x.snapshot();
            items.extend(y.snapshot());
            Ok(Value::from(items))
        }
        _ => arith(BinOp::Add, a, b, i64::checked_add, |x, y| x + y),
    }
}

fn mul(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::String(s, kind), n) | (n, Value::String(s, kind)) if int_like(n).is_some() => {
            let times = int_like(n).unwrap_or(0).max(0) as usize;
            Ok(Value::String(Arc::from(s.repeat(times)), *kind))
        }
        (Value::Seq(list), n) | (n, Value::Seq(list)) if int_like(n).is_some() => {
            let times = int_like(n).unwrap_or(0).max(0) as usize;
            let items = list.snapshot();
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::from(out))
        }
        _ => arith(BinOp::Mul, a, b, i64::checked_mul, |x, y| x * y),
    }
}

pub fn neg(value: &Value) -> Result<Value> {
    match value {
        Value::Undefined(u) => {
            u.check_operate()?;
            Ok(value.clone())
        }
        Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Error::invalid_operation(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

pub fn pos(value: &Value) -> Result<Value> {
    match value {
        Value::Undefined(u) => {
            u.check_operate()?;
            Ok(value.clone())
        }
        Value::Int(_) | Value::Float(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        other => Err(Error::invalid_operation(format!(
            "bad operand type for unary +: '{}'",
            other.type_name()
        ))),
    }
}

pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool> {
    for value in [a, b] {
        if let Value::Undefined(u) = value {
            if u.policy == UndefinedPolicy::Strict {
                return Err(u.error());
            }
        }
    }
    match op {
        CmpOp::Eq => Ok(a == b),
        CmpOp::Ne => Ok(a != b),
        CmpOp::In => contains(b, a),
        CmpOp::NotIn => contains(b, a).map(|found| !found),
        CmpOp::Lt | CmpOp::Lte | CmpOp::Gt | CmpOp::Gte => {
            let ordering = a.partial_cmp(b).ok_or_else(|| {
                Error::invalid_operation(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                ))
            })?;
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Lte => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Undefined(u) => {
            u.check_iterate()?;
            Ok(false)
        }
        Value::String(haystack, _) => match item {
            Value::String(needle, _) => Ok(haystack.contains(needle.as_ref())),
            other => Err(Error::invalid_operation(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Seq(list) => Ok(list.snapshot().contains(item)),
        Value::Map(map) => Ok(map.contains_key(item)),
        Value::Object(_) => Ok(container.try_iter()?.contains(item)),
        other => Err(Error::invalid_operation(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn missing_attribute(owner: &Value, attr: String, policy: UndefinedPolicy) -> Value {
    Value::undefined(
        UndefinedHint::Attribute {
            owner: format!("{} object", owner.type_name()),
            attr,
        },
        policy,
    )
}

/// `value.name`.
pub fn get_attr(value: &Value, name: &str, policy: UndefinedPolicy) -> Result<Value> {
    if let Value::Undefined(u) = value {
        u.check_attribute()?;
        return Ok(value.clone());
    }
    let found = match value {
        Value::Map(map) => map.get(&Value::from(name)).cloned(),
        Value::Object(obj) => obj.get_attr(name),
        _ => None,
    };
    Ok(found.unwrap_or_else(|| missing_attribute(value, name.to_string(), policy)))
}

/// `value[key]`.
pub fn get_item(value: &Value, key: &Value, policy: UndefinedPolicy) -> Result<Value> {
    if let Value::Undefined(u) = value {
        u.check_attribute()?;
        return Ok(value.clone());
    }
    if let Value::Undefined(u) = key {
        u.check_operate()?;
    }
    Ok(value
        .get_key(key)
        .unwrap_or_else(|| missing_attribute(value, key.to_string(), policy)))
}

/// `value[start:stop:step]` with Python slice semantics.
pub fn slice(
    value: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value> {
    if let Value::Undefined(u) = value {
        u.check_attribute()?;
        return Ok(value.clone());
    }
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Error::invalid_operation("slice step cannot be zero"));
    }
    let pick = |len: usize| -> Vec<usize> {
        let len = len as i64;
        let clamp = |i: i64, low: i64, high: i64| {
            let i = if i < 0 { i + len } else { i };
            i.clamp(low, high)
        };
        let mut out = Vec::new();
        if step > 0 {
            let mut i = start.map_or(0, |s| clamp(s, 0, len));
            let end = stop.map_or(len, |s| clamp(s, 0, len));
            while i < end {
                out.push(i as usize);
                i += step;
            }
        } else {
            let mut i = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
            let end = stop.map_or(-1, |s| clamp(s, -1, len - 1));
            while i > end {
                out.push(i as usize);
                i += step;
            }
        }
        out
    };
    match value {
        Value::String(s, kind) => {
            let chars: Vec<char> = s.chars().collect();
            let text: String = pick(chars.len()).into_iter().map(|i| chars[i]).collect();
            Ok(Value::String(Arc::from(text), *kind))
        }
        Value::Seq(list) => {
            let items = list.snapshot();
            Ok(Value::from(
                pick(items.len())
                    .into_iter()
                    .map(|i| items[i].clone())
                    .collect::<Vec<_>>(),
            ))
        }
        other => Err(Error::invalid_operation(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn arg_str<'a>(args: &'a Args, index: usize, name: &str, method: &str) -> Result<&'a str> {
    args.get(index, name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::runtime(format!("{}() expects a string argument", method)))
}

/// `value.name(args)`: builtin container and string methods, then object methods, then
/// calling whatever the attribute holds.
pub fn call_method(state: &mut State<'_>, value: &Value, name: &str, args: Args) -> Result<Value> {
    match value {
        Value::Undefined(u) => {
            u.check_operate()?;
            Ok(value.clone())
        }
        Value::Object(obj) => obj.call_method(state, name, args),
        Value::Seq(list) => match name {
            "append" => {
                args.expect_at_most(1, "append")?;
                list.push(args.positional.first().cloned().unwrap_or(Value::None));
                Ok(Value::None)
            }
            "extend" => {
                let items = args
                    .positional
                    .first()
                    .map(Value::try_iter)
                    .transpose()?
                    .unwrap_or_default();
                list.extend(items);
                Ok(Value::None)
            }
            "pop" => {
                let index = args.positional.first().and_then(Value::as_i64);
                list.pop(index)
                    .ok_or_else(|| Error::invalid_operation("pop index out of range"))
            }
            "index" => {
                let needle = args.positional.first().cloned().unwrap_or(Value::None);
                list.snapshot()
                    .iter()
                    .position(|item| *item == needle)
                    .map(Value::from)
                    .ok_or_else(|| Error::invalid_operation(format!("{} is not in list", needle.repr())))
            }
            "count" => {
                let needle = args.positional.first().cloned().unwrap_or(Value::None);
                Ok(Value::from(
                    list.snapshot().iter().filter(|item| **item == needle).count(),
                ))
            }
            _ => Err(no_method(value, name)),
        },
        Value::Map(map) => match name {
            "items" => Ok(Value::from(
                map.iter()
                    .map(|(k, v)| Value::from(vec![k.clone(), v.clone()]))
                    .collect::<Vec<_>>(),
            )),
            "keys" => Ok(Value::from(map.keys().cloned().collect::<Vec<_>>())),
            "values" => Ok(Value::from(map.values().cloned().collect::<Vec<_>>())),
            "get" => {
                let key = args.get(0, "key").cloned().unwrap_or(Value::None);
                let default = args.get(1, "default").cloned().unwrap_or(Value::None);
                Ok(map.get(&key).cloned().unwrap_or(default))
            }
            _ => match map.get(&Value::from(name)) {
                Some(callable) if callable.is_callable() => callable.clone().call(state, args),
                _ => Err(no_method(value, name)),
            },
        },
        Value::String(s, kind) => {
            let text: String = match name {
                "upper" => s.to_uppercase(),
                "lower" => s.to_lowercase(),
                "strip" => s.trim().to_string(),
                "lstrip" => s.trim_start().to_string(),
                "rstrip" => s.trim_end().to_string(),
                "title" => title_case(s),
                "capitalize" => capitalize(s),
                "replace" => {
                    let old = arg_str(&args, 0, "old", name)?;
                    let new = arg_str(&args, 1, "new", name)?;
                    s.replace(old, new)
                }
                "startswith" => {
                    return Ok(Value::Bool(s.starts_with(arg_str(&args, 0, "prefix", name)?)))
                }
                "endswith" => {
                    return Ok(Value::Bool(s.ends_with(arg_str(&args, 0, "suffix", name)?)))
                }
                "split" => {
                    let parts: Vec<Value> = match args.get(0, "sep").and_then(Value::as_str) {
                        Some(sep) => s.split(sep).map(Value::from).collect(),
                        None => s.split_whitespace().map(Value::from).collect(),
                    };
                    return Ok(Value::from(parts));
                }
                "format" => {
                    return Err(Error::invalid_operation(
                        "str.format is not supported, use the % operator",
                    ))
                }
                _ => return Err(no_method(value, name)),
            };
            Ok(Value::String(Arc::from(text), *kind))
        }
        _ => Err(no_method(value, name)),
    }
}

fn no_method(value: &Value, name: &str) -> Error {
    Error::invalid_operation(format!(
        "'{}' object has no attribute '{}'",
        value.type_name(),
        name
    ))
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Build a dict value from keyword arguments.
pub fn kwargs_to_map(kwargs: IndexMap<String, Value>) -> Value {
    let map: ValueMap = kwargs
        .into_iter()
        .map(|(k, v)| (Value::from(k), v))
        .collect();
    Value::from(map)
}
