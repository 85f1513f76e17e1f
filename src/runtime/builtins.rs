//! Default filters, tests and globals
//!
//!     Every environment starts with the sets returned by [filters], [tests] and [globals].
//!     Callers add their own through the environment; names registered later win.
//!
//!     Filters receive the piped value and the remaining call arguments. String filters
//!     keep the safe marker of their input, so `{{ x|safe|upper }}` is still safe.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::markup::{escape, escape_value, percent_format};
use super::ops::{self, kwargs_to_map};
use super::state::State;
use super::undefined::UndefinedHint;
use super::value::{Args, Object, Value, ValueMap};
use crate::error::{Error, ErrorKind, Result};

pub type FilterFn = dyn Fn(&State<'_>, Value, &Args) -> Result<Value> + Send + Sync;
pub type TestFn = dyn Fn(&State<'_>, &Value, &Args) -> Result<bool> + Send + Sync;

/// Largest number of items `range()` produces.
pub const MAX_RANGE: i64 = 100_000;

fn register<F>(map: &mut IndexMap<String, Arc<FilterFn>>, names: &[&str], f: F)
where
    F: Fn(&State<'_>, Value, &Args) -> Result<Value> + Send + Sync + 'static,
{
    let f: Arc<FilterFn> = Arc::new(f);
    for name in names {
        map.insert(name.to_string(), f.clone());
    }
}

fn register_test<F>(map: &mut IndexMap<String, Arc<TestFn>>, names: &[&str], f: F)
where
    F: Fn(&State<'_>, &Value, &Args) -> Result<bool> + Send + Sync + 'static,
{
    let f: Arc<TestFn> = Arc::new(f);
    for name in names {
        map.insert(name.to_string(), f.clone());
    }
}

pub fn filters() -> IndexMap<String, Arc<FilterFn>> {
    let mut map = IndexMap::new();
    register(&mut map, &["escape", "e"], |_, value, _| {
        Ok(Value::from_safe_string(escape_value(&value)?))
    });
    register(&mut map, &["safe"], |_, value, _| {
        if value.is_safe() {
            return Ok(value);
        }
        Ok(Value::from_safe_string(value.to_output()?))
    });
    register(&mut map, &["default", "d"], default);
    register(&mut map, &["join"], join);
    register(&mut map, &["length", "count"], |_, value, _| length(&value));
    register(&mut map, &["upper"], |_, value, _| map_text(&value, |s| s.to_uppercase()));
    register(&mut map, &["lower"], |_, value, _| map_text(&value, |s| s.to_lowercase()));
    register(&mut map, &["title"], |_, value, _| map_text(&value, ops::title_case));
    register(&mut map, &["capitalize"], |_, value, _| map_text(&value, ops::capitalize));
    register(&mut map, &["trim"], trim);
    register(&mut map, &["string"], |_, value, _| match value {
        Value::String(..) => Ok(value),
        other => Ok(Value::from(other.to_output()?)),
    });
    register(&mut map, &["list"], |_, value, _| Ok(Value::from(value.try_iter()?)));
    register(&mut map, &["first"], |state, value, _| {
        let items = value.try_iter()?;
        Ok(items
            .into_iter()
            .next()
            .unwrap_or_else(|| empty_sequence(state, "first")))
    });
    register(&mut map, &["last"], |state, value, _| {
        let items = value.try_iter()?;
        Ok(items
            .into_iter()
            .last()
            .unwrap_or_else(|| empty_sequence(state, "last")))
    });
    register(&mut map, &["format"], format);
    register(&mut map, &["xmlattr"], xmlattr);
    register(&mut map, &["replace"], replace);
    register(&mut map, &["abs"], |_, value, _| match value {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(Error::invalid_operation(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    });
    register(&mut map, &["int"], |_, value, args| {
        let fallback = args.get(0, "default").cloned().unwrap_or(Value::Int(0));
        Ok(match &value {
            Value::Int(_) => value,
            Value::Bool(b) => Value::Int(i64::from(*b)),
            Value::Float(f) => Value::Int(f.trunc() as i64),
            Value::String(s, _) => {
                let text = s.trim().replace('_', "");
                text.parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| text.parse::<f64>().map(|f| Value::Int(f.trunc() as i64)))
                    .unwrap_or(fallback)
            }
            _ => fallback,
        })
    });
    register(&mut map, &["tojson"], |_, value, _| {
        let json = serde_json::to_string(&value)
            .map_err(|err| Error::new(ErrorKind::BadSerialization, err.to_string()))?;
        Ok(Value::from_safe_string(htmlsafe_json(&json)))
    });
    map
}

fn empty_sequence(state: &State<'_>, which: &str) -> Value {
    Value::undefined(
        UndefinedHint::Message(format!("No {} item, sequence was empty.", which)),
        state.undefined_policy(),
    )
}

fn default(_state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    let fallback = args
        .get(0, "default_value")
        .cloned()
        .unwrap_or_else(|| Value::from(""));
    let boolean = match args.get(1, "boolean") {
        Some(flag) => flag.is_true()?,
        None => false,
    };
    if value.is_undefined() || (boolean && !value.is_true()?) {
        return Ok(fallback);
    }
    Ok(value)
}

fn join(state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    let separator = args.get(0, "d").cloned().unwrap_or_else(|| Value::from(""));
    let mut items = value.try_iter()?;
    if let Some(attribute) = args.get(1, "attribute") {
        let name = attribute.to_string();
        items = items
            .iter()
            .map(|item| ops::get_attr(item, &name, state.undefined_policy()))
            .collect::<Result<_>>()?;
    }
    let escaping = state.autoescape()
        && (separator.is_safe() || items.iter().any(Value::is_safe));
    let render = |item: &Value| -> Result<String> {
        if escaping {
            escape_value(item)
        } else {
            item.to_output()
        }
    };
    let separator_text = render(&separator)?;
    let mut out = String::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(&separator_text);
        }
        out.push_str(&render(item)?);
    }
    Ok(Value::from_output(out, escaping))
}

fn length(value: &Value) -> Result<Value> {
    if let Value::Undefined(u) = value {
        u.check_iterate()?;
        return Ok(Value::Int(0));
    }
    value.len().map(Value::from).ok_or_else(|| {
        Error::invalid_operation(format!(
            "object of type '{}' has no len()",
            value.type_name()
        ))
    })
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Result<Value> {
    match value {
        Value::String(s, kind) => Ok(Value::String(Arc::from(f(s)), *kind)),
        other => Ok(Value::from(f(&other.to_output()?))),
    }
}

fn trim(_state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    let chars = args.get(0, "chars").and_then(Value::as_str).map(str::to_string);
    map_text(&value, |s| match &chars {
        Some(chars) => s.trim_matches(|c| chars.contains(c)).to_string(),
        None => s.trim().to_string(),
    })
}

fn format(_state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    if !args.positional.is_empty() && !args.kwargs.is_empty() {
        return Err(Error::runtime(
            "can't handle positional and keyword arguments at the same time",
        ));
    }
    let values = if args.kwargs.is_empty() {
        Value::from(args.positional.clone())
    } else {
        kwargs_to_map(args.kwargs.clone())
    };
    let text = percent_format(&value.to_output()?, &values, value.is_safe())?;
    Ok(Value::from_output(text, value.is_safe()))
}

static ATTR_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s/>=]").unwrap());

fn xmlattr(state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    let autospace = match args.get(0, "autospace") {
        Some(flag) => flag.is_true()?,
        None => true,
    };
    let map = value.as_map().ok_or_else(|| {
        Error::invalid_operation(format!(
            "xmlattr expects a mapping, not '{}'",
            value.type_name()
        ))
    })?;
    let mut items = Vec::new();
    for (key, item) in map.iter() {
        if item.is_none() || item.is_undefined() {
            continue;
        }
        let key = key.to_string();
        if ATTR_KEY.is_match(&key) {
            return Err(Error::invalid_operation(format!(
                "Invalid character in attribute name: {}",
                Value::from(key.as_str()).repr()
            )));
        }
        items.push(format!("{}=\"{}\"", escape(&key), escape_value(item)?));
    }
    let mut out = items.join(" ");
    if autospace && !out.is_empty() {
        out.insert(0, ' ');
    }
    Ok(Value::from_output(out, state.autoescape()))
}

fn replace(state: &State<'_>, value: Value, args: &Args) -> Result<Value> {
    let old = args.get(0, "old").cloned().unwrap_or(Value::None);
    let new = args.get(1, "new").cloned().unwrap_or(Value::None);
    let count = args.get(2, "count").and_then(Value::as_i64);
    let apply = |text: &str, old: &str, new: &str| match count {
        Some(n) if n >= 0 => text.replacen(old, new, n as usize),
        _ => text.replace(old, new),
    };
    if !state.autoescape() {
        let text = apply(&value.to_output()?, &old.to_output()?, &new.to_output()?);
        return Ok(Value::from(text));
    }
    let text = if (old.is_safe() || new.is_safe()) && !value.is_safe() {
        escape(&value.to_output()?)
    } else {
        value.to_output()?
    };
    let text = apply(&text, &escape_value(&old)?, &escape_value(&new)?);
    Ok(Value::from_safe_string(text))
}

/// JSON that can be embedded in HTML and script tags.
fn htmlsafe_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            other => out.push(other),
        }
    }
    out
}

fn number_arg(args: &Args, index: usize, name: &str, test: &str) -> Result<Value> {
    args.get(index, name)
        .cloned()
        .ok_or_else(|| Error::runtime(format!("test '{}' needs an argument", test)))
}

fn integer(value: &Value, test: &str) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(Error::invalid_operation(format!(
            "test '{}' expects an integer, not '{}'",
            test,
            other.type_name()
        ))),
    }
}

fn compare_test(op: ops::CmpOp) -> impl Fn(&State<'_>, &Value, &Args) -> Result<bool> {
    move |_, value, args| {
        let other = number_arg(args, 0, "other", op.symbol())?;
        ops::compare(op, value, &other)
    }
}

pub fn tests() -> IndexMap<String, Arc<TestFn>> {
    use ops::CmpOp;

    let mut map = IndexMap::new();
    register_test(&mut map, &["defined"], |_, v, _| Ok(!v.is_undefined()));
    register_test(&mut map, &["undefined"], |_, v, _| Ok(v.is_undefined()));
    register_test(&mut map, &["none"], |_, v, _| Ok(v.is_none()));
    register_test(&mut map, &["escaped"], |_, v, _| Ok(v.is_safe()));
    register_test(&mut map, &["string"], |_, v, _| Ok(v.as_str().is_some()));
    register_test(&mut map, &["number"], |_, v, _| {
        Ok(matches!(v, Value::Int(_) | Value::Float(_) | Value::Bool(_)))
    });
    register_test(&mut map, &["integer"], |_, v, _| Ok(matches!(v, Value::Int(_))));
    register_test(&mut map, &["float"], |_, v, _| Ok(matches!(v, Value::Float(_))));
    register_test(&mut map, &["boolean"], |_, v, _| Ok(matches!(v, Value::Bool(_))));
    register_test(&mut map, &["true"], |_, v, _| Ok(matches!(v, Value::Bool(true))));
    register_test(&mut map, &["false"], |_, v, _| Ok(matches!(v, Value::Bool(false))));
    register_test(&mut map, &["sequence"], |_, v, _| {
        Ok(matches!(v, Value::String(..) | Value::Seq(_) | Value::Map(_))
            || v.as_object().is_some_and(|obj| obj.iterate().is_some()))
    });
    register_test(&mut map, &["mapping"], |_, v, _| Ok(v.as_map().is_some()));
    register_test(&mut map, &["iterable"], |_, v, _| {
        Ok(!v.is_undefined() && v.try_iter().is_ok())
    });
    register_test(&mut map, &["callable"], |_, v, _| Ok(v.is_callable()));
    register_test(&mut map, &["lower"], |_, v, _| {
        Ok(v.as_str().is_some_and(|s| s.to_lowercase() == s))
    });
    register_test(&mut map, &["upper"], |_, v, _| {
        Ok(v.as_str().is_some_and(|s| s.to_uppercase() == s))
    });
    register_test(&mut map, &["even"], |_, v, _| Ok(integer(v, "even")? % 2 == 0));
    register_test(&mut map, &["odd"], |_, v, _| Ok(integer(v, "odd")? % 2 != 0));
    register_test(&mut map, &["divisibleby"], |_, v, args| {
        let divisor = integer(&number_arg(args, 0, "num", "divisibleby")?, "divisibleby")?;
        if divisor == 0 {
            return Err(Error::invalid_operation("integer division or modulo by zero"));
        }
        Ok(integer(v, "divisibleby")? % divisor == 0)
    });
    register_test(&mut map, &["sameas"], |_, v, args| {
        let other = number_arg(args, 0, "other", "sameas")?;
        Ok(same_as(v, &other))
    });
    register_test(&mut map, &["in"], |_, v, args| {
        let seq = number_arg(args, 0, "seq", "in")?;
        ops::contains(&seq, v)
    });
    register_test(&mut map, &["eq", "==", "equalto"], compare_test(CmpOp::Eq));
    register_test(&mut map, &["ne", "!="], compare_test(CmpOp::Ne));
    register_test(&mut map, &["lt", "<", "lessthan"], compare_test(CmpOp::Lt));
    register_test(&mut map, &["le", "<="], compare_test(CmpOp::Lte));
    register_test(&mut map, &["gt", ">", "greaterthan"], compare_test(CmpOp::Gt));
    register_test(&mut map, &["ge", ">="], compare_test(CmpOp::Gte));
    map
}

/// Identity in the sense of `is`: shared containers and objects compare by pointer.
fn same_as(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Undefined(_), Value::Undefined(_)) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Seq(x), Value::Seq(y)) => Arc::ptr_eq(x, y),
        (Value::Map(x), Value::Map(y)) => Arc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => {
            std::ptr::addr_eq(Arc::as_ptr(x), Arc::as_ptr(y))
        }
        _ => false,
    }
}

pub fn globals() -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    map.insert("range".to_string(), Value::from_function("range", range));
    map.insert(
        "dict".to_string(),
        Value::from_function("dict", |_, args| Ok(kwargs_to_map(args.kwargs))),
    );
    map.insert(
        "namespace".to_string(),
        Value::from_function("namespace", |_, args| Namespace::from_args(args)),
    );
    map
}

fn range(_state: &mut State<'_>, args: Args) -> Result<Value> {
    args.expect_at_most(3, "range")?;
    let ints = args
        .positional
        .iter()
        .map(|v| {
            v.as_i64().ok_or_else(|| {
                Error::invalid_operation(format!(
                    "'{}' object cannot be interpreted as an integer",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(Error::runtime("range expected at least 1 argument, got 0")),
    };
    if step == 0 {
        return Err(Error::invalid_operation("range() arg 3 must not be zero"));
    }
    let count = if step > 0 {
        (stop - start + step - 1).max(0) / step
    } else {
        (start - stop - step - 1).max(0) / -step
    };
    if count > MAX_RANGE {
        return Err(Error::invalid_operation(format!(
            "Range too big. The maximum number of items is {}.",
            MAX_RANGE
        )));
    }
    Ok(Value::from(
        (0..count)
            .map(|i| Value::Int(start + i * step))
            .collect::<Vec<_>>(),
    ))
}

/// `namespace(...)`: a mutable attribute bag, assignable with `{% set ns.attr = ... %}`.
#[derive(Debug, Default)]
pub struct Namespace {
    attrs: Mutex<IndexMap<String, Value>>,
}

impl Namespace {
    fn from_args(args: Args) -> Result<Value> {
        let mut attrs = IndexMap::new();
        for initial in &args.positional {
            let map = initial.as_map().ok_or_else(|| {
                Error::invalid_operation("namespace() takes mappings as positional arguments")
            })?;
            for (key, value) in map.iter() {
                attrs.insert(key.to_string(), value.clone());
            }
        }
        attrs.extend(args.kwargs);
        Ok(Value::from_object(Namespace {
            attrs: Mutex::new(attrs),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Value>> {
        self.attrs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Object for Namespace {
    fn type_name(&self) -> &str {
        "namespace"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn render(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut text = String::from("<Namespace ");
        let attrs = self.lock();
        let mut map = ValueMap::new();
        for (key, value) in attrs.iter() {
            map.insert(Value::from(key.as_str()), value.clone());
        }
        let _ = write!(text, "{}>", Value::from(map));
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::runtime::Context;
    use rstest::rstest;

    fn with_state<T>(autoescape: bool, f: impl FnOnce(&mut State<'_>) -> T) -> T {
        let env = Environment::new();
        let template = env.compile("", Some("builtins")).unwrap();
        let mut state = State::new(&env, &template, Arc::new(Context::default()));
        state.set_autoescape(autoescape);
        f(&mut state)
    }

    fn filter(name: &str, state: &State<'_>, value: Value, args: Args) -> Result<Value> {
        let all = filters();
        all[name](state, value, &args)
    }

    #[rstest(
        name,
        value,
        expected,
        case("upper", Value::from("abc"), Value::from("ABC")),
        case("length", Value::from(vec![Value::Int(1), Value::Int(2)]), Value::Int(2)),
        case("trim", Value::from("  x "), Value::from("x")),
        case("first", Value::from("xyz"), Value::from("x")),
        case("abs", Value::Int(-3), Value::Int(3)),
        case("int", Value::from("42"), Value::Int(42)),
        case("string", Value::Int(7), Value::from("7"))
    )]
    fn test_simple_filters(name: &str, value: Value, expected: Value) {
        let out = with_state(false, |state| filter(name, state, value, Args::default()).unwrap());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_default_filter() {
        with_state(false, |state| {
            let missing = state.undefined("x");
            let out = filter("d", state, missing, Args::new(vec![Value::from("fallback")])).unwrap();
            assert_eq!(out, Value::from("fallback"));
            let out = filter(
                "default",
                state,
                Value::from(""),
                Args::new(vec![Value::from("empty"), Value::Bool(true)]),
            )
            .unwrap();
            assert_eq!(out, Value::from("empty"));
        });
    }

    #[test]
    fn test_join_is_safe_aware_under_autoescape() {
        let items = Value::from(vec![Value::from("<a>"), Value::from_safe_string("<b>")]);
        let out = with_state(true, |state| {
            filter("join", state, items.clone(), Args::new(vec![Value::from("|")])).unwrap()
        });
        assert!(out.is_safe());
        assert_eq!(out.as_str(), Some("&lt;a&gt;|<b>"));
        let out = with_state(false, |state| {
            filter("join", state, items, Args::new(vec![Value::from("|")])).unwrap()
        });
        assert_eq!(out.as_str(), Some("<a>|<b>"));
    }

    #[test]
    fn test_xmlattr_rejects_bad_keys() {
        let mut map = ValueMap::new();
        map.insert(Value::from("a b"), Value::from("x"));
        let err = with_state(false, |state| {
            filter("xmlattr", state, Value::from(map), Args::default()).unwrap_err()
        });
        assert!(err.message().contains("Invalid character in attribute name"));
    }

    #[test]
    fn test_xmlattr_skips_none_and_escapes() {
        let mut map = ValueMap::new();
        map.insert(Value::from("class"), Value::from("<x>"));
        map.insert(Value::from("id"), Value::None);
        let out = with_state(true, |state| {
            filter("xmlattr", state, Value::from(map), Args::default()).unwrap()
        });
        assert!(out.is_safe());
        assert_eq!(out.as_str(), Some(" class=\"&lt;x&gt;\""));
    }

    #[test]
    fn test_tojson_is_html_safe() {
        let out = with_state(false, |state| {
            filter("tojson", state, Value::from("<script>"), Args::default()).unwrap()
        });
        assert_eq!(out.as_str(), Some("\"\\u003cscript\\u003e\""));
    }

    #[rstest(
        name,
        value,
        arg,
        expected,
        case("divisibleby", Value::Int(9), Some(Value::Int(3)), true),
        case("odd", Value::Int(4), None, false),
        case("in", Value::Int(2), Some(Value::from(vec![Value::Int(1), Value::Int(2)])), true),
        case("eq", Value::from("a"), Some(Value::from("a")), true),
        case("number", Value::Float(1.5), None, true),
        case("mapping", Value::from("x"), None, false)
    )]
    fn test_tests(name: &str, value: Value, arg: Option<Value>, expected: bool) {
        let args = Args::new(arg.into_iter().collect());
        let result = with_state(false, |state| tests()[name](state, &value, &args).unwrap());
        assert_eq!(result, expected);
    }

    #[test]
    fn test_range_limits() {
        with_state(false, |state| {
            let out = range(state, Args::new(vec![Value::Int(5), Value::Int(0), Value::Int(-2)])).unwrap();
            assert_eq!(out.to_string(), "[5, 3, 1]");
            assert!(range(state, Args::new(vec![Value::Int(MAX_RANGE + 1)])).is_err());
        });
    }

    #[test]
    fn test_namespace_attributes() {
        let ns = Namespace::from_args(Args::default().with_kwarg("found", Value::Bool(false))).unwrap();
        let obj = ns.as_object().unwrap();
        obj.set_attr("found", Value::Bool(true)).unwrap();
        assert_eq!(obj.get_attr("found"), Some(Value::Bool(true)));
        assert_eq!(obj.type_name(), "namespace");
    }
}
