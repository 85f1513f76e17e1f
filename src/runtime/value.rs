//! The runtime value model
//!
//!     Everything a template computes is a [Value]. The variants mirror the data a template
//!     can see: the undefined sentinel, none, booleans, integers, floats, strings (plain or
//!     safe markup), lists, insertion-ordered maps, and host objects implementing [Object].
//!
//!     Values are cheap to clone: containers are reference counted. Lists are the one
//!     mutable container (`{% do items.append(x) %}` changes the list in place), so they sit
//!     behind a lock; everything else is immutable once built.
//!
//! Python Semantics
//!
//!     Equality, truthiness, printing (`str`) and `repr` follow the expression language the
//!     templates are written in: `1 == 1.0`, empty containers are false, `none` prints as
//!     `None`, floats always print with a fractional part.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::state::State;
use super::undefined::{Undefined, UndefinedHint, UndefinedPolicy};
use crate::error::{Error, Result};

pub type ValueMap = IndexMap<Value, Value>;

/// Whether a string is plain text or markup that is safe to emit verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Normal,
    Safe,
}

/// A shared, growable list.
#[derive(Debug, Default)]
pub struct List {
    items: Mutex<Vec<Value>>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List {
            items: Mutex::new(items),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A copy of the current items.
    pub fn snapshot(&self) -> Vec<Value> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.lock().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.lock().push(value);
    }

    pub fn extend(&self, values: Vec<Value>) {
        self.lock().extend(values);
    }

    /// Remove and return the item at `index` (negative counts from the end), or the last.
    pub fn pop(&self, index: Option<i64>) -> Option<Value> {
        let mut items = self.lock();
        let len = items.len() as i64;
        let at = match index {
            None => len - 1,
            Some(i) if i < 0 => len + i,
            Some(i) => i,
        };
        if at < 0 || at >= len {
            return None;
        }
        Some(items.remove(at as usize))
    }
}

/// Arguments of a call: positional values and keyword values in call order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Args {
            positional,
            kwargs: IndexMap::new(),
        }
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    /// Argument by position, falling back to the keyword of the same parameter.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.kwargs.get(name))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.kwargs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail when more than `max` arguments were passed to `callee`.
    pub fn expect_at_most(&self, max: usize, callee: &str) -> Result<()> {
        if self.len() > max {
            return Err(Error::runtime(format!(
                "{}() takes at most {} argument(s), {} given",
                callee,
                max,
                self.len()
            )));
        }
        Ok(())
    }
}

/// Host-defined dynamic values: attributes, methods and calls resolved at render time.
pub trait Object: fmt::Debug + Send + Sync {
    /// Used in error messages and the default rendering.
    fn type_name(&self) -> &str {
        "object"
    }

    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn set_attr(&self, name: &str, _value: Value) -> Result<()> {
        Err(Error::invalid_operation(format!(
            "cannot assign attribute '{}' on '{}' object",
            name,
            self.type_name()
        )))
    }

    fn call(&self, _state: &mut State<'_>, _args: Args) -> Result<Value> {
        Err(Error::invalid_operation(format!(
            "'{}' object is not callable",
            self.type_name()
        )))
    }

    fn call_method(&self, state: &mut State<'_>, name: &str, args: Args) -> Result<Value> {
        match self.get_attr(name) {
            Some(value) => value.call(state, args),
            None => Err(Error::invalid_operation(format!(
                "'{}' object has no method '{}'",
                self.type_name(),
                name
            ))),
        }
    }

    fn is_callable(&self) -> bool {
        false
    }

    fn is_true(&self) -> bool {
        true
    }

    /// Items produced when the object is iterated, if it is iterable.
    fn iterate(&self) -> Option<Vec<Value>> {
        None
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object>", self.type_name())
    }
}

/// Native callable signature for globals and installed functions.
pub type NativeFn = dyn Fn(&mut State<'_>, Args) -> Result<Value> + Send + Sync;

/// A named native function exposed to templates.
pub struct Function {
    name: String,
    func: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut State<'_>, Args) -> Result<Value> + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

impl Object for Function {
    fn type_name(&self) -> &str {
        "function"
    }

    fn call(&self, state: &mut State<'_>, args: Args) -> Result<Value> {
        (self.func)(state, args)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Undefined(Arc<Undefined>),
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>, StringKind),
    Seq(Arc<List>),
    Map(Arc<ValueMap>),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn undefined(hint: UndefinedHint, policy: UndefinedPolicy) -> Value {
        Value::Undefined(Arc::new(Undefined::new(hint, policy)))
    }

    pub fn from_safe_string(text: impl Into<String>) -> Value {
        Value::String(Arc::from(text.into()), StringKind::Safe)
    }

    pub fn from_object<O: Object + 'static>(object: O) -> Value {
        Value::Object(Arc::new(object))
    }

    pub fn from_function<F>(name: &str, func: F) -> Value
    where
        F: Fn(&mut State<'_>, Args) -> Result<Value> + Send + Sync + 'static,
    {
        Value::from_object(Function::new(name, func))
    }

    /// Plain or safe string, picked by `safe`.
    pub fn from_output(text: String, safe: bool) -> Value {
        if safe {
            Value::from_safe_string(text)
        } else {
            Value::from(text)
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Undefined(_) => "undefined",
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(..) => "str",
            Value::Seq(_) => "list",
            Value::Map(_) => "dict",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Value::String(_, StringKind::Safe))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_callable())
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s, _) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Arc<List>> {
        match self {
            Value::Seq(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Object>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_undefined(&self) -> Option<&Undefined> {
        match self {
            Value::Undefined(u) => Some(u),
            _ => None,
        }
    }

    /// Text for an output site. Undefined values follow their policy.
    pub fn to_output(&self) -> Result<String> {
        if let Value::Undefined(u) = self {
            u.check_print()?;
            return Ok(String::new());
        }
        Ok(self.to_string())
    }

    pub fn is_true(&self) -> Result<bool> {
        Ok(match self {
            Value::Undefined(u) => {
                u.check_iterate()?;
                false
            }
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s, _) => !s.is_empty(),
            Value::Seq(list) => !list.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(obj) => obj.is_true(),
        })
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s, _) => Some(s.chars().count()),
            Value::Seq(list) => Some(list.len()),
            Value::Map(map) => Some(map.len()),
            Value::Object(obj) => obj.iterate().map(|items| items.len()),
            _ => None,
        }
    }

    /// Materialize the items a `for` loop would see.
    pub fn try_iter(&self) -> Result<Vec<Value>> {
        match self {
            Value::Undefined(u) => {
                u.check_iterate()?;
                Ok(Vec::new())
            }
            Value::Seq(list) => Ok(list.snapshot()),
            Value::Map(map) => Ok(map.keys().cloned().collect()),
            Value::String(s, kind) => Ok(s
                .chars()
                .map(|c| Value::String(Arc::from(c.to_string()), *kind))
                .collect()),
            Value::Object(obj) => obj.iterate().ok_or_else(|| {
                Error::invalid_operation(format!("'{}' object is not iterable", obj.type_name()))
            }),
            other => Err(Error::invalid_operation(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Raw lookup by key or index, without undefined handling.
    pub fn get_key(&self, key: &Value) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(key).cloned(),
            Value::Seq(list) => {
                let index = normalize_index(key.as_i64()?, list.len())?;
                list.get(index)
            }
            Value::String(s, kind) => {
                let len = s.chars().count();
                let index = normalize_index(key.as_i64()?, len)?;
                s.chars()
                    .nth(index)
                    .map(|c| Value::String(Arc::from(c.to_string()), *kind))
            }
            Value::Object(obj) => obj.get_attr(key.as_str()?),
            _ => None,
        }
    }

    pub fn call(&self, state: &mut State<'_>, args: Args) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.call(state, args),
            Value::Undefined(u) => {
                u.check_operate()?;
                Ok(self.clone())
            }
            other => Err(Error::invalid_operation(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// `repr()` of the value.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, &mut Vec::new(), true);
        out
    }

    /// Print into `out`. `open` holds the lists being printed further up, so a list that
    /// contains itself prints as `[...]`.
    fn write_text(&self, out: &mut String, open: &mut Vec<*const List>, repr: bool) {
        match self {
            Value::Undefined(_) if repr => out.push_str("Undefined"),
            Value::String(s, _) if repr => out.push_str(&repr_str(s)),
            Value::Seq(list) => {
                let ptr = Arc::as_ptr(list);
                if open.contains(&ptr) {
                    out.push_str("[...]");
                    return;
                }
                open.push(ptr);
                out.push('[');
                for (i, item) in list.snapshot().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_text(out, open, true);
                }
                out.push(']');
                open.pop();
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_text(out, open, true);
                    out.push_str(": ");
                    value.write_text(out, open, true);
                }
                out.push('}');
            }
            scalar => {
                let _ = write!(out, "{}", scalar);
            }
        }
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a, _), Value::String(b, _)) => Some(a.cmp(b)),
            (Value::Seq(a), Value::Seq(b)) => {
                let (a, b) = (a.snapshot(), b.snapshot());
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => {
                let (a, b) = (self.numeric()?, other.numeric()?);
                a.partial_cmp(&b)
            }
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => self.as_f64(),
            _ => None,
        }
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    if index < 0 || index >= len {
        None
    } else {
        Some(index as usize)
    }
}

fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python's float formatting: integral values keep a `.0`.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined(_) => Ok(()),
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s, _) => f.write_str(s),
            Value::Seq(_) | Value::Map(_) => f.write_str(&self.repr()),
            Value::Object(obj) => obj.render(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined(_), Value::Undefined(_)) => true,
            (Value::None, Value::None) => true,
            (Value::String(a, _), Value::String(b, _)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => Arc::ptr_eq(a, b) || a.snapshot() == b.snapshot(),
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            _ => match (self.numeric(), other.numeric()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        self.compare(other)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Undefined(_) => 0u8.hash(state),
            Value::None => 1u8.hash(state),
            Value::Bool(b) => i64::from(*b).hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    (*f as i64).hash(state)
                } else {
                    f.to_bits().hash(state)
                }
            }
            Value::String(s, _) => s.hash(state),
            Value::Seq(list) => list.len().hash(state),
            Value::Map(map) => map.len().hash(state),
            Value::Object(obj) => (Arc::as_ptr(obj) as *const () as usize).hash(state),
        }
    }
}

thread_local! {
    /// Lists currently being serialized on this thread.
    static SERIALIZING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Undefined(_) | Value::None => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s, _) => serializer.serialize_str(s),
            Value::Seq(list) => {
                let ptr = Arc::as_ptr(list) as usize;
                let cyclic = SERIALIZING.with(|open| {
                    let mut open = open.borrow_mut();
                    let cyclic = open.contains(&ptr);
                    if !cyclic {
                        open.push(ptr);
                    }
                    cyclic
                });
                if cyclic {
                    return Err(S::Error::custom("circular reference detected"));
                }
                let result = (|| {
                    let items = list.snapshot();
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in &items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                })();
                SERIALIZING.with(|open| open.borrow_mut().pop());
                result
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(&key.to_string(), value)?;
                }
                out.end()
            }
            Value::Object(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::from(items.into_iter().map(Value::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(entries) => {
                let map: ValueMap = entries
                    .into_iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect();
                Value::from(map)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s), StringKind::Normal)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s), StringKind::Normal)
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s, StringKind::Normal)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(Arc::new(List::new(items)))
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_style_printing() {
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        let list = Value::from(vec![Value::from(1), Value::from("a")]);
        assert_eq!(list.to_string(), "[1, 'a']");
    }

    #[test]
    fn test_self_referential_list_prints_ellipsis() {
        let list = Value::from(vec![Value::from(1)]);
        list.as_list().unwrap().push(list.clone());
        assert_eq!(list.to_string(), "[1, [...]]");
        let outer = Value::from(vec![list.clone()]);
        assert_eq!(outer.repr(), "[[1, [...]]]");
        assert!(serde_json::to_string(&list).is_err());
    }

    #[test]
    fn test_numeric_equality_and_hash() {
        let mut map = ValueMap::new();
        map.insert(Value::Int(1), Value::from("one"));
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(map.get(&Value::Float(1.0)), Some(&Value::from("one")));
    }

    #[test]
    fn test_safe_and_plain_strings_compare_equal() {
        assert_eq!(Value::from("<b>"), Value::from_safe_string("<b>"));
        assert!(Value::from_safe_string("x").is_safe());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").is_true().unwrap());
        assert!(!Value::from(Vec::<Value>::new()).is_true().unwrap());
        assert!(Value::Int(3).is_true().unwrap());
    }

    #[test]
    fn test_list_is_shared() {
        let list = Value::from(Vec::<Value>::new());
        let alias = list.clone();
        alias.as_list().unwrap().push(Value::from(1));
        assert_eq!(list.len(), Some(1));
    }

    #[test]
    fn test_negative_indexing() {
        let list = Value::from(vec![Value::from(1), Value::from(2)]);
        assert_eq!(list.get_key(&Value::Int(-1)), Some(Value::Int(2)));
        assert_eq!(list.get_key(&Value::Int(2)), None);
    }

    #[test]
    fn test_repr_quotes() {
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
        assert_eq!(Value::from("a").repr(), "'a'");
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({"a": [1, 2.5, null]}));
        assert_eq!(value.to_string(), "{'a': [1, 2.5, None]}");
    }
}
