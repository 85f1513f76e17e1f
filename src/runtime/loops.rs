//! The `loop` helper
//!
//!     Every `for` body sees a `loop` object describing the current iteration. The object
//!     is shared by all iterations of one loop and updated in place; it is also the handle
//!     for recursive loops (`loop(children)` renders the same body one level deeper).
//!
//!     The inline `if` filter runs before the loop starts, so `length`, `last` and
//!     `revindex` count only the items that pass it. The `else` body runs when no item
//!     was iterated.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

use super::state::State;
use super::undefined::UndefinedHint;
use super::value::{Args, Object, Value};
use crate::compiling::{Eval, Exec, Flow};
use crate::error::{Error, Result};
use crate::parsing::Target;

/// The compiled parts of a `for` statement, shared with the loop object for recursion.
pub struct LoopPieces {
    pub target: Target,
    pub filter: Option<Eval>,
    pub body: Exec,
    pub else_body: Option<Exec>,
    pub recursive: bool,
}

impl fmt::Debug for LoopPieces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopPieces")
            .field("target", &self.target)
            .field("recursive", &self.recursive)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Cursor {
    index0: usize,
    last_changed: Option<Vec<Value>>,
}

#[derive(Debug)]
pub struct Loop {
    items: Vec<Value>,
    depth0: usize,
    cursor: Mutex<Cursor>,
    pieces: Arc<LoopPieces>,
}

impl Loop {
    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn index0(&self) -> usize {
        self.cursor().index0
    }

    fn missing(&self, what: &str) -> Value {
        Value::undefined(
            UndefinedHint::Message(format!("there is no {} item", what)),
            Default::default(),
        )
    }
}

impl Object for Loop {
    fn type_name(&self) -> &str {
        "LoopContext"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        let index0 = self.index0();
        let length = self.items.len();
        Some(match name {
            "index0" => Value::from(index0),
            "index" => Value::from(index0 + 1),
            "revindex0" => Value::from(length - index0 - 1),
            "revindex" => Value::from(length - index0),
            "first" => Value::from(index0 == 0),
            "last" => Value::from(index0 + 1 == length),
            "length" => Value::from(length),
            "depth0" => Value::from(self.depth0),
            "depth" => Value::from(self.depth0 + 1),
            "previtem" => match index0.checked_sub(1) {
                Some(i) => self.items[i].clone(),
                None => self.missing("previous"),
            },
            "nextitem" => match self.items.get(index0 + 1) {
                Some(item) => item.clone(),
                None => self.missing("next"),
            },
            _ => return None,
        })
    }

    /// Recursive loops: `loop(children)`.
    fn call(&self, state: &mut State<'_>, args: Args) -> Result<Value> {
        if !self.pieces.recursive {
            return Err(Error::runtime(
                "Tried to call non recursive loop. Maybe you forgot the 'recursive' modifier.",
            ));
        }
        args.expect_at_most(1, "loop")?;
        let iterable = args.positional.into_iter().next().unwrap_or(Value::None);
        let mut buf = String::new();
        state.nested(|state| run_loop(state, &self.pieces, &iterable, self.depth0 + 1, &mut buf))?;
        Ok(Value::from_output(buf, state.autoescape()))
    }

    fn call_method(&self, state: &mut State<'_>, name: &str, args: Args) -> Result<Value> {
        match name {
            "cycle" => {
                if args.positional.is_empty() {
                    return Err(Error::runtime("no items for cycling given"));
                }
                let index = self.index0() % args.positional.len();
                Ok(args.positional[index].clone())
            }
            "changed" => {
                let mut cursor = self.cursor();
                let current = args.positional;
                if cursor.last_changed.as_ref() == Some(&current) {
                    return Ok(Value::from(false));
                }
                cursor.last_changed = Some(current);
                Ok(Value::from(true))
            }
            _ => match self.get_attr(name) {
                Some(value) => value.call(state, args),
                None => Err(Error::invalid_operation(format!(
                    "'LoopContext' object has no attribute '{}'",
                    name
                ))),
            },
        }
    }

    fn is_callable(&self) -> bool {
        self.pieces.recursive
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<LoopContext {}/{}>", self.index0() + 1, self.items.len())
    }
}

/// Drive one `for` statement (or one level of a recursive loop) over `iterable`.
pub fn run_loop(
    state: &mut State<'_>,
    pieces: &Arc<LoopPieces>,
    iterable: &Value,
    depth0: usize,
    out: &mut String,
) -> Result<()> {
    let mut items = iterable.try_iter()?;
    if let Some(filter) = &pieces.filter {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            let keep = state.with_scope(IndexMap::new(), false, |state| {
                state.assign(&pieces.target, item.clone(), false)?;
                filter(state)?.is_true()
            })?;
            if keep {
                kept.push(item);
            }
        }
        items = kept;
    }

    if items.is_empty() {
        if let Some(else_body) = &pieces.else_body {
            state.with_scope(IndexMap::new(), false, |state| else_body(state, out))?;
        }
        return Ok(());
    }

    let helper = Arc::new(Loop {
        items: items.clone(),
        depth0,
        cursor: Mutex::new(Cursor::default()),
        pieces: pieces.clone(),
    });
    let helper_value = Value::Object(helper.clone());

    state.with_scope(IndexMap::new(), false, |state| {
        for (index0, item) in items.into_iter().enumerate() {
            helper.cursor().index0 = index0;
            state.set_local("loop", helper_value.clone());
            state.assign(&pieces.target, item, false)?;
            if (pieces.body)(state, out)? == Flow::Break {
                break;
            }
        }
        Ok(())
    })
}
