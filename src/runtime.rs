//! Runtime for compiled templates
//!
//!     Compiled templates are trees of closures; this module holds everything those
//!     closures operate on:
//!         - [value]: the value model and the [Object] trait for host values.
//!         - [undefined]: the deferred-error sentinel and its policies.
//!         - [markup]: HTML escaping and `%` formatting.
//!         - [ops]: operators, attribute access and builtin methods.
//!         - [state]: the per-render [State]: context, scopes, escaping flag, block chains.
//!         - [loops]: the `loop` helper and the loop driver.
//!         - [macros]: macro objects and argument binding.
//!         - [builtins]: the default filters, tests and globals.
//!
//!     A [State] is created fresh for every render call (and for every include or import
//!     performed during one) and is never shared between renders.

pub mod builtins;
pub mod loops;
pub mod macros;
pub mod markup;
pub mod ops;
pub mod state;
pub mod undefined;
pub mod value;

pub use builtins::{FilterFn, TestFn};
pub use markup::escape;
pub use state::{Context, State};
pub use undefined::{Undefined, UndefinedHint, UndefinedPolicy};
pub use value::{Args, Function, List, NativeFn, Object, StringKind, Value, ValueMap};
