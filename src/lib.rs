//! # templar
//!
//! A template compiler for the Jinja template language. Templates mix literal text with
//! `{{ expressions }}`, `{% statements %}` and `{# comments #}`; compiling one produces an
//! immutable program of closures that renders against any serializable context.
//!
//! ## Architecture
//!
//!     source ─▶ ext preprocess ─▶ lexing ─▶ ext stream filters ─▶ parsing ─▶ compiling
//!                                                                               │
//!                                   Template::render(ctx) ◀── runtime ◀─────────┘
//!
//! - [lexing]: delimiter-aware tokenizer and the peekable token stream.
//! - [parsing]: recursive-descent parser producing the [parsing::SyntaxTree].
//! - [compiling]: frame analysis, escaping resolution and closure generation.
//! - [runtime]: values, scopes, loops, macros, inheritance and the built-in filters.
//! - [ext]: the extension protocol and the built-in extensions.
//! - [pipeline]: the compile steps as composable stages.
//! - [environment]: settings, template loading and caching, the [Template] handle.
//!
//! ## Usage
//!
//!     let mut env = Environment::new();
//!     env.add_template("layout.html", "<h1>{% block title %}{% endblock %}</h1>")?;
//!     let page = env.template_from_str("{% extends 'layout.html' %}{% block title %}{{ user }}{% endblock %}")?;
//!     assert_eq!(page.render(json!({"user": "ann"}))?, "<h1>ann</h1>");
//!
//! ## Testing
//!
//! Parser tests should assert on trees with the fluent API in [testing].

pub mod compiling;
pub mod environment;
pub mod error;
pub mod ext;
pub mod lexing;
pub mod parsing;
pub mod pipeline;
pub mod runtime;
pub mod testing;

pub use environment::{
    Environment, Loader, MapLoader, Policies, Settings, SettingsLoader, Source, Template,
};
pub use error::{Error, ErrorKind, Result};
pub use ext::{EnvId, Extension};
pub use runtime::{Args, Object, State, UndefinedPolicy, Value};
