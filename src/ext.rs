//! Extensions
//!
//!     Extensions hook into every stage of compiling a template: they may rewrite the source
//!     before lexing, filter the token stream, own statement tags the core grammar does not
//!     know, and answer calls from compiled code at render time. See [Extension] for the
//!     hooks and [Registry] for how an environment binds and orders them.
//!
//! Built-ins
//!
//!     - [i18n::I18nExtension]: `{% trans %}` blocks and the gettext callables.
//!     - [loopcontrols::LoopControlsExtension]: `{% break %}` and `{% continue %}`.
//!     - [do_stmt::DoExtension]: `{% do %}`.
//!     - [debug::DebugExtension]: `{% debug %}`.
//!
//!     Settings name them by their short names (`i18n`, `loopcontrols`, `do`, `debug`) or
//!     by identifier; [builtin] resolves both.

pub mod debug;
pub mod do_stmt;
pub mod i18n;
pub mod loopcontrols;
pub mod registry;

use std::sync::Arc;

pub use registry::{EnvId, Extension, ExtensionFactory, Registry, DEFAULT_PRIORITY};

/// The factory for a built-in extension, by short name or identifier.
pub fn builtin(name: &str) -> Option<ExtensionFactory> {
    let factory: ExtensionFactory = match name {
        "i18n" | i18n::IDENTIFIER => Arc::new(|env| Arc::new(i18n::I18nExtension::new(env))),
        "loopcontrols" | loopcontrols::IDENTIFIER => {
            Arc::new(|env| Arc::new(loopcontrols::LoopControlsExtension::new(env)))
        }
        "do" | do_stmt::IDENTIFIER => Arc::new(|env| Arc::new(do_stmt::DoExtension::new(env))),
        "debug" | debug::IDENTIFIER => Arc::new(|env| Arc::new(debug::DebugExtension::new(env))),
        _ => return None,
    };
    Some(factory)
}
