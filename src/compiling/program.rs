//! Compiled artifacts
//!
//!     Code generation turns every statement into an [Exec] closure and every expression
//!     into an [Eval] closure. A [CompiledTemplate] is the top-level closure plus one
//!     [CompiledBlock] per named block; both are immutable and can be rendered from many
//!     threads at once, each render bringing its own [State].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::runtime::{State, Value};

/// How a statement finished: normally, or through a loop control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

/// A compiled statement (or statement list) writing into the output buffer.
pub type Exec = Arc<dyn Fn(&mut State<'_>, &mut String) -> Result<Flow> + Send + Sync>;

/// A compiled expression.
pub type Eval = Arc<dyn Fn(&mut State<'_>) -> Result<Value> + Send + Sync>;

pub struct CompiledBlock {
    pub name: String,
    /// The template the block was written in.
    pub template: Arc<str>,
    pub body: Exec,
    pub scoped: bool,
    pub required: bool,
    pub line: usize,
}

impl fmt::Debug for CompiledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledBlock")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("scoped", &self.scoped)
            .field("required", &self.required)
            .finish()
    }
}

pub struct CompiledTemplate {
    pub name: Arc<str>,
    pub root: Exec,
    pub blocks: IndexMap<String, Arc<CompiledBlock>>,
    /// Initial escaping flag for renders of this template.
    pub autoescape: bool,
    /// Name of every macro defined at the top level.
    pub macros: Vec<String>,
    /// The source the template was compiled from, for error excerpts.
    pub source: Arc<str>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .field("autoescape", &self.autoescape)
            .field("macros", &self.macros)
            .finish()
    }
}
