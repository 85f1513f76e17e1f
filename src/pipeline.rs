//! Compile pipeline
//!
//!     Compiling a template runs five steps: extension preprocessing of the raw source,
//!     lexing, extension stream filters, parsing and code generation. Each step is a stage
//!     implementing [Runnable]; a [Transform] chains stages whose output and input types
//!     line up, so the compiler rejects a pipeline assembled in the wrong order.
//!
//!         let compile = Transform::from_fn(Ok)
//!             .then(Preprocess::new(env))   // TemplateSource → TemplateSource
//!             .then(Parse::new(env))        // TemplateSource → Parsed
//!             .then(Compile::new(env));     // Parsed → CompiledTemplate
//!
//!     Lexing and stream filtering happen lazily inside [stages::Parse]: the parser pulls
//!     tokens through the filters as it goes. [stages::Lex] runs the same steps eagerly for
//!     tooling that wants the token list.
//!
//! Standard Pipelines
//!
//!     Stages borrow the environment they serve, so the standard pipelines are built on
//!     demand by [tokens], [syntax_tree] and [compiled] rather than kept in statics.

pub mod stages;

use crate::compiling::CompiledTemplate;
use crate::environment::Environment;
use crate::error::Result;
use crate::lexing::Token;

pub use stages::{Compile, Lex, Parse, Parsed, Preprocess};

/// A template source on its way through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// `None` for templates created from strings.
    pub name: Option<String>,
    pub filename: Option<String>,
    pub text: String,
}

impl TemplateSource {
    pub fn new(text: impl Into<String>, name: Option<&str>) -> Self {
        TemplateSource {
            name: name.map(str::to_string),
            filename: None,
            text: text.into(),
        }
    }
}

/// Anything that turns an `I` into an `O`.
pub trait Runnable<I, O> {
    fn run(&self, input: I) -> Result<O>;
}

/// A chain of stages from `I` to `O`.
pub struct Transform<'env, I, O> {
    run_fn: Box<dyn Fn(I) -> Result<O> + 'env>,
}

impl<'env, I, O> Transform<'env, I, O> {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(I) -> Result<O> + 'env,
    {
        Transform {
            run_fn: Box::new(f),
        }
    }

    /// Feed this transform's output into `stage`.
    pub fn then<O2, S>(self, stage: S) -> Transform<'env, I, O2>
    where
        S: Runnable<O, O2> + 'env,
        I: 'env,
        O: 'env,
        O2: 'env,
    {
        let prev_run = self.run_fn;
        Transform {
            run_fn: Box::new(move |input| {
                let intermediate = prev_run(input)?;
                stage.run(intermediate)
            }),
        }
    }

    pub fn run(&self, input: I) -> Result<O> {
        (self.run_fn)(input)
    }
}

impl<I, O> Runnable<I, O> for Transform<'_, I, O> {
    fn run(&self, input: I) -> Result<O> {
        Transform::run(self, input)
    }
}

/// Source to the token list the parser would see.
pub fn tokens(env: &Environment) -> Transform<'_, TemplateSource, Vec<Token>> {
    Transform::from_fn(Ok)
        .then(Preprocess::new(env))
        .then(Lex::new(env))
}

/// Source to syntax tree.
pub fn syntax_tree(env: &Environment) -> Transform<'_, TemplateSource, Parsed> {
    Transform::from_fn(Ok)
        .then(Preprocess::new(env))
        .then(Parse::new(env))
}

/// Source to renderable template.
pub fn compiled(env: &Environment) -> Transform<'_, TemplateSource, CompiledTemplate> {
    Transform::from_fn(Ok)
        .then(Preprocess::new(env))
        .then(Parse::new(env))
        .then(Compile::new(env))
}
