//! Pipeline stages
//!
//!     Each stage borrows the environment whose settings and extensions it applies. Errors
//!     leave a stage with the template name, a line and an excerpt of the offending source.

use tracing::trace;

use super::{Runnable, TemplateSource};
use crate::compiling::{codegen, CompiledTemplate};
use crate::environment::{Environment, STRING_TEMPLATE_NAME};
use crate::error::{Error, Result};
use crate::lexing::{Token, TokenIter, TokenStream, Tokenizer};
use crate::parsing::{Parser, SyntaxTree};

/// A parsed template together with the (preprocessed) source it came from.
#[derive(Debug)]
pub struct Parsed {
    pub source: TemplateSource,
    pub tree: SyntaxTree,
}

fn locate(err: Error, source: &TemplateSource) -> Error {
    err.with_location(source.name.as_deref(), 1)
        .with_source(&source.text)
}

/// Runs every extension's preprocessor over the raw text.
pub struct Preprocess<'env> {
    env: &'env Environment,
}

impl<'env> Preprocess<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Preprocess { env }
    }
}

impl Runnable<TemplateSource, TemplateSource> for Preprocess<'_> {
    fn run(&self, input: TemplateSource) -> Result<TemplateSource> {
        let TemplateSource {
            name,
            filename,
            text,
        } = input;
        let text = self
            .env
            .preprocess(&text, name.as_deref(), filename.as_deref())
            .map_err(|err| err.with_location(name.as_deref(), 1))?;
        Ok(TemplateSource {
            name,
            filename,
            text,
        })
    }
}

/// The filtered token stream of a source, for the borrowed lifetime of its text.
fn filtered_tokens<'a>(env: &'a Environment, text: &'a str) -> TokenIter<'a> {
    let tokens: TokenIter<'a> = Box::new(Tokenizer::new(text, env.syntax(), &env.whitespace()));
    env.extensions().filter_stream(tokens)
}

/// Lexes eagerly, applying extension stream filters.
pub struct Lex<'env> {
    env: &'env Environment,
}

impl<'env> Lex<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Lex { env }
    }
}

impl Runnable<TemplateSource, Vec<Token>> for Lex<'_> {
    fn run(&self, input: TemplateSource) -> Result<Vec<Token>> {
        filtered_tokens(self.env, &input.text)
            .collect::<Result<Vec<_>>>()
            .map_err(|err| locate(err, &input))
    }
}

/// Parses a source into a syntax tree, pulling tokens through the stream filters.
pub struct Parse<'env> {
    env: &'env Environment,
}

impl<'env> Parse<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Parse { env }
    }
}

impl Runnable<TemplateSource, Parsed> for Parse<'_> {
    fn run(&self, input: TemplateSource) -> Result<Parsed> {
        let tree = {
            let tokens = filtered_tokens(self.env, &input.text);
            TokenStream::new(tokens)
                .and_then(|stream| {
                    Parser::new(
                        stream,
                        input.name.as_deref(),
                        self.env.extensions(),
                        self.env.policies(),
                    )
                    .parse()
                })
                .map_err(|err| locate(err, &input))?
        };
        trace!(
            template = input.name.as_deref().unwrap_or(STRING_TEMPLATE_NAME),
            statements = tree.body.len(),
            blocks = tree.blocks.len(),
            "parsed template"
        );
        Ok(Parsed { source: input, tree })
    }
}

/// Generates the renderable closures for a parsed template.
pub struct Compile<'env> {
    env: &'env Environment,
}

impl<'env> Compile<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Compile { env }
    }
}

impl Runnable<Parsed, CompiledTemplate> for Compile<'_> {
    fn run(&self, input: Parsed) -> Result<CompiledTemplate> {
        let Parsed { source, tree } = input;
        let name = source.name.as_deref().unwrap_or(STRING_TEMPLATE_NAME);
        codegen::compile(self.env, &tree, name, &source.text).map_err(|err| locate(err, &source))
    }
}
