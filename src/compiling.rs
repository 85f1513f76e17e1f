//! Code generation
//!
//!     The compiler walks a [SyntaxTree](crate::parsing::SyntaxTree) once and produces a
//!     [CompiledTemplate]: a tree of closures for the top-level body plus one closure per
//!     named block, so a child template can replace any block independently.
//!
//!         - [frame]: compile-time scope analysis and the escaping mode of every region.
//!         - [codegen]: statements, output sites, macros and blocks.
//!         - [expr]: expressions, calls, filters and tests.
//!         - [program]: the compiled artifacts.
//!
//!     Compilation either succeeds completely or returns the first error; nothing partial
//!     is ever handed out.

pub mod codegen;
pub mod expr;
pub mod frame;
pub mod program;

pub use codegen::compile;
pub use frame::EscapeMode;
pub use program::{CompiledBlock, CompiledTemplate, Eval, Exec, Flow};
