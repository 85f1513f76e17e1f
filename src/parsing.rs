//! Parsing module for templates
//!
//!     This module turns a token stream into a [SyntaxTree](ast::SyntaxTree):
//!         1. Statements: See [parser] for the recursive-descent statement grammar, tag
//!            dispatch to extensions and the structural checks (matching end tags, block
//!            uniqueness, `extends` placement, loop controls).
//!         2. Expressions: See [expr] for precedence climbing over the expression grammar.
//!         3. Nodes: See [ast] for the tree itself.
//!
//! Parsing End To End
//!
//!     A body is a sequence of literal data, `{{ expression }}` output and `{% statement %}`
//!     nodes, read until the end of the stream or until one of the caller's terminator
//!     keywords shows up. Every block-style statement parses its own body recursively with
//!     its end tags as terminators, so mismatches are caught where they occur and reported
//!     with the tag that is still open.
//!
//!     Tags the core grammar does not know are looked up in the extension registry; the
//!     owning extension receives the [Parser] positioned on its tag name and must consume
//!     everything through its own end tag.

pub mod ast;
pub mod expr;
pub mod parser;

pub use ast::{
    BlockDef, CallArgs, Expr, ExprKind, ForLoop, MacroDef, Param, Stmt, StmtKind, SyntaxTree,
    Target, UnaryOp,
};
pub use parser::Parser;
