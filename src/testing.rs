//! Fluent assertions over syntax trees
//!
//!     Matching on nested statement enums by hand buries what a parser test is about. The
//!     builders here walk a [SyntaxTree] and panic with the path of the offending node:
//!
//!         assert_template(&tree)
//!             .stmt_count(2)
//!             .stmt(0, |s| {
//!                 s.is("set").assigns(&["x"]);
//!             })
//!             .stmt(1, |s| {
//!                 s.assert_for().targets(&["item"]).body(0, |b| {
//!                     b.assert_output().data(0, "-");
//!                 });
//!             });

use crate::parsing::{BlockDef, Expr, ExprKind, Stmt, StmtKind, SyntaxTree};

/// Start asserting on a parsed template.
pub fn assert_template(tree: &SyntaxTree) -> TreeAssertion<'_> {
    TreeAssertion { tree }
}

fn summarize(stmts: &[Stmt]) -> String {
    stmts
        .iter()
        .map(|s| s.kind.describe())
        .collect::<Vec<_>>()
        .join(", ")
}

fn nth<'a>(stmts: &'a [Stmt], index: usize, context: &str) -> &'a Stmt {
    assert!(
        index < stmts.len(),
        "{}: statement index {} out of bounds ({} statements: [{}])",
        context,
        index,
        stmts.len(),
        summarize(stmts)
    );
    &stmts[index]
}

pub struct TreeAssertion<'a> {
    tree: &'a SyntaxTree,
}

impl<'a> TreeAssertion<'a> {
    pub fn stmt_count(self, expected: usize) -> Self {
        let actual = self.tree.body.len();
        assert_eq!(
            actual,
            expected,
            "Expected {} top-level statements, found {}: [{}]",
            expected,
            actual,
            summarize(&self.tree.body)
        );
        self
    }

    pub fn stmt<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(StmtAssertion<'a>),
    {
        let stmt = nth(&self.tree.body, index, "body");
        assertion(StmtAssertion {
            stmt,
            context: format!("body[{}]", index),
        });
        self
    }

    /// Block names in definition order.
    pub fn block_names(self, expected: &[&str]) -> Self {
        let actual: Vec<&str> = self.tree.blocks.keys().map(String::as_str).collect();
        assert_eq!(actual, expected, "Block names differ");
        self
    }

    pub fn block<F>(self, name: &str, assertion: F) -> Self
    where
        F: FnOnce(BlockAssertion<'a>),
    {
        let Some(block) = self.tree.blocks.get(name) else {
            panic!(
                "Expected a block named '{}', found [{}]",
                name,
                self.tree.blocks.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };
        assertion(BlockAssertion { block });
        self
    }
}

pub struct StmtAssertion<'a> {
    stmt: &'a Stmt,
    context: String,
}

impl<'a> StmtAssertion<'a> {
    /// Assert the statement kind by its tag name (`"for"`, `"set"`, `"output"`, ...).
    pub fn is(self, kind: &str) -> Self {
        assert_eq!(
            self.stmt.kind.describe(),
            kind,
            "{}: expected a '{}' statement",
            self.context,
            kind
        );
        self
    }

    pub fn line(self, expected: usize) -> Self {
        assert_eq!(self.stmt.line, expected, "{}: line differs", self.context);
        self
    }

    /// Assert the names bound by a `set` statement.
    pub fn assigns(self, expected: &[&str]) -> Self {
        let target = match &self.stmt.kind {
            StmtKind::Assign { target, .. } | StmtKind::AssignBlock { target, .. } => target,
            other => panic!("{}: expected an assignment, found '{}'", self.context, other.describe()),
        };
        assert_eq!(target.names(), expected, "{}: assigned names differ", self.context);
        self
    }

    pub fn assert_output(self) -> OutputAssertion<'a> {
        match &self.stmt.kind {
            StmtKind::Output(nodes) => OutputAssertion {
                nodes,
                context: self.context,
            },
            other => panic!("{}: expected output, found '{}'", self.context, other.describe()),
        }
    }

    pub fn assert_for(self) -> BodyAssertion<'a> {
        match &self.stmt.kind {
            StmtKind::For(for_loop) => BodyAssertion {
                targets: for_loop.target.names(),
                body: &for_loop.body,
                else_body: &for_loop.else_body,
                context: self.context,
            },
            other => panic!("{}: expected for, found '{}'", self.context, other.describe()),
        }
    }

    pub fn assert_if(self) -> BodyAssertion<'a> {
        match &self.stmt.kind {
            StmtKind::If {
                body, else_body, ..
            } => BodyAssertion {
                targets: Vec::new(),
                body,
                else_body,
                context: self.context,
            },
            other => panic!("{}: expected if, found '{}'", self.context, other.describe()),
        }
    }

    /// Any statement with a single nested body: macro, filter, with, scope, overlay,
    /// autoescape and set blocks.
    pub fn assert_scope(self) -> BodyAssertion<'a> {
        let body = match &self.stmt.kind {
            StmtKind::Macro(def) => &def.body,
            StmtKind::FilterBlock { body, .. }
            | StmtKind::With { body, .. }
            | StmtKind::Scope(body)
            | StmtKind::OverlayScope { body, .. }
            | StmtKind::AutoEscape { body, .. }
            | StmtKind::AssignBlock { body, .. } => body,
            other => panic!("{}: expected a scoped body, found '{}'", self.context, other.describe()),
        };
        BodyAssertion {
            targets: Vec::new(),
            body,
            else_body: &[],
            context: self.context,
        }
    }
}

pub struct OutputAssertion<'a> {
    nodes: &'a [Expr],
    context: String,
}

impl<'a> OutputAssertion<'a> {
    pub fn node_count(self, expected: usize) -> Self {
        assert_eq!(self.nodes.len(), expected, "{}: output node count differs", self.context);
        self
    }

    /// Assert node `index` is literal template data equal to `text`.
    pub fn data(self, index: usize, text: &str) -> Self {
        match self.nodes.get(index).map(|n| &n.kind) {
            Some(ExprKind::TemplateData(actual)) => {
                assert_eq!(actual, text, "{}.nodes[{}]: data differs", self.context, index)
            }
            Some(other) => panic!(
                "{}.nodes[{}]: expected template data, found '{}'",
                self.context,
                index,
                other.describe()
            ),
            None => panic!("{}.nodes[{}]: no such node", self.context, index),
        }
        self
    }

    /// Assert node `index` is an expression of the given kind (`"name"`, `"call"`, ...).
    pub fn expr(self, index: usize, kind: &str) -> Self {
        let actual = self
            .nodes
            .get(index)
            .map(|n| n.kind.describe())
            .unwrap_or("nothing");
        assert_eq!(actual, kind, "{}.nodes[{}]: expression kind differs", self.context, index);
        self
    }
}

pub struct BodyAssertion<'a> {
    targets: Vec<&'a str>,
    body: &'a [Stmt],
    else_body: &'a [Stmt],
    context: String,
}

impl<'a> BodyAssertion<'a> {
    pub fn targets(self, expected: &[&str]) -> Self {
        assert_eq!(self.targets, expected, "{}: loop targets differ", self.context);
        self
    }

    pub fn body_count(self, expected: usize) -> Self {
        assert_eq!(
            self.body.len(),
            expected,
            "{}: expected {} statements in body, found [{}]",
            self.context,
            expected,
            summarize(self.body)
        );
        self
    }

    pub fn else_count(self, expected: usize) -> Self {
        assert_eq!(
            self.else_body.len(),
            expected,
            "{}: expected {} statements in else body, found [{}]",
            self.context,
            expected,
            summarize(self.else_body)
        );
        self
    }

    pub fn body<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(StmtAssertion<'a>),
    {
        let context = format!("{}.body[{}]", self.context, index);
        let stmt = nth(self.body, index, &context);
        assertion(StmtAssertion { stmt, context });
        self
    }

    pub fn else_body<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(StmtAssertion<'a>),
    {
        let context = format!("{}.else[{}]", self.context, index);
        let stmt = nth(self.else_body, index, &context);
        assertion(StmtAssertion { stmt, context });
        self
    }
}

pub struct BlockAssertion<'a> {
    block: &'a BlockDef,
}

impl<'a> BlockAssertion<'a> {
    pub fn scoped(self, expected: bool) -> Self {
        assert_eq!(self.block.scoped, expected, "block '{}': scoped differs", self.block.name);
        self
    }

    pub fn required(self, expected: bool) -> Self {
        assert_eq!(self.block.required, expected, "block '{}': required differs", self.block.name);
        self
    }

    pub fn body_count(self, expected: usize) -> Self {
        assert_eq!(
            self.block.body.len(),
            expected,
            "block '{}': expected {} statements, found [{}]",
            self.block.name,
            expected,
            summarize(&self.block.body)
        );
        self
    }

    pub fn body<F>(self, index: usize, assertion: F) -> Self
    where
        F: FnOnce(StmtAssertion<'a>),
    {
        let context = format!("blocks['{}'][{}]", self.block.name, index);
        let stmt = nth(&self.block.body, index, &context);
        assertion(StmtAssertion { stmt, context });
        self
    }
}
