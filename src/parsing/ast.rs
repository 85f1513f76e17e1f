//! Syntax tree
//!
//!     The parser produces one [SyntaxTree] per template: the top-level statements plus a
//!     table of named blocks. Block bodies live only in that table; the place where a block
//!     appears in the body is a [StmtKind::Block] reference by name, so the tree stays a
//!     plain owned tree and inheritance can look blocks up independently.
//!
//!     Every node carries the line it started on. Extension authors build these nodes too:
//!     [ExprKind::ExtensionCall], [ExprKind::ContextReference], [ExprKind::MarkSafe],
//!     [ExprKind::MarkSafeIfAutoescape], [StmtKind::Scope] and [StmtKind::OverlayScope]
//!     exist mostly for them.

use indexmap::IndexMap;

use crate::runtime::ops::{BinOp, CmpOp};
use crate::runtime::Value;

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub body: Vec<Stmt>,
    pub blocks: IndexMap<String, BlockDef>,
}

#[derive(Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    pub body: Vec<Stmt>,
    pub scoped: bool,
    pub required: bool,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Expr { kind, line }
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn constant(value: impl Into<Value>, line: usize) -> Self {
        Expr::new(ExprKind::Const(value.into()), line)
    }

    pub fn name(name: impl Into<String>, line: usize) -> Self {
        Expr::new(ExprKind::Name(name.into()), line)
    }

    /// The constant value, if this is a literal.
    pub fn as_const(&self) -> Option<&Value> {
        match &self.kind {
            ExprKind::Const(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
    /// `*args`
    pub dyn_args: Option<Box<Expr>>,
    /// `**kwargs`
    pub dyn_kwargs: Option<Box<Expr>>,
}

impl CallArgs {
    pub fn positional(args: Vec<Expr>) -> Self {
        CallArgs {
            args,
            ..CallArgs::default()
        }
    }

    pub(crate) fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        for arg in &self.args {
            f(arg);
        }
        for (_, arg) in &self.kwargs {
            f(arg);
        }
        if let Some(arg) = &self.dyn_args {
            f(arg);
        }
        if let Some(arg) = &self.dyn_kwargs {
            f(arg);
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal markup between tags. Never escaped.
    TemplateData(String),
    Const(Value),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `a ~ b ~ c`
    Concat(Vec<Expr>),
    /// `a < b <= c`: chained comparisons.
    Compare {
        expr: Box<Expr>,
        ops: Vec<(CmpOp, Expr)>,
    },
    /// `then if test else otherwise`
    Cond {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    GetAttr {
        expr: Box<Expr>,
        attr: String,
    },
    GetItem {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        expr: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        callee: Box<Expr>,
        args: CallArgs,
    },
    /// `input|name(args)`. A missing input stands for captured block output
    /// (`{% filter %}` and `{% set x | f %}`).
    Filter {
        input: Option<Box<Expr>>,
        name: String,
        args: CallArgs,
    },
    Test {
        expr: Box<Expr>,
        name: String,
        args: CallArgs,
    },
    /// Call a method on the extension with the given identifier at render time.
    ExtensionCall {
        extension: String,
        method: String,
        args: CallArgs,
    },
    /// The active context, optionally with the visible local variables folded in.
    ContextReference { with_locals: bool },
    MarkSafe(Box<Expr>),
    /// Mark safe only when autoescaping is active.
    MarkSafeIfAutoescape(Box<Expr>),
}

impl ExprKind {
    /// Short node name used in "can't assign to" errors.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::TemplateData(_) => "template data",
            ExprKind::Const(_) => "const",
            ExprKind::Name(_) => "name",
            ExprKind::List(_) => "list",
            ExprKind::Tuple(_) => "tuple",
            ExprKind::Dict(_) => "dict",
            ExprKind::Unary { .. } => "unary expression",
            ExprKind::Binary { .. } | ExprKind::And(..) | ExprKind::Or(..) => "binary expression",
            ExprKind::Concat(_) => "concat",
            ExprKind::Compare { .. } => "compare",
            ExprKind::Cond { .. } => "condexpr",
            ExprKind::GetAttr { .. } => "getattr",
            ExprKind::GetItem { .. } => "getitem",
            ExprKind::Slice { .. } => "slice",
            ExprKind::Call { .. } => "call",
            ExprKind::Filter { .. } => "filter",
            ExprKind::Test { .. } => "test",
            ExprKind::ExtensionCall { .. } => "extension call",
            ExprKind::ContextReference { .. } => "context reference",
            ExprKind::MarkSafe(_) | ExprKind::MarkSafeIfAutoescape(_) => "markup",
        }
    }
}

/// Assignment destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    /// `ns.attr`, only valid on namespace objects.
    Attr { name: String, attr: String },
}

impl Target {
    /// Names bound by this target, in order.
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Target::Name(name) => out.push(name),
            Target::Tuple(items) => {
                for item in items {
                    item.collect_names(out);
                }
            }
            Target::Attr { .. } => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ForLoop {
    pub target: Target,
    pub iter: Expr,
    pub filter: Option<Expr>,
    pub body: Vec<Stmt>,
    pub else_body: Vec<Stmt>,
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: usize) -> Self {
        Stmt { kind, line }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Output(Vec<Expr>),
    If {
        test: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    For(Box<ForLoop>),
    /// Where a named block renders; the body lives in [SyntaxTree::blocks].
    Block(String),
    Extends(Expr),
    Include {
        template: Expr,
        with_context: bool,
        ignore_missing: bool,
    },
    Import {
        template: Expr,
        target: String,
        with_context: bool,
    },
    FromImport {
        template: Expr,
        /// (name, alias)
        names: Vec<(String, Option<String>)>,
        with_context: bool,
    },
    Macro(MacroDef),
    /// `{% call(params) macro(args) %}body{% endcall %}`; the body becomes `caller`.
    CallBlock {
        call: Expr,
        caller: MacroDef,
    },
    FilterBlock {
        filter: Expr,
        body: Vec<Stmt>,
    },
    With {
        assignments: Vec<(Target, Expr)>,
        body: Vec<Stmt>,
    },
    Assign {
        target: Target,
        value: Expr,
    },
    AssignBlock {
        target: Target,
        filter: Option<Expr>,
        body: Vec<Stmt>,
    },
    /// Evaluate and discard.
    ExprStmt(Expr),
    Continue,
    Break,
    /// A plain nested scope.
    Scope(Vec<Stmt>),
    /// A scope whose variables come from a mapping computed at render time.
    OverlayScope {
        context: Expr,
        body: Vec<Stmt>,
    },
    AutoEscape {
        value: Expr,
        body: Vec<Stmt>,
    },
}

impl StmtKind {
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Output(_) => "output",
            StmtKind::If { .. } => "if",
            StmtKind::For(_) => "for",
            StmtKind::Block(_) => "block",
            StmtKind::Extends(_) => "extends",
            StmtKind::Include { .. } => "include",
            StmtKind::Import { .. } => "import",
            StmtKind::FromImport { .. } => "from",
            StmtKind::Macro(_) => "macro",
            StmtKind::CallBlock { .. } => "call",
            StmtKind::FilterBlock { .. } => "filter",
            StmtKind::With { .. } => "with",
            StmtKind::Assign { .. } => "set",
            StmtKind::AssignBlock { .. } => "set block",
            StmtKind::ExprStmt(_) => "do",
            StmtKind::Continue => "continue",
            StmtKind::Break => "break",
            StmtKind::Scope(_) => "scope",
            StmtKind::OverlayScope { .. } => "overlay",
            StmtKind::AutoEscape { .. } => "autoescape",
        }
    }
}

/// Visit every expression directly owned by `expr` (not `expr` itself).
pub(crate) fn walk_expr_children<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a Expr)) {
    match &expr.kind {
        ExprKind::TemplateData(_)
        | ExprKind::Const(_)
        | ExprKind::Name(_)
        | ExprKind::ContextReference { .. } => {}
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Concat(items) => {
            items.iter().for_each(|e| f(e))
        }
        ExprKind::Dict(pairs) => {
            for (k, v) in pairs {
                f(k);
                f(v);
            }
        }
        ExprKind::Unary { operand, .. } => f(operand),
        ExprKind::Binary { left, right, .. } => {
            f(left);
            f(right);
        }
        ExprKind::And(a, b) | ExprKind::Or(a, b) => {
            f(a);
            f(b);
        }
        ExprKind::Compare { expr, ops } => {
            f(expr);
            for (_, e) in ops {
                f(e);
            }
        }
        ExprKind::Cond {
            test,
            then,
            otherwise,
        } => {
            f(test);
            f(then);
            if let Some(e) = otherwise {
                f(e);
            }
        }
        ExprKind::GetAttr { expr, .. } => f(expr),
        ExprKind::GetItem { expr, index } => {
            f(expr);
            f(index);
        }
        ExprKind::Slice {
            expr,
            start,
            stop,
            step,
        } => {
            f(expr);
            for e in [start, stop, step].into_iter().flatten() {
                f(e);
            }
        }
        ExprKind::Call { callee, args } => {
            f(callee);
            args.walk(f);
        }
        ExprKind::Filter { input, args, .. } => {
            if let Some(e) = input {
                f(e);
            }
            args.walk(f);
        }
        ExprKind::Test { expr, args, .. } => {
            f(expr);
            args.walk(f);
        }
        ExprKind::ExtensionCall { args, .. } => args.walk(f),
        ExprKind::MarkSafe(e) | ExprKind::MarkSafeIfAutoescape(e) => f(e),
    }
}

/// Every name read anywhere inside `expr`.
pub(crate) fn collect_expr_names<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    if let ExprKind::Name(name) = &expr.kind {
        out.push(name);
        return;
    }
    walk_expr_children(expr, &mut |child| collect_expr_names(child, out));
}

/// Every name read anywhere inside `stmts`, nested bodies included. Block bodies are not
/// part of the statement tree and are not visited.
pub(crate) fn collect_stmt_names<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a str>) {
    for stmt in stmts {
        let mut expr = |e: &'a Expr| collect_expr_names(e, out);
        match &stmt.kind {
            StmtKind::Output(exprs) => exprs.iter().for_each(&mut expr),
            StmtKind::If {
                test,
                body,
                else_body,
            } => {
                expr(test);
                collect_stmt_names(body, out);
                collect_stmt_names(else_body, out);
            }
            StmtKind::For(for_loop) => {
                expr(&for_loop.iter);
                if let Some(filter) = &for_loop.filter {
                    expr(filter);
                }
                collect_stmt_names(&for_loop.body, out);
                collect_stmt_names(&for_loop.else_body, out);
            }
            StmtKind::Extends(template) | StmtKind::ExprStmt(template) => expr(template),
            StmtKind::Include { template, .. }
            | StmtKind::Import { template, .. }
            | StmtKind::FromImport { template, .. } => expr(template),
            StmtKind::Macro(def) => collect_macro_names(def, out),
            StmtKind::CallBlock { call, caller } => {
                expr(call);
                collect_macro_names(caller, out);
            }
            StmtKind::FilterBlock { filter, body } => {
                expr(filter);
                collect_stmt_names(body, out);
            }
            StmtKind::With { assignments, body } => {
                for (_, value) in assignments {
                    expr(value);
                }
                collect_stmt_names(body, out);
            }
            StmtKind::Assign { target, value } => {
                expr(value);
                collect_target_reads(target, out);
            }
            StmtKind::AssignBlock {
                target,
                filter,
                body,
            } => {
                if let Some(filter) = filter {
                    expr(filter);
                }
                collect_target_reads(target, out);
                collect_stmt_names(body, out);
            }
            StmtKind::OverlayScope { context, body } => {
                expr(context);
                collect_stmt_names(body, out);
            }
            StmtKind::AutoEscape { value, body } => {
                expr(value);
                collect_stmt_names(body, out);
            }
            StmtKind::Scope(body) => collect_stmt_names(body, out),
            StmtKind::Block(_) | StmtKind::Continue | StmtKind::Break => {}
        }
    }
}

fn collect_macro_names<'a>(def: &'a MacroDef, out: &mut Vec<&'a str>) {
    for param in &def.params {
        if let Some(default) = &param.default {
            collect_expr_names(default, out);
        }
    }
    collect_stmt_names(&def.body, out);
}

/// `{% set ns.attr = ... %}` reads `ns`.
fn collect_target_reads<'a>(target: &'a Target, out: &mut Vec<&'a str>) {
    match target {
        Target::Attr { name, .. } => out.push(name),
        Target::Tuple(items) => items.iter().for_each(|t| collect_target_reads(t, out)),
        Target::Name(_) => {}
    }
}
