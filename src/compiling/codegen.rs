//! Statement code generation
//!
//!     [Codegen] walks a [SyntaxTree] once and turns every statement into an [Exec]
//!     closure. Expressions are handled in the sibling `expr` module. Names are resolved
//!     against the [Frames] arena while walking, so the generated closures already know
//!     whether to search local scopes or go straight to the context.
//!
//!     Output sites are specialized by the frame's escaping mode: literal template data is
//!     copied verbatim, constants are folded into the surrounding literal text (pre-escaped
//!     when escaping is statically on), and everything else escapes according to the static
//!     mode or, in volatile regions, the flag on the render state.
//!
//! Inheritance
//!
//!     Once an `{% extends %}` has been compiled at the top level, output and block sites
//!     that would still run as part of the top level are dropped: the parent template owns
//!     the output. Assignments, imports and macro definitions after it still run.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::frame::{collect_stores, EscapeMode, FrameId, FrameKind, Frames, Resolution};
use super::program::{CompiledBlock, CompiledTemplate, Eval, Exec, Flow};
use crate::environment::{Environment, FinalizeFn};
use crate::error::{Error, Result};
use crate::parsing::ast::{collect_expr_names, collect_stmt_names};
use crate::parsing::{BlockDef, Expr, ExprKind, MacroDef, Stmt, StmtKind, SyntaxTree, Target};
use crate::runtime::loops::{run_loop, LoopPieces};
use crate::runtime::macros::Macro;
use crate::runtime::markup::escape_value;
use crate::runtime::{State, UndefinedHint, Value};

/// Names a macro body may read that turn into implicit parameters.
const MACRO_SPECIALS: [&str; 3] = ["varargs", "kwargs", "caller"];

pub struct Codegen<'env> {
    pub(super) env: &'env Environment,
    pub(super) name: Arc<str>,
    pub(super) frames: Frames,
    /// The block whose body is being compiled, for `super()`.
    pub(super) block: Option<String>,
    extended: bool,
    scoped_blocks: HashSet<String>,
    finalize: Option<Arc<FinalizeFn>>,
}

/// Compile `tree`, parsed from `source`, into a renderable template named `name`.
pub fn compile(env: &Environment, tree: &SyntaxTree, name: &str, source: &str) -> Result<CompiledTemplate> {
    let autoescape = env.autoescape_for(name);
    let (frames, root) = Frames::root(EscapeMode::from_flag(autoescape), &tree.body);
    let mut codegen = Codegen {
        env,
        name: Arc::from(name),
        frames,
        block: None,
        extended: false,
        scoped_blocks: tree
            .blocks
            .values()
            .filter(|block| block.scoped)
            .map(|block| block.name.clone())
            .collect(),
        finalize: env.finalize(),
    };

    let body = codegen
        .stmts(&tree.body, root)
        .map_err(|err| err.with_location(Some(name), 1))?;
    let mut blocks = IndexMap::new();
    for block in tree.blocks.values() {
        let compiled = codegen
            .block(block, root)
            .map_err(|err| err.with_location(Some(name), block.line))?;
        blocks.insert(block.name.clone(), Arc::new(compiled));
    }
    let macros: Vec<String> = tree
        .body
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::Macro(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect();

    debug!(
        template = name,
        blocks = blocks.len(),
        macros = macros.len(),
        "compiled template"
    );
    Ok(CompiledTemplate {
        name: codegen.name,
        root: body,
        blocks,
        autoescape,
        macros,
        source: Arc::from(source),
    })
}

fn noop() -> Exec {
    Arc::new(|_, _| Ok(Flow::Normal))
}

/// Run `execs` in order, stopping at the first loop control.
fn sequence(mut execs: Vec<Exec>) -> Exec {
    match execs.len() {
        0 => noop(),
        1 => execs.remove(0),
        _ => Arc::new(move |state, out| {
            for exec in &execs {
                let flow = exec(state, out)?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
            Ok(Flow::Normal)
        }),
    }
}

/// Write a computed value at an output site.
pub(super) fn write_value(state: &State<'_>, value: &Value, mode: EscapeMode, out: &mut String) -> Result<()> {
    if mode.resolve(state) {
        out.push_str(&escape_value(value)?);
    } else {
        out.push_str(&value.to_output()?);
    }
    Ok(())
}

enum Piece {
    Text(String),
    /// An expression with the line it starts on.
    Value(Eval, usize),
}

/// The compile-time half of a macro: everything except the runtime captures.
struct MacroParts {
    name: String,
    params: Vec<String>,
    defaults: Vec<Option<Eval>>,
    body: Exec,
    catch_kwargs: bool,
    catch_varargs: bool,
    caller: bool,
    captures: Vec<String>,
}

impl MacroParts {
    fn instantiate(&self, state: &State<'_>) -> Value {
        let closure = self
            .captures
            .iter()
            .map(|name| (name.clone(), state.lookup(name)))
            .collect();
        Value::from_object(Macro {
            name: self.name.clone(),
            params: self.params.clone(),
            defaults: self.defaults.clone(),
            body: self.body.clone(),
            catch_kwargs: self.catch_kwargs,
            catch_varargs: self.catch_varargs,
            caller: self.caller,
            closure,
            ctx: state.context().clone(),
            template: state.name_arc(),
        })
    }
}

impl<'env> Codegen<'env> {
    pub(super) fn escape_mode(&self, frame: FrameId) -> EscapeMode {
        self.frames.get(frame).escape
    }

    /// Compile a statement list; each statement reports its own line on failure.
    pub(super) fn stmts(&mut self, body: &[Stmt], frame: FrameId) -> Result<Exec> {
        let mut execs = Vec::with_capacity(body.len());
        for stmt in body {
            let compiled = self
                .stmt(stmt, frame)
                .map_err(|err| err.with_location(Some(&self.name), stmt.line))?;
            let Some(exec) = compiled else {
                continue;
            };
            let name = self.name.clone();
            let line = stmt.line;
            execs.push(Arc::new(move |state: &mut State<'_>, out: &mut String| {
                exec(state, out).map_err(|err| err.with_location(Some(&name), line))
            }) as Exec);
        }
        Ok(sequence(execs))
    }

    fn soft_body(&mut self, body: &[Stmt], frame: FrameId, extra: &[&str]) -> Result<(Exec, FrameId)> {
        let mut stores = collect_stores(body);
        stores.extend(extra.iter().map(|name| name.to_string()));
        let inner = self.frames.push(frame, FrameKind::Soft, stores);
        Ok((self.stmts(body, inner)?, inner))
    }

    fn is_top_level(&self, frame: FrameId) -> bool {
        self.frames.get(frame).kind == FrameKind::Root
    }

    fn suppressed(&self, frame: FrameId) -> bool {
        self.extended && self.frames.in_root_region(frame)
    }

    fn stmt(&mut self, stmt: &Stmt, frame: FrameId) -> Result<Option<Exec>> {
        let line = stmt.line;
        let exec: Exec = match &stmt.kind {
            StmtKind::Output(exprs) => {
                if self.suppressed(frame) {
                    return Ok(None);
                }
                self.output(exprs, frame)?
            }
            StmtKind::If {
                test,
                body,
                else_body,
            } => {
                let test = self.expr(test, frame)?;
                let body = self.stmts(body, frame)?;
                let else_body = self.stmts(else_body, frame)?;
                Arc::new(move |state, out| {
                    if test(state)?.is_true()? {
                        body(state, out)
                    } else {
                        else_body(state, out)
                    }
                })
            }
            StmtKind::For(for_loop) => {
                let iter = self.expr(&for_loop.iter, frame)?;
                let mut extra: Vec<&str> = for_loop.target.names();
                extra.push("loop");
                let mut stores = collect_stores(&for_loop.body);
                stores.extend(extra.iter().map(|name| name.to_string()));
                let body_frame = self.frames.push(frame, FrameKind::Soft, stores);
                let filter = match &for_loop.filter {
                    Some(filter) => Some(self.expr(filter, body_frame)?),
                    None => None,
                };
                let body = self.stmts(&for_loop.body, body_frame)?;
                let else_body = if for_loop.else_body.is_empty() {
                    None
                } else {
                    Some(self.soft_body(&for_loop.else_body, frame, &[])?.0)
                };
                let pieces = Arc::new(LoopPieces {
                    target: for_loop.target.clone(),
                    filter,
                    body,
                    else_body,
                    recursive: for_loop.recursive,
                });
                Arc::new(move |state, out| {
                    let iterable = iter(state)?;
                    run_loop(state, &pieces, &iterable, 0, out)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::Block(name) => {
                if self.suppressed(frame) {
                    return Ok(None);
                }
                let name = name.clone();
                if self.scoped_blocks.contains(&name) {
                    Arc::new(move |state, out| {
                        let ctx = state.derived_context();
                        let template = state.name_arc();
                        state.with_context(ctx, template, |state| state.render_block(&name, out))?;
                        Ok(Flow::Normal)
                    })
                } else {
                    Arc::new(move |state, out| {
                        state.render_block(&name, out)?;
                        Ok(Flow::Normal)
                    })
                }
            }
            StmtKind::Extends(target) => {
                let target = self.expr(target, frame)?;
                if self.frames.in_root_region(frame) {
                    self.extended = true;
                }
                Arc::new(move |state, _| {
                    let parent = target(state)?;
                    state.extend(&parent)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::Include {
                template,
                with_context,
                ignore_missing,
            } => {
                if self.suppressed(frame) {
                    return Ok(None);
                }
                let template = self.expr(template, frame)?;
                let (with_context, ignore_missing) = (*with_context, *ignore_missing);
                Arc::new(move |state, out| {
                    let target = template(state)?;
                    state.include(&target, with_context, ignore_missing, out)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::Import {
                template,
                target,
                with_context,
            } => {
                let template = self.expr(template, frame)?;
                let target = target.clone();
                let with_context = *with_context;
                let top_level = self.is_top_level(frame);
                Arc::new(move |state, _| {
                    let name = template(state)?;
                    let module = state.import(&name, with_context)?;
                    bind_import(state, &target, module, top_level);
                    Ok(Flow::Normal)
                })
            }
            StmtKind::FromImport {
                template,
                names,
                with_context,
            } => {
                let template = self.expr(template, frame)?;
                let names = names.clone();
                let with_context = *with_context;
                let top_level = self.is_top_level(frame);
                Arc::new(move |state, _| {
                    let name = template(state)?;
                    let module = state.import(&name, with_context)?;
                    for (imported, alias) in &names {
                        let value = module
                            .as_object()
                            .and_then(|m| m.get_attr(imported))
                            .unwrap_or_else(|| {
                                Value::undefined(
                                    UndefinedHint::Message(format!(
                                        "the template {} (imported on line {}) does not export the requested name {}",
                                        name.repr(),
                                        line,
                                        Value::from(imported.as_str()).repr()
                                    )),
                                    state.undefined_policy(),
                                )
                            });
                        bind_import(state, alias.as_ref().unwrap_or(imported), value, top_level);
                    }
                    Ok(Flow::Normal)
                })
            }
            StmtKind::Macro(def) => {
                let parts = Arc::new(self.macro_parts(def, frame)?);
                let top_level = self.is_top_level(frame);
                Arc::new(move |state, _| {
                    let value = parts.instantiate(state);
                    if top_level {
                        state.set_context(&parts.name, value);
                    } else {
                        state.set_local(&parts.name, value);
                    }
                    Ok(Flow::Normal)
                })
            }
            StmtKind::CallBlock { call, caller } => {
                if self.suppressed(frame) {
                    return Ok(None);
                }
                let parts = Arc::new(self.macro_parts(caller, frame)?);
                let make_caller: Eval = Arc::new(move |state| Ok(parts.instantiate(state)));
                let ExprKind::Call { callee, args } = &call.kind else {
                    return Err(Error::assertion("call block expects a call expression", line));
                };
                let call = self.call(callee, args, frame, Some(make_caller))?;
                Arc::new(move |state, out| {
                    out.push_str(&call(state)?.to_output()?);
                    Ok(Flow::Normal)
                })
            }
            StmtKind::FilterBlock { filter, body } => {
                if self.suppressed(frame) {
                    return Ok(None);
                }
                let apply = self.filter_chain(filter, frame)?;
                let (body, inner) = self.soft_body(body, frame, &[])?;
                let mode = self.escape_mode(inner);
                Arc::new(move |state, out| {
                    let mut buf = String::new();
                    state.with_scope(IndexMap::new(), false, |state| body(state, &mut buf))?;
                    let captured = Value::from_output(buf, mode.resolve(state));
                    let value = apply(state, captured)?;
                    write_value(state, &value, mode, out)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::With { assignments, body } => {
                let values = assignments
                    .iter()
                    .map(|(target, value)| Ok((target.clone(), self.expr(value, frame)?)))
                    .collect::<Result<Vec<(Target, Eval)>>>()?;
                let targets: Vec<String> = assignments
                    .iter()
                    .flat_map(|(target, _)| target.names())
                    .map(str::to_string)
                    .collect();
                let extra: Vec<&str> = targets.iter().map(String::as_str).collect();
                let (body, _) = self.soft_body(body, frame, &extra)?;
                Arc::new(move |state, out| {
                    let evaluated = values
                        .iter()
                        .map(|(target, value)| Ok((target, value(state)?)))
                        .collect::<Result<Vec<_>>>()?;
                    state.with_scope(IndexMap::new(), false, |state| {
                        for (target, value) in evaluated {
                            state.assign(target, value, false)?;
                        }
                        body(state, out)
                    })
                })
            }
            StmtKind::Assign { target, value } => {
                let value = self.expr(value, frame)?;
                let target = target.clone();
                let top_level = self.is_top_level(frame);
                Arc::new(move |state, _| {
                    let value = value(state)?;
                    state.assign(&target, value, top_level)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::AssignBlock {
                target,
                filter,
                body,
            } => {
                let apply = match filter {
                    Some(filter) => Some(self.filter_chain(filter, frame)?),
                    None => None,
                };
                let (body, inner) = self.soft_body(body, frame, &[])?;
                let mode = self.escape_mode(inner);
                let target = target.clone();
                let top_level = self.is_top_level(frame);
                Arc::new(move |state, _| {
                    let mut buf = String::new();
                    state.with_scope(IndexMap::new(), false, |state| body(state, &mut buf))?;
                    let mut value = Value::from_output(buf, mode.resolve(state));
                    if let Some(apply) = &apply {
                        value = apply(state, value)?;
                    }
                    state.assign(&target, value, top_level)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::ExprStmt(expr) => {
                let expr = self.expr(expr, frame)?;
                Arc::new(move |state, _| {
                    expr(state)?;
                    Ok(Flow::Normal)
                })
            }
            StmtKind::Continue => Arc::new(|_, _| Ok(Flow::Continue)),
            StmtKind::Break => Arc::new(|_, _| Ok(Flow::Break)),
            StmtKind::Scope(body) => {
                let (body, _) = self.soft_body(body, frame, &[])?;
                Arc::new(move |state, out| state.with_scope(IndexMap::new(), false, |state| body(state, out)))
            }
            StmtKind::OverlayScope { context, body } => {
                let context = self.expr(context, frame)?;
                let inner = self.frames.push(frame, FrameKind::Soft, collect_stores(body));
                self.frames.get_mut(inner).dynamic = true;
                let body = self.stmts(body, inner)?;
                Arc::new(move |state, out| {
                    let vars = overlay_vars(&context(state)?)?;
                    state.with_scope(vars, false, |state| body(state, out))
                })
            }
            StmtKind::AutoEscape { value, body } => {
                let inner = self.frames.push(frame, FrameKind::Soft, collect_stores(body));
                self.frames.get_mut(inner).escape = match value.as_const() {
                    Some(flag) => EscapeMode::from_flag(flag.is_true()?),
                    None => EscapeMode::Volatile,
                };
                let value = self.expr(value, frame)?;
                let body = self.stmts(body, inner)?;
                Arc::new(move |state, out| {
                    let on = value(state)?.is_true()?;
                    let saved = state.set_autoescape(on);
                    let result = state.with_scope(IndexMap::new(), false, |state| body(state, out));
                    state.set_autoescape(saved);
                    result
                })
            }
        };
        Ok(Some(exec))
    }

    fn output(&mut self, exprs: &[Expr], frame: FrameId) -> Result<Exec> {
        let mode = self.escape_mode(frame);
        let mut pieces: Vec<Piece> = Vec::new();
        for expr in exprs {
            let folded = match &expr.kind {
                ExprKind::TemplateData(text) => Some(text.clone()),
                ExprKind::Const(value) if self.finalize.is_none() => match mode {
                    EscapeMode::StaticOn => Some(escape_value(value)?),
                    EscapeMode::StaticOff => Some(value.to_output()?),
                    EscapeMode::Volatile => None,
                },
                _ => None,
            };
            match (folded, pieces.last_mut()) {
                (Some(text), Some(Piece::Text(last))) => last.push_str(&text),
                (Some(text), _) => pieces.push(Piece::Text(text)),
                (None, _) => {
                    let eval = self
                        .expr(expr, frame)
                        .map_err(|err| err.with_location(Some(&self.name), expr.line))?;
                    pieces.push(Piece::Value(eval, expr.line));
                }
            }
        }

        let finalize = self.finalize.clone();
        let name = self.name.clone();
        if let [Piece::Text(text)] = pieces.as_slice() {
            let text = text.clone();
            return Ok(Arc::new(move |_, out| {
                out.push_str(&text);
                Ok(Flow::Normal)
            }));
        }
        Ok(Arc::new(move |state, out| {
            for piece in &pieces {
                match piece {
                    Piece::Text(text) => out.push_str(text),
                    Piece::Value(eval, line) => {
                        let located = |err: Error| err.with_location(Some(&name), *line);
                        let mut value = eval(state).map_err(located)?;
                        if let Some(finalize) = &finalize {
                            value = finalize(state, value).map_err(located)?;
                        }
                        write_value(state, &value, mode, out).map_err(located)?;
                    }
                }
            }
            Ok(Flow::Normal)
        }))
    }

    fn macro_parts(&mut self, def: &MacroDef, frame: FrameId) -> Result<MacroParts> {
        let params: Vec<String> = def.params.iter().map(|p| p.name.clone()).collect();
        let mut read = Vec::new();
        for param in &def.params {
            if let Some(default) = &param.default {
                collect_expr_names(default, &mut read);
            }
        }
        collect_stmt_names(&def.body, &mut read);
        let body_stores = collect_stores(&def.body);
        let reads_special = |special: &str| {
            read.contains(&special)
                && !params.iter().any(|p| p.as_str() == special)
                && !body_stores.contains(special)
        };
        let catch_varargs = reads_special("varargs");
        let catch_kwargs = reads_special("kwargs");
        let caller = reads_special("caller");

        let mut captures: Vec<String> = Vec::new();
        for name in &read {
            let declared = params.iter().any(|p| p.as_str() == *name) || MACRO_SPECIALS.contains(name);
            if declared || captures.iter().any(|c| c.as_str() == *name) {
                continue;
            }
            if self.frames.resolve(frame, name) == Resolution::Scope {
                captures.push(name.to_string());
            }
        }

        let mut stores = body_stores;
        stores.extend(params.iter().cloned());
        stores.extend(captures.iter().cloned());
        for (special, caught) in MACRO_SPECIALS.iter().zip([catch_varargs, catch_kwargs, caller]) {
            if caught {
                stores.insert(special.to_string());
            }
        }
        let inner = self.frames.push(frame, FrameKind::Hard, stores);
        let defaults = def
            .params
            .iter()
            .map(|p| p.default.as_ref().map(|d| self.expr(d, inner)).transpose())
            .collect::<Result<Vec<_>>>()?;
        let body = self.stmts(&def.body, inner)?;
        Ok(MacroParts {
            name: def.name.clone(),
            params,
            defaults,
            body,
            catch_kwargs,
            catch_varargs,
            caller,
            captures,
        })
    }

    fn block(&mut self, block: &BlockDef, root: FrameId) -> Result<CompiledBlock> {
        let inner = self
            .frames
            .push(root, FrameKind::Hard, collect_stores(&block.body));
        let saved = self.block.replace(block.name.clone());
        let saved_extended = std::mem::replace(&mut self.extended, false);
        let body = self.stmts(&block.body, inner);
        self.block = saved;
        self.extended = saved_extended;
        Ok(CompiledBlock {
            name: block.name.clone(),
            template: self.name.clone(),
            body: body?,
            scoped: block.scoped,
            required: block.required,
            line: block.line,
        })
    }
}

/// Imports bind in the context at the top level but are not exported.
fn bind_import(state: &mut State<'_>, name: &str, value: Value, top_level: bool) {
    if top_level {
        state.context().set(name, value);
    } else {
        state.set_local(name, value);
    }
}

fn overlay_vars(value: &Value) -> Result<IndexMap<String, Value>> {
    let map = value.as_map().ok_or_else(|| {
        Error::runtime(format!(
            "overlay scope expects a mapping, not '{}'",
            value.type_name()
        ))
    })?;
    Ok(map
        .iter()
        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use serde_json::json;

    fn render(source: &str, ctx: serde_json::Value) -> String {
        let env = Environment::new();
        env.template_from_str(source).unwrap().render(ctx).unwrap()
    }

    #[test]
    fn test_constants_fold_into_literal_text() {
        assert_eq!(render("a{{ 1 }}b{{ 'c' }}", json!({})), "a1bc");
    }

    #[test]
    fn test_loop_assignments_do_not_leak() {
        let out = render(
            "{% set x = 'outer' %}{% for i in [1] %}{% set x = 'inner' %}{{ x }}{% endfor %}|{{ x }}",
            json!({}),
        );
        assert_eq!(out, "inner|outer");
    }

    #[test]
    fn test_if_assignments_reach_the_top_level() {
        let out = render("{% if true %}{% set x = 1 %}{% endif %}{{ x }}", json!({}));
        assert_eq!(out, "1");
    }

    #[test]
    fn test_macro_captures_loop_variable() {
        let out = render(
            "{% for item in items %}{% macro show() %}[{{ item }}]{% endmacro %}{{ show() }}{% endfor %}",
            json!({"items": ["a", "b"]}),
        );
        assert_eq!(out, "[a][b]");
    }

    #[test]
    fn test_with_values_see_outer_bindings() {
        let out = render("{% set a = 1 %}{% with a = 2, b = a %}{{ a }}{{ b }}{% endwith %}{{ a }}", json!({}));
        assert_eq!(out, "211");
    }

    #[test]
    fn test_filter_block_and_set_block() {
        let out = render(
            "{% filter upper %}hi {{ name }}{% endfilter %}|{% set x | trim %}  pad  {% endset %}[{{ x }}]",
            json!({"name": "bob"}),
        );
        assert_eq!(out, "HI BOB|[pad]");
    }

    #[test]
    fn test_output_after_extends_is_dropped() {
        let env = Environment::new();
        env.add_template("base", "<{% block body %}{% endblock %}>").unwrap();
        let out = env
            .template_from_str("{% extends 'base' %}ignored{% block body %}kept{% endblock %}")
            .unwrap()
            .render(json!({}))
            .unwrap();
        assert_eq!(out, "<kept>");
    }
}
