//! Frame analysis
//!
//!     While generating code the compiler keeps one [Frame] per lexical nesting level, held
//!     in a [Frames] arena and addressed by [FrameId]. A frame records the names assigned
//!     directly in it, whether it is a hard boundary, and the escaping mode known for it.
//!
//!         - Root: the template's top level. Names stored here live in the context.
//!         - Soft: loop bodies, `with`, `filter`, set blocks, `autoescape`. They see the
//!           enclosing frames; their assignments do not leak out.
//!         - Hard: macro, caller and block bodies. Lookups stop at them and fall through to
//!           the context (plus whatever the frame captured explicitly).
//!
//!     Every soft or hard frame corresponds to exactly one runtime scope, so a name that
//!     resolves to a scope at compile time is found by [crate::runtime::State::lookup] at
//!     render time.
//!
//! Escaping
//!
//!     [EscapeMode] is decided per frame: statically on, statically off, or volatile when
//!     an `{% autoescape %}` tag depends on a value only known while rendering. Child frames
//!     inherit their parent's mode.

use std::collections::HashSet;

use crate::parsing::{Stmt, StmtKind};
use crate::runtime::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    Soft,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    StaticOn,
    StaticOff,
    Volatile,
}

impl EscapeMode {
    pub fn from_flag(on: bool) -> Self {
        if on {
            EscapeMode::StaticOn
        } else {
            EscapeMode::StaticOff
        }
    }

    /// The escaping decision known at compile time, if any.
    pub fn fixed(self) -> Option<bool> {
        match self {
            EscapeMode::StaticOn => Some(true),
            EscapeMode::StaticOff => Some(false),
            EscapeMode::Volatile => None,
        }
    }

    pub fn resolve(self, state: &State<'_>) -> bool {
        self.fixed().unwrap_or_else(|| state.autoescape())
    }
}

/// Where a name read is looked up at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Local scopes first, then the context.
    Scope,
    /// The context and globals only.
    Context,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub parent: Option<FrameId>,
    pub stores: HashSet<String>,
    /// Bindings only known at render time (overlay scopes): every read checks scopes.
    pub dynamic: bool,
    pub escape: EscapeMode,
}

#[derive(Debug, Default)]
pub struct Frames {
    frames: Vec<Frame>,
}

impl Frames {
    pub fn root(escape: EscapeMode, body: &[Stmt]) -> (Self, FrameId) {
        let mut frames = Frames::default();
        frames.frames.push(Frame {
            kind: FrameKind::Root,
            parent: None,
            stores: collect_stores(body),
            dynamic: false,
            escape,
        });
        (frames, FrameId(0))
    }

    /// Open a child frame inheriting the parent's escaping mode.
    pub fn push(&mut self, parent: FrameId, kind: FrameKind, stores: HashSet<String>) -> FrameId {
        let escape = self.get(parent).escape;
        self.frames.push(Frame {
            kind,
            parent: Some(parent),
            stores,
            dynamic: false,
            escape,
        });
        FrameId(self.frames.len() - 1)
    }

    pub fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id.0]
    }

    pub fn get_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0]
    }

    pub fn resolve(&self, from: FrameId, name: &str) -> Resolution {
        let mut current = Some(from);
        while let Some(id) = current {
            let frame = self.get(id);
            if frame.dynamic {
                return Resolution::Scope;
            }
            if frame.stores.contains(name) {
                return match frame.kind {
                    FrameKind::Root => Resolution::Context,
                    _ => Resolution::Scope,
                };
            }
            if frame.kind == FrameKind::Hard {
                return Resolution::Context;
            }
            current = frame.parent;
        }
        Resolution::Context
    }

    /// Whether code in `id` runs as part of the template's top level (not inside a macro,
    /// caller or block body).
    pub fn in_root_region(&self, id: FrameId) -> bool {
        let mut current = Some(id);
        while let Some(frame) = current.map(|id| self.get(id)) {
            match frame.kind {
                FrameKind::Root => return true,
                FrameKind::Hard => return false,
                FrameKind::Soft => current = frame.parent,
            }
        }
        false
    }
}

/// Names assigned directly in `body`: `set` targets, macro names and import targets.
/// `if` branches belong to the enclosing frame; other nested bodies open their own.
pub fn collect_stores(body: &[Stmt]) -> HashSet<String> {
    let mut out = HashSet::new();
    collect_into(body, &mut out);
    out
}

fn collect_into(body: &[Stmt], out: &mut HashSet<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Assign { target, .. } | StmtKind::AssignBlock { target, .. } => {
                out.extend(target.names().into_iter().map(str::to_string));
            }
            StmtKind::Macro(def) => {
                out.insert(def.name.clone());
            }
            StmtKind::Import { target, .. } => {
                out.insert(target.clone());
            }
            StmtKind::FromImport { names, .. } => {
                for (name, alias) in names {
                    out.insert(alias.clone().unwrap_or_else(|| name.clone()));
                }
            }
            StmtKind::If {
                body, else_body, ..
            } => {
                collect_into(body, out);
                collect_into(else_body, out);
            }
            _ => {}
        }
    }
}
