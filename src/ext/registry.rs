//! Extension protocol and registry
//!
//!     An [Extension] can hook into three places of the compile pipeline: raw source
//!     before lexing ([Extension::preprocess]), the token sequence between lexing and
//!     parsing ([Extension::filter_stream]), and statement parsing for the tags it
//!     declares ([Extension::parse]). Nodes it emits may call back into it while rendering
//!     through [Extension::call_method].
//!
//! Binding
//!
//!     Extensions are registered as factories. Every environment builds its own instances
//!     from them, bound to its [EnvId], and an overlay rebuilds them all. An instance never
//!     sees another environment's state.
//!
//! Ordering
//!
//!     The registry keeps instances sorted by ascending priority. The sort is stable, so
//!     extensions with equal priority run in registration order. Preprocessing and stream
//!     filters apply in that order. When two extensions declare the same tag, the later one
//!     in that order owns it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::lexing::TokenIter;
use crate::parsing::{Parser, Stmt};
use crate::runtime::{Args, State, Value};

/// Priority of extensions that don't declare one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Identity of an environment, used to bind extension instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(u64);

impl EnvId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EnvId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

pub trait Extension: fmt::Debug + Send + Sync {
    /// Stable name, unique within an environment. Registering a second extension with the
    /// same identifier replaces the first.
    fn identifier(&self) -> &str;

    /// Statement keywords this extension parses.
    fn tags(&self) -> &[&str] {
        &[]
    }

    /// Lower runs earlier.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// The environment this instance is bound to.
    fn environment(&self) -> EnvId;

    /// Rewrite the raw source before it is lexed.
    fn preprocess(&self, source: String, _name: Option<&str>, _filename: Option<&str>) -> Result<String> {
        Ok(source)
    }

    /// Rewrite the token sequence. Must keep delimiters balanced.
    fn filter_stream<'a>(&'a self, stream: TokenIter<'a>) -> TokenIter<'a> {
        stream
    }

    /// Parse one of [Extension::tags]. The parser is positioned on the tag name; the hook
    /// must consume everything up to (not including) the closing block delimiter of its
    /// last tag.
    fn parse(&self, parser: &mut Parser<'_>) -> Result<Vec<Stmt>> {
        let line = parser.stream().line();
        Err(parser.fail(
            format!("extension '{}' does not parse tags", self.identifier()),
            line,
        ))
    }

    /// Runtime entry point for `ExtensionCall` nodes this extension emitted.
    fn call_method(&self, _state: &mut State<'_>, method: &str, _args: Args) -> Result<Value> {
        Err(Error::runtime(format!(
            "extension '{}' has no method '{}'",
            self.identifier(),
            method
        )))
    }
}

/// Builds an extension instance for an environment.
pub type ExtensionFactory = Arc<dyn Fn(EnvId) -> Arc<dyn Extension> + Send + Sync>;

/// The extensions of one environment.
#[derive(Clone, Default)]
pub struct Registry {
    env: Option<EnvId>,
    factories: Vec<ExtensionFactory>,
    extensions: Vec<Arc<dyn Extension>>,
    tags: IndexMap<String, usize>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.identifier()))
            .finish()
    }
}

impl Registry {
    pub fn new(env: EnvId) -> Self {
        Registry {
            env: Some(env),
            ..Registry::default()
        }
    }

    /// Instantiate `factory` for this registry's environment and insert it.
    pub fn add(&mut self, factory: ExtensionFactory) {
        let env = *self.env.get_or_insert_with(EnvId::next);
        let extension = factory(env);
        let position = self
            .extensions
            .iter()
            .position(|existing| existing.identifier() == extension.identifier());
        match position {
            Some(index) => {
                self.factories[index] = factory;
                self.extensions[index] = extension;
            }
            None => {
                self.factories.push(factory);
                self.extensions.push(extension);
            }
        }
        self.sort();
    }

    fn sort(&mut self) {
        let mut pairs: Vec<_> = self
            .factories
            .drain(..)
            .zip(self.extensions.drain(..))
            .collect();
        pairs.sort_by_key(|(_, ext)| ext.priority());
        let (factories, extensions): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.factories = factories;
        self.extensions = extensions;

        self.tags.clear();
        for (index, ext) in self.extensions.iter().enumerate() {
            for tag in ext.tags() {
                self.tags.insert(tag.to_string(), index);
            }
        }
        trace!(
            order = ?self.extensions.iter().map(|ext| ext.identifier()).collect::<Vec<_>>(),
            "extension order"
        );
    }

    /// Fresh instances of every extension, bound to `env`.
    pub fn rebind(&self, env: EnvId) -> Registry {
        let mut registry = Registry::new(env);
        for factory in &self.factories {
            registry.factories.push(factory.clone());
            registry.extensions.push(factory(env));
        }
        registry.sort();
        registry
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.extensions.iter()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions
            .iter()
            .find(|ext| ext.identifier() == identifier)
    }

    /// The extension owning statement keyword `tag`.
    pub fn for_tag(&self, tag: &str) -> Option<&Arc<dyn Extension>> {
        self.tags.get(tag).map(|&index| &self.extensions[index])
    }

    pub fn preprocess(&self, mut source: String, name: Option<&str>, filename: Option<&str>) -> Result<String> {
        for ext in &self.extensions {
            source = ext.preprocess(source, name, filename)?;
        }
        Ok(source)
    }

    pub fn filter_stream<'a>(&'a self, mut stream: TokenIter<'a>) -> TokenIter<'a> {
        for ext in &self.extensions {
            trace!(extension = ext.identifier(), "applying stream filter");
            stream = ext.filter_stream(stream);
        }
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ranked {
        id: &'static str,
        priority: i32,
        tags: &'static [&'static str],
        env: EnvId,
    }

    impl Extension for Ranked {
        fn identifier(&self) -> &str {
            self.id
        }

        fn tags(&self) -> &[&str] {
            self.tags
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn environment(&self) -> EnvId {
            self.env
        }

        fn preprocess(&self, source: String, _: Option<&str>, _: Option<&str>) -> Result<String> {
            Ok(format!("{}{}", source, self.id))
        }
    }

    fn ranked(id: &'static str, priority: i32, tags: &'static [&'static str]) -> ExtensionFactory {
        Arc::new(move |env| {
            Arc::new(Ranked {
                id,
                priority,
                tags,
                env,
            }) as Arc<dyn Extension>
        })
    }

    fn ids(registry: &Registry) -> Vec<&str> {
        registry.iter().map(|ext| ext.identifier()).collect()
    }

    #[test]
    fn test_sorted_by_priority_then_registration() {
        let mut registry = Registry::new(EnvId::next());
        registry.add(ranked("c", 2, &[]));
        registry.add(ranked("a", 1, &[]));
        registry.add(ranked("b", 2, &[]));
        assert_eq!(ids(&registry), vec!["a", "c", "b"]);
        assert_eq!(registry.preprocess(String::new(), None, None).unwrap(), "acb");
    }

    #[test]
    fn test_same_identifier_replaces() {
        let mut registry = Registry::new(EnvId::next());
        registry.add(ranked("a", 1, &["x"]));
        registry.add(ranked("a", 5, &["y"]));
        assert_eq!(registry.len(), 1);
        assert!(registry.for_tag("x").is_none());
        assert_eq!(registry.for_tag("y").map(|e| e.priority()), Some(5));
    }

    #[test]
    fn test_later_extension_owns_shared_tag() {
        let mut registry = Registry::new(EnvId::next());
        registry.add(ranked("late", 9, &["t"]));
        registry.add(ranked("early", 1, &["t"]));
        assert_eq!(registry.for_tag("t").map(|e| e.identifier()), Some("late"));
    }

    #[test]
    fn test_rebind_builds_new_instances() {
        let first = EnvId::next();
        let mut registry = Registry::new(first);
        registry.add(ranked("a", 1, &[]));
        let second = EnvId::next();
        let rebound = registry.rebind(second);
        assert_eq!(registry.get("a").map(|e| e.environment()), Some(first));
        assert_eq!(rebound.get("a").map(|e| e.environment()), Some(second));
        assert!(!Arc::ptr_eq(&registry.extensions[0], &rebound.extensions[0]));
    }
}
