//! Template sources
//!
//!     A [Loader] maps template names to [Source]s. Finding templates on disk, in packages
//!     or anywhere else is up to the host; the environment only asks for a name and caches
//!     what it compiled, consulting [Source::uptodate] before reusing a cache entry.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;

/// Reports whether a cached compilation of a source may still be used.
pub type UptodateFn = dyn Fn() -> bool + Send + Sync;

pub trait Loader: Send + Sync {
    /// The source for `name`, or `None` when this loader doesn't know it.
    fn load(&self, name: &str) -> Option<Source>;
}

#[derive(Clone)]
pub struct Source {
    pub text: String,
    /// Where the text came from, passed on to preprocessing extensions.
    pub filename: Option<String>,
    /// Without a predicate the compiled template is cached for good.
    pub uptodate: Option<Arc<UptodateFn>>,
}

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        Source {
            text: text.into(),
            filename: None,
            uptodate: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_uptodate<F>(mut self, uptodate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.uptodate = Some(Arc::new(uptodate));
        self
    }

    pub fn is_uptodate(&self) -> bool {
        self.uptodate.as_ref().map_or(true, |check| check())
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("filename", &self.filename)
            .field("len", &self.text.len())
            .field("uptodate", &self.uptodate.is_some())
            .finish()
    }
}

/// Templates held in memory. Clones share the same map, and a source handed out stays up
/// to date until its name is replaced with different text.
#[derive(Debug, Clone, Default)]
pub struct MapLoader {
    templates: Arc<Mutex<IndexMap<String, String>>>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, String>> {
        self.templates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, name: impl Into<String>, text: impl Into<String>) {
        self.lock().insert(name.into(), text.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.lock().shift_remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// A loader with its own copy of the current templates.
    pub fn detached(&self) -> MapLoader {
        MapLoader {
            templates: Arc::new(Mutex::new(self.lock().clone())),
        }
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for MapLoader {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let loader = MapLoader::new();
        for (name, text) in iter {
            loader.insert(name, text);
        }
        loader
    }
}

impl Loader for MapLoader {
    fn load(&self, name: &str) -> Option<Source> {
        let text = self.lock().get(name)?.clone();
        let templates = self.templates.clone();
        let key = name.to_string();
        let expected = text.clone();
        Some(Source::new(text).with_uptodate(move || {
            templates
                .lock()
                .map(|map| map.get(&key) == Some(&expected))
                .unwrap_or(false)
        }))
    }
}

impl<F> Loader for F
where
    F: Fn(&str) -> Option<Source> + Send + Sync,
{
    fn load(&self, name: &str) -> Option<Source> {
        self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_loader_sources_go_stale_on_replace() {
        let loader: MapLoader = [("a", "one")].into_iter().collect();
        let source = loader.load("a").unwrap();
        assert_eq!(source.text, "one");
        assert!(source.is_uptodate());

        loader.insert("a", "one");
        assert!(source.is_uptodate());
        loader.insert("a", "two");
        assert!(!source.is_uptodate());
        assert!(loader.load("missing").is_none());
    }

    #[test]
    fn test_detached_copy_is_independent() {
        let loader = MapLoader::new();
        loader.insert("a", "one");
        let copy = loader.detached();
        loader.insert("b", "two");
        assert_eq!(copy.names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_closures_are_loaders() {
        let loader = |name: &str| (name == "x").then(|| Source::new("x!").with_filename("x.txt"));
        let source = Loader::load(&loader, "x").unwrap();
        assert_eq!(source.filename.as_deref(), Some("x.txt"));
        assert!(Loader::load(&loader, "y").is_none());
    }
}
