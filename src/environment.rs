//! Environments and templates
//!
//!     An [Environment] holds everything compilation and rendering depend on: delimiters
//!     and whitespace handling, autoescaping, the undefined policy, filters, tests and
//!     globals, the extension registry, and where templates come from. Templates compiled
//!     by an environment are immutable and cached by name; a [Template] is a cheap handle
//!     pairing a compiled template with the environment that renders it.
//!
//!         let mut env = Environment::new();
//!         env.add_extension(LoopControlsExtension::new);
//!         env.add_template("base.html", "<title>{% block title %}{% endblock %}</title>")?;
//!         let out = env.template_from_str("{% extends 'base.html' %}...")?.render(json!({}))?;
//!
//! Templates and the Cache
//!
//!     Names are resolved against the templates added with [Environment::add_template]
//!     first, then against the [Loader] set with [Environment::set_loader]. A compiled
//!     template is cached together with its source's up-to-date check and recompiled once
//!     that check fails. Failed compilations are never cached. Changing any setting that
//!     influences compilation drops the whole cache.
//!
//! Overlays
//!
//!     [Environment::overlay] copies an environment under a new [EnvId]. Every extension is
//!     rebuilt from its factory for the copy, and the copy starts with an empty cache, so
//!     settings changed on it never leak into templates of the original.

pub mod loader;
pub mod settings;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use crate::compiling::CompiledTemplate;
use crate::error::{Error, ErrorKind, Result};
use crate::ext::{self, EnvId, Extension, ExtensionFactory, Registry};
use crate::lexing::{SyntaxConfig, Token, WhitespaceConfig};
use crate::parsing::SyntaxTree;
use crate::pipeline::{self, TemplateSource};
use crate::runtime::{builtins, Args, Context, FilterFn, State, TestFn, UndefinedPolicy, Value};

pub use loader::{Loader, MapLoader, Source, UptodateFn};
pub use settings::{load_defaults, AutoescapeSettings, Policies, Settings, SettingsLoader};

/// Name given to templates created from strings.
pub const STRING_TEMPLATE_NAME: &str = "<template>";

/// Post-processes every value an expression outputs.
pub type FinalizeFn = dyn Fn(&State<'_>, Value) -> Result<Value> + Send + Sync;

/// Decides autoescaping from a template name (`None` for string templates).
pub type AutoescapeFn = dyn Fn(Option<&str>) -> bool + Send + Sync;

#[derive(Clone)]
enum Autoescape {
    Select(AutoescapeSettings),
    Callback(Arc<AutoescapeFn>),
}

impl Autoescape {
    fn fixed(on: bool) -> Self {
        Autoescape::Select(AutoescapeSettings {
            default: on,
            for_strings: on,
            enabled_extensions: Vec::new(),
        })
    }
}

struct CacheEntry {
    template: Arc<CompiledTemplate>,
    uptodate: Option<Arc<UptodateFn>>,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.uptodate.as_ref().map_or(true, |check| check())
    }
}

pub struct Environment {
    id: EnvId,
    syntax: SyntaxConfig,
    whitespace: WhitespaceConfig,
    autoescape: Autoescape,
    undefined: UndefinedPolicy,
    policies: Policies,
    finalize: Option<Arc<FinalizeFn>>,
    filters: IndexMap<String, Arc<FilterFn>>,
    tests: IndexMap<String, Arc<TestFn>>,
    globals: IndexMap<String, Value>,
    extensions: Registry,
    loader: Option<Arc<dyn Loader>>,
    templates: MapLoader,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl Environment {
    /// An environment with the default settings, the built-in filters, tests and globals,
    /// and no extensions.
    pub fn new() -> Self {
        let id = EnvId::next();
        Environment {
            id,
            syntax: SyntaxConfig::default(),
            whitespace: WhitespaceConfig::default(),
            autoescape: Autoescape::fixed(false),
            undefined: UndefinedPolicy::default(),
            policies: Policies::default(),
            finalize: None,
            filters: builtins::filters(),
            tests: builtins::tests(),
            globals: builtins::globals(),
            extensions: Registry::new(id),
            loader: None,
            templates: MapLoader::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut env = Environment::new();
        env.set_syntax(settings.syntax.clone())?;
        env.whitespace = settings.whitespace;
        env.autoescape = Autoescape::Select(settings.autoescape.clone());
        env.undefined = settings.undefined;
        env.policies = settings.policies;
        for name in &settings.extensions {
            let factory = ext::builtin(name).ok_or_else(|| {
                Error::new(ErrorKind::Config, format!("unknown extension '{}'", name))
            })?;
            env.extensions.add(factory);
        }
        Ok(env)
    }

    /// A copy of this environment with its own identity, freshly bound extensions and an
    /// empty cache.
    pub fn overlay(&self) -> Environment {
        let id = EnvId::next();
        trace!(parent = %self.id, overlay = %id, "creating overlay");
        Environment {
            id,
            syntax: self.syntax.clone(),
            whitespace: self.whitespace,
            autoescape: self.autoescape.clone(),
            undefined: self.undefined,
            policies: self.policies,
            finalize: self.finalize.clone(),
            filters: self.filters.clone(),
            tests: self.tests.clone(),
            globals: self.globals.clone(),
            extensions: self.extensions.rebind(id),
            loader: self.loader.clone(),
            templates: self.templates.detached(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> EnvId {
        self.id
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_cache(&mut self) {
        self.cache
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    // Compilation

    /// Run the preprocessors of every extension over `source`.
    pub fn preprocess(&self, source: &str, name: Option<&str>, filename: Option<&str>) -> Result<String> {
        self.extensions
            .preprocess(source.to_string(), name, filename)
    }

    /// The token sequence the parser would see, after preprocessing and stream filters.
    pub fn tokenize(&self, source: &str, name: Option<&str>) -> Result<Vec<Token>> {
        pipeline::tokens(self).run(TemplateSource::new(source, name))
    }

    pub fn parse(&self, source: &str, name: Option<&str>) -> Result<SyntaxTree> {
        Ok(pipeline::syntax_tree(self)
            .run(TemplateSource::new(source, name))?
            .tree)
    }

    /// Compile `source` without registering it under `name`.
    pub fn compile(&self, source: &str, name: Option<&str>) -> Result<Arc<CompiledTemplate>> {
        self.compile_source(TemplateSource::new(source, name))
    }

    fn compile_source(&self, source: TemplateSource) -> Result<Arc<CompiledTemplate>> {
        Ok(Arc::new(pipeline::compiled(self).run(source)?))
    }

    /// Compile `source` and make it loadable as `name`. Nothing is stored when it fails
    /// to compile.
    pub fn add_template(&self, name: &str, source: &str) -> Result<()> {
        let template = self.compile(source, Some(name))?;
        self.templates.insert(name, source);
        let uptodate = self.templates.load(name).and_then(|source| source.uptodate);
        self.lock_cache()
            .insert(name.to_string(), CacheEntry { template, uptodate });
        Ok(())
    }

    pub fn set_loader<L: Loader + 'static>(&mut self, loader: L) {
        self.loader = Some(Arc::new(loader));
        self.clear_cache();
    }

    /// The compiled template called `name`, from the cache when it is still up to date.
    pub fn compiled(&self, name: &str) -> Result<Arc<CompiledTemplate>> {
        {
            let mut cache = self.lock_cache();
            if let Some(entry) = cache.get(name) {
                if entry.is_fresh() {
                    trace!(template = name, "template cache hit");
                    return Ok(entry.template.clone());
                }
                trace!(template = name, "evicting stale template");
                cache.remove(name);
            }
        }

        let source = self
            .templates
            .load(name)
            .or_else(|| self.loader.as_ref().and_then(|loader| loader.load(name)))
            .ok_or_else(|| Error::not_found(name).with_name(name))?;
        let uptodate = source.uptodate.clone();
        let template = self.compile_source(TemplateSource {
            name: Some(name.to_string()),
            filename: source.filename,
            text: source.text,
        })?;
        self.lock_cache().insert(
            name.to_string(),
            CacheEntry {
                template: template.clone(),
                uptodate,
            },
        );
        Ok(template)
    }

    pub fn get_template(&self, name: &str) -> Result<Template<'_>> {
        Ok(Template {
            env: self,
            compiled: self.compiled(name)?,
        })
    }

    pub fn template_from_str(&self, source: &str) -> Result<Template<'_>> {
        Ok(Template {
            env: self,
            compiled: self.compile(source, None)?,
        })
    }

    /// The source text of a cached template, for error excerpts.
    fn cached_source(&self, name: &str) -> Option<Arc<str>> {
        self.lock_cache()
            .get(name)
            .map(|entry| entry.template.source.clone())
    }

    // Settings

    pub fn syntax(&self) -> &SyntaxConfig {
        &self.syntax
    }

    pub fn set_syntax(&mut self, syntax: SyntaxConfig) -> Result<()> {
        syntax
            .validate()
            .map_err(|message| Error::new(ErrorKind::Config, message))?;
        self.syntax = syntax;
        self.clear_cache();
        Ok(())
    }

    pub fn whitespace(&self) -> WhitespaceConfig {
        self.whitespace
    }

    pub fn set_whitespace(&mut self, whitespace: WhitespaceConfig) {
        self.whitespace = whitespace;
        self.clear_cache();
    }

    /// Whether the template called `name` starts with autoescaping on.
    pub fn autoescape_for(&self, name: &str) -> bool {
        let name = (name != STRING_TEMPLATE_NAME).then_some(name);
        match &self.autoescape {
            Autoescape::Select(settings) => settings.select(name),
            Autoescape::Callback(callback) => callback(name),
        }
    }

    pub fn set_autoescape(&mut self, on: bool) {
        self.autoescape = Autoescape::fixed(on);
        self.clear_cache();
    }

    pub fn set_autoescape_callback<F>(&mut self, callback: F)
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.autoescape = Autoescape::Callback(Arc::new(callback));
        self.clear_cache();
    }

    pub fn undefined_policy(&self) -> UndefinedPolicy {
        self.undefined
    }

    pub fn set_undefined_policy(&mut self, policy: UndefinedPolicy) {
        self.undefined = policy;
        self.clear_cache();
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn policies_mut(&mut self) -> &mut Policies {
        self.clear_cache();
        &mut self.policies
    }

    pub fn finalize(&self) -> Option<Arc<FinalizeFn>> {
        self.finalize.clone()
    }

    pub fn set_finalize<F>(&mut self, finalize: F)
    where
        F: Fn(&State<'_>, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.finalize = Some(Arc::new(finalize));
        self.clear_cache();
    }

    // Filters, tests and globals

    pub fn filter(&self, name: &str) -> Option<Arc<FilterFn>> {
        self.filters.get(name).cloned()
    }

    pub fn filter_names(&self) -> Vec<String> {
        self.filters.keys().cloned().collect()
    }

    pub fn add_filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&State<'_>, Value, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
        self.clear_cache();
    }

    pub fn test(&self, name: &str) -> Option<Arc<TestFn>> {
        self.tests.get(name).cloned()
    }

    pub fn test_names(&self) -> Vec<String> {
        self.tests.keys().cloned().collect()
    }

    pub fn add_test<F>(&mut self, name: impl Into<String>, test: F)
    where
        F: Fn(&State<'_>, &Value, &Args) -> Result<bool> + Send + Sync + 'static,
    {
        self.tests.insert(name.into(), Arc::new(test));
        self.clear_cache();
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Globals are looked up at render time, so cached templates see the new value.
    pub fn add_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    // Extensions

    /// Register an extension built by `factory` for this environment (and rebuilt for
    /// every overlay).
    pub fn add_extension<E, F>(&mut self, factory: F)
    where
        E: Extension + 'static,
        F: Fn(EnvId) -> E + Send + Sync + 'static,
    {
        self.add_extension_factory(Arc::new(move |env| Arc::new(factory(env)) as Arc<dyn Extension>));
    }

    pub fn add_extension_factory(&mut self, factory: ExtensionFactory) {
        self.extensions.add(factory);
        self.clear_cache();
    }

    pub fn extension(&self, identifier: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(identifier).cloned()
    }

    /// Extensions in the order their hooks run.
    pub fn iter_extensions(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.extensions.iter()
    }

    pub(crate) fn extensions(&self) -> &Registry {
        &self.extensions
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("syntax", &self.syntax)
            .field("whitespace", &self.whitespace)
            .field("undefined", &self.undefined)
            .field("policies", &self.policies)
            .field("extensions", &self.extensions)
            .field("templates", &self.templates.names())
            .finish()
    }
}

/// A compiled template bound to its environment.
#[derive(Debug, Clone)]
pub struct Template<'env> {
    env: &'env Environment,
    compiled: Arc<CompiledTemplate>,
}

impl<'env> Template<'env> {
    pub fn name(&self) -> &str {
        &self.compiled.name
    }

    pub fn source(&self) -> &str {
        &self.compiled.source
    }

    pub fn compiled(&self) -> &Arc<CompiledTemplate> {
        &self.compiled
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.compiled.blocks.keys().map(String::as_str).collect()
    }

    /// Render with `ctx`, any value serializing to a map (or unit for no variables).
    pub fn render<S: Serialize>(&self, ctx: S) -> Result<String> {
        let value = Value::from(serde_json::to_value(ctx)?);
        let context = Context::from_value(&value)?;
        let mut state = State::new(self.env, &self.compiled, Arc::new(context));
        let mut out = String::new();
        state
            .render_template(&self.compiled, &mut out)
            .map_err(|err| self.attach_source(err))?;
        Ok(out)
    }

    fn attach_source(&self, err: Error) -> Error {
        match err.name() {
            Some(name) if name != self.name() => match self.env.cached_source(name) {
                Some(source) => err.with_source(&source),
                None => err,
            },
            _ => err.with_source(&self.compiled.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::loopcontrols::LoopControlsExtension;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_add_template_is_loadable_and_cached() {
        let env = Environment::new();
        env.add_template("a", "A{{ x }}").unwrap();
        let first = env.compiled("a").unwrap();
        let second = env.compiled("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(env.get_template("a").unwrap().render(json!({"x": 1})).unwrap(), "A1");
    }

    #[test]
    fn test_failed_compilation_is_not_registered() {
        let env = Environment::new();
        assert!(env.add_template("bad", "{% if %}").is_err());
        let err = env.compiled("bad").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    }

    #[test]
    fn test_stale_entries_are_recompiled() {
        let fresh = Arc::new(AtomicBool::new(true));
        let flag = fresh.clone();
        let mut env = Environment::new();
        env.set_loader(move |name: &str| {
            let flag = flag.clone();
            (name == "page").then(|| Source::new("v1").with_uptodate(move || flag.load(Ordering::SeqCst)))
        });
        let first = env.compiled("page").unwrap();
        assert!(Arc::ptr_eq(&first, &env.compiled("page").unwrap()));
        fresh.store(false, Ordering::SeqCst);
        assert!(!Arc::ptr_eq(&first, &env.compiled("page").unwrap()));
    }

    #[test]
    fn test_missing_template() {
        let err = Environment::new().get_template("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert_eq!(err.name(), Some("nope"));
    }

    #[test]
    fn test_overlay_rebinds_extensions() {
        let mut env = Environment::new();
        env.add_extension(LoopControlsExtension::new);
        let overlay = env.overlay();
        assert_ne!(env.id(), overlay.id());
        let ext = overlay.iter_extensions().next().unwrap();
        assert_eq!(ext.environment(), overlay.id());
        assert_eq!(env.iter_extensions().next().unwrap().environment(), env.id());
    }

    #[test]
    fn test_overlay_settings_do_not_leak_back() {
        let env = Environment::new();
        env.add_template("t", "{{ '<' }}").unwrap();
        let mut overlay = env.overlay();
        overlay.set_autoescape(true);
        assert_eq!(overlay.get_template("t").unwrap().render(()).unwrap(), "&lt;");
        assert_eq!(env.get_template("t").unwrap().render(()).unwrap(), "<");
    }

    #[test]
    fn test_autoescape_callback_sees_none_for_strings() {
        let mut env = Environment::new();
        env.set_autoescape_callback(|name| name.is_some_and(|n| n.ends_with(".html")));
        assert!(env.autoescape_for("index.html"));
        assert!(!env.autoescape_for("index.txt"));
        assert!(!env.autoescape_for(STRING_TEMPLATE_NAME));
    }

    #[test]
    fn test_from_settings_enables_named_extensions() {
        let settings = SettingsLoader::new()
            .with_toml("extensions = ['loopcontrols']\n[whitespace]\ntrim_blocks = true")
            .build()
            .unwrap();
        let env = Environment::from_settings(&settings).unwrap();
        assert_eq!(env.iter_extensions().count(), 1);
        assert!(env.whitespace().trim_blocks);

        let bad = SettingsLoader::new()
            .with_toml("extensions = ['nope']")
            .build()
            .unwrap();
        let err = Environment::from_settings(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_render_errors_carry_source_excerpt() {
        let mut env = Environment::new();
        env.set_undefined_policy(UndefinedPolicy::Strict);
        let err = env
            .template_from_str("line one\n{{ missing }}\nline three")
            .unwrap()
            .render(())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
        assert_eq!(err.line(), Some(2));
        assert!(err.source_context().is_some_and(|ctx| ctx.contains("missing")));
    }
}
