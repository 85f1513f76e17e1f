//! Environment settings
//!
//!     `defaults/templar.default.toml` is embedded into the crate, so the documented
//!     defaults and the runtime defaults cannot drift apart. Hosts layer their own files
//!     and single-key overrides on top through [SettingsLoader] and hand the result to
//!     [crate::Environment::from_settings].
//!
//!         let settings = SettingsLoader::new()
//!             .with_optional_file("templar.toml")
//!             .set_override("whitespace.trim_blocks", true)?
//!             .build()?;

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use serde::Deserialize;

use crate::error::Result;
use crate::lexing::{SyntaxConfig, WhitespaceConfig};
use crate::runtime::UndefinedPolicy;

const DEFAULT_TOML: &str = include_str!("../../defaults/templar.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub syntax: SyntaxConfig,
    pub whitespace: WhitespaceConfig,
    pub autoescape: AutoescapeSettings,
    pub undefined: UndefinedPolicy,
    pub policies: Policies,
    /// Built-in extensions to enable, by short name or identifier.
    pub extensions: Vec<String>,
}

/// Autoescaping chosen by template name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutoescapeSettings {
    pub default: bool,
    pub for_strings: bool,
    pub enabled_extensions: Vec<String>,
}

impl AutoescapeSettings {
    /// Whether a template named `name` (`None` for string templates) starts escaped.
    pub fn select(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return self.for_strings;
        };
        let name = name.to_ascii_lowercase();
        let listed = self.enabled_extensions.iter().any(|ext| {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            name.rsplit_once('.').is_some_and(|(_, suffix)| suffix == ext)
        });
        listed || self.default
    }
}

/// Flags that change how extensions compile their tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Policies {
    /// Collapse whitespace in `{% trans %}` bodies unless `notrimmed` is given.
    pub i18n_trimmed: bool,
    /// Installed gettext callables format their own placeholders.
    pub newstyle_gettext: bool,
}

/// Layers user settings over the built-in defaults.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    builder: ConfigBuilder<DefaultState>,
}

impl SettingsLoader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a settings file. A missing file is an error at [SettingsLoader::build].
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a settings file if it exists.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer settings from a TOML string.
    pub fn with_toml(mut self, toml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(toml, FileFormat::Toml));
        self
    }

    /// Override a single dotted key, e.g. `autoescape.default`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Settings> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// The embedded defaults alone.
pub fn load_defaults() -> Result<Settings> {
    SettingsLoader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lexing::NewlineSequence;

    #[test]
    fn loads_default_settings() {
        let settings = load_defaults().expect("defaults to deserialize");
        assert_eq!(settings.syntax, SyntaxConfig::default());
        assert_eq!(settings.whitespace, WhitespaceConfig::default());
        assert_eq!(settings.whitespace.newline_sequence, NewlineSequence::Lf);
        assert_eq!(settings.undefined, UndefinedPolicy::Default);
        assert_eq!(settings.policies, Policies::default());
        assert!(!settings.autoescape.default);
        assert!(settings.extensions.is_empty());
    }

    #[test]
    fn supports_overrides() {
        let settings = SettingsLoader::new()
            .set_override("whitespace.trim_blocks", true)
            .unwrap()
            .set_override("undefined", "strict")
            .unwrap()
            .build()
            .unwrap();
        assert!(settings.whitespace.trim_blocks);
        assert_eq!(settings.undefined, UndefinedPolicy::Strict);
    }

    #[test]
    fn layers_toml_over_defaults() {
        let settings = SettingsLoader::new()
            .with_toml(
                r##"
                extensions = ["i18n", "do"]
                [syntax]
                line_statement_prefix = "#"
                [autoescape]
                enabled_extensions = ["html"]
                [policies]
                i18n_trimmed = true
                "##,
            )
            .build()
            .unwrap();
        assert_eq!(settings.syntax.line_statement_prefix.as_deref(), Some("#"));
        assert_eq!(settings.syntax.block_start, "{%");
        assert_eq!(settings.extensions, vec!["i18n", "do"]);
        assert!(settings.policies.i18n_trimmed);
        assert!(settings.autoescape.select(Some("page.HTML")));
        assert!(!settings.autoescape.select(Some("page.txt")));
        assert!(!settings.autoescape.select(None));
    }

    #[test]
    fn missing_required_file_is_a_config_error() {
        let err = SettingsLoader::new()
            .with_file("/nonexistent/templar.toml")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
