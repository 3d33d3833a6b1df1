//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults (reference catalogue, unbounded history)
//! 2. Global config: `$XDG_CONFIG_HOME/folddoc/folddoc.toml`
//! 3. Local config: `--config <file>` or `./folddoc.toml`
//! 4. Environment variables: `FOLDDOC__*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{DocumentConfig, HistoryConfig, TypeCatalogue, TypeSpec, TypeTag};

/// History and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum undo entries kept (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Run the full invariant check on every edit
    pub verify_invariants: bool,
    /// Type tag of new documents' root node
    pub root_type: TypeTag,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_depth: None,
            verify_invariants: false,
            root_type: TypeTag::from("fragment"),
        }
    }
}

/// Raw history settings for intermediate parsing (`None` = not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawHistorySettings {
    pub max_depth: Option<usize>,
    pub verify_invariants: Option<bool>,
    pub root_type: Option<TypeTag>,
}

/// Raw catalogue for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCatalogue {
    pub strict: Option<bool>,
    pub types: Option<BTreeMap<TypeTag, TypeSpec>>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub history: RawHistorySettings,
    pub catalogue: RawCatalogue,
}

impl HistorySettings {
    fn overlay(&self, raw: &RawHistorySettings) -> Self {
        Self {
            max_depth: raw.max_depth.or(self.max_depth),
            verify_invariants: raw.verify_invariants.unwrap_or(self.verify_invariants),
            root_type: raw
                .root_type
                .clone()
                .unwrap_or_else(|| self.root_type.clone()),
        }
    }
}

/// Unified configuration for folddoc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub history: HistorySettings,
    /// Node-type catalogue (containment rules and field schemas)
    pub catalogue: TypeCatalogue,
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Get the XDG config directory for folddoc.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "folddoc").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("folddoc.toml"))
}

/// Local config file looked up in the working directory.
pub fn local_config_path() -> PathBuf {
    PathBuf::from("folddoc.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Compiled defaults: reference catalogue, unbounded history.
    pub fn defaults() -> Self {
        Self {
            history: HistorySettings::default(),
            catalogue: TypeCatalogue::reference(),
        }
    }

    /// Document settings derived from this configuration.
    pub fn document_config(&self) -> DocumentConfig {
        DocumentConfig {
            root_type: self.history.root_type.clone(),
            history: HistoryConfig {
                max_depth: self.history.max_depth,
            },
            verify_invariants: self.history.verify_invariants,
        }
    }

    /// Apply global config onto defaults.
    ///
    /// If the global file lists catalogue types, they REPLACE the compiled
    /// reference types: the global config defines the real catalogue baseline.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let catalogue = TypeCatalogue {
            strict: global.catalogue.strict.unwrap_or(self.catalogue.strict),
            types: global
                .catalogue
                .types
                .clone()
                .unwrap_or_else(|| self.catalogue.types.clone()),
        };
        Self {
            history: self.history.overlay(&global.history),
            catalogue,
        }
    }

    /// Merge local config onto self: catalogue types merge per type tag.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let types = TypeCatalogue {
            strict: overlay.catalogue.strict.unwrap_or(self.catalogue.strict),
            types: overlay.catalogue.types.clone().unwrap_or_default(),
        };
        Self {
            history: self.history.overlay(&overlay.history),
            catalogue: self.catalogue.merge(&types),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Explicit local config file; falls back to `./folddoc.toml` if present
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path().filter(|p| p.exists());
        let local = match local {
            Some(path) => Some(path.to_path_buf()),
            None => Some(local_config_path()).filter(|p| p.exists()),
        };
        let settings = Self::load_files(global.as_deref(), local.as_deref())?;
        Self::apply_env_overrides(settings, Environment::with_prefix("FOLDDOC"))
    }

    /// Load defaults plus the given global and local files (no env vars).
    ///
    /// An explicitly named file must exist.
    pub fn load_files(global: Option<&Path>, local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::defaults();

        if let Some(path) = global {
            debug!("loading global config {}", path.display());
            let raw = load_raw_settings(path)?;
            current = current.apply_global(&raw);
        }

        if let Some(path) = local {
            debug!("loading local config {}", path.display());
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        Ok(current)
    }

    /// Apply `FOLDDOC__*` environment variables as explicit overrides.
    ///
    /// Env vars replace values (not merge) - they are explicit user overrides.
    pub fn apply_env_overrides(
        mut settings: Self,
        env: Environment,
    ) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env.separator("__"))
            .build()
            .map_err(config_err)?;

        if let Some(val) = present(config.get_int("history.max_depth"), "history.max_depth")? {
            let depth = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("history.max_depth must not be negative: {}", val),
            })?;
            settings.history.max_depth = Some(depth);
        }
        if let Some(val) = present(
            config.get_bool("history.verify_invariants"),
            "history.verify_invariants",
        )? {
            settings.history.verify_invariants = val;
        }
        if let Some(val) = present(config.get_string("history.root_type"), "history.root_type")? {
            settings.history.root_type = TypeTag::from(val);
        }
        if let Some(val) = present(config.get_bool("catalogue.strict"), "catalogue.strict")? {
            settings.catalogue.strict = val;
        }

        Ok(settings)
    }

    /// Serialize settings to TOML string.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize: {}", e),
        })
    }

    /// Generate a template config file with comments.
    pub fn template() -> String {
        r#"# folddoc configuration
# Global: ~/.config/folddoc/folddoc.toml
# Local:  ./folddoc.toml (or --config <file>)

[history]
# Maximum undo steps kept (omit for unbounded)
# max_depth = 200

# Check tree invariants after every edit
verify_invariants = false

# Type of the root node of new documents
root_type = "fragment"

[catalogue]
# Reject node types not listed below
strict = false

# accepts: "any", "none", or a list of child types
[catalogue.types.text]
accepts = "none"

[catalogue.types.text.fields]
text = ""

[catalogue.types.list]
accepts = ["list-item"]

[catalogue.types.list-item]
accepts = ["text", "image"]
"#
        .to_string()
    }
}

/// `Ok(None)` when `key` is unset; a value that does not parse is an error.
fn present<T>(value: Result<T, ConfigError>, key: &str) -> Result<Option<T>, ApplicationError> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ApplicationError::Config {
            message: format!("invalid value for {}: {}", key, e),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Accepts, Catalogue};

    fn raw(src: &str) -> RawSettings {
        toml::from_str(src).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("FOLDDOC").source(Some(map))
    }

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load_files(None, None).unwrap();
        assert_eq!(settings, Settings::defaults());
        assert_eq!(settings.history.max_depth, None);
        assert!(!settings
            .catalogue
            .accepts(&"list".into(), &"text".into()));
    }

    #[test]
    fn given_global_types_when_applied_then_replace_reference_types() {
        let global = raw("[catalogue.types.card]\naccepts = \"any\"");
        let settings = Settings::defaults().apply_global(&global);
        assert_eq!(settings.catalogue.types.len(), 1);
        assert!(settings.catalogue.accepts(&"text".into(), &"image".into()));
    }

    #[test]
    fn given_global_without_types_when_applied_then_keeps_reference() {
        let global = raw("[history]\nmax_depth = 10");
        let settings = Settings::defaults().apply_global(&global);
        assert_eq!(settings.history.max_depth, Some(10));
        assert_eq!(settings.catalogue, TypeCatalogue::reference());
    }

    #[test]
    fn given_local_types_when_merged_then_combined_per_type() {
        let local = raw("[catalogue.types.text]\naccepts = [\"span\"]\n[catalogue.types.card]\naccepts = \"none\"");
        let settings = Settings::defaults().merge_with(&local);
        assert_eq!(
            settings.catalogue.get(&"text".into()).unwrap().accepts,
            Accepts::only(["span"])
        );
        assert!(settings.catalogue.get(&"list".into()).is_some());
        assert!(settings.catalogue.get(&"card".into()).is_some());
    }

    #[test]
    fn given_env_vars_when_applied_then_override() {
        let settings = Settings::apply_env_overrides(
            Settings::defaults(),
            env(&[
                ("FOLDDOC__HISTORY__MAX_DEPTH", "5"),
                ("FOLDDOC__HISTORY__VERIFY_INVARIANTS", "true"),
                ("FOLDDOC__CATALOGUE__STRICT", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.history.max_depth, Some(5));
        assert!(settings.history.verify_invariants);
        assert!(settings.catalogue.strict);
    }

    #[test]
    fn given_negative_depth_in_env_then_config_error() {
        let result = Settings::apply_env_overrides(
            Settings::defaults(),
            env(&[("FOLDDOC__HISTORY__MAX_DEPTH", "-1")]),
        );
        assert!(matches!(result, Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_unparseable_env_values_then_config_error() {
        for (key, value) in [
            ("FOLDDOC__HISTORY__MAX_DEPTH", "abc"),
            ("FOLDDOC__HISTORY__VERIFY_INVARIANTS", "maybe"),
            ("FOLDDOC__CATALOGUE__STRICT", "2x"),
        ] {
            let result = Settings::apply_env_overrides(Settings::defaults(), env(&[(key, value)]));
            assert!(
                matches!(result, Err(ApplicationError::Config { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn given_settings_when_deriving_document_config_then_fields_carried() {
        let mut settings = Settings::defaults();
        settings.history.max_depth = Some(3);
        settings.history.verify_invariants = true;
        let config = settings.document_config();
        assert_eq!(config.history.max_depth, Some(3));
        assert!(config.verify_invariants);
        assert_eq!(config.root_type, "fragment");
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_config() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        let settings = Settings::defaults().apply_global(&raw);
        assert!(settings.catalogue.schema(&"text".into()).is_some());
        assert!(!settings.catalogue.strict);
    }

    #[test]
    fn given_defaults_when_serialized_then_round_trip() {
        let toml = Settings::defaults().to_toml().unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, Settings::defaults());
    }
}
