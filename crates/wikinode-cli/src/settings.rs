//! TOML configuration with command-line overrides

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use wikinode_core::wikipedia::{DEFAULT_ACTION_API, DEFAULT_PROJECT, DEFAULT_REST_API};
use wikinode_core::{EngineConfig, ScaleMode, WikipediaSource};

/// Contents of a `wikinode.toml` file.
///
/// ```toml
/// [engine]
/// max_results = 8
/// colorize = true
/// scale = "logarithmic"
///
/// [source]
/// action_api = "https://de.wikipedia.org/w/api.php"
/// project = "de.wikipedia"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub engine: EngineConfig,
    pub source: SourceSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub action_api: String,
    pub rest_api: String,
    pub project: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            action_api: DEFAULT_ACTION_API.to_string(),
            rest_api: DEFAULT_REST_API.to_string(),
            project: DEFAULT_PROJECT.to_string(),
        }
    }
}

impl SourceSettings {
    pub fn build(&self) -> Result<WikipediaSource> {
        WikipediaSource::with_endpoints(&self.action_api, &self.rest_api, &self.project)
            .context("Failed to set up the Wikipedia client")
    }
}

/// Flags that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub colorize: bool,
    pub log_scale: bool,
    pub max_results: Option<usize>,
    pub concurrency: Option<usize>,
}

impl Settings {
    /// Read settings from `path`, or use the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if overrides.colorize {
            self.engine.colorize = true;
        }
        if overrides.log_scale {
            self.engine.scale = ScaleMode::Logarithmic;
        }
        if let Some(max_results) = overrides.max_results {
            self.engine.max_results = max_results;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.engine.fetch_concurrency = concurrency;
            self.engine.link_concurrency = concurrency;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_path_means_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.source.project, "en.wikipedia");
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[engine]\nmax_results = 5\nscale = \"logarithmic\"\n\n[source]\nproject = \"de.wikipedia\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.engine.max_results, 5);
        assert_eq!(settings.engine.scale, ScaleMode::Logarithmic);
        assert_eq!(settings.engine.related_limit, 20);
        assert_eq!(settings.source.project, "de.wikipedia");
        assert_eq!(settings.source.action_api, DEFAULT_ACTION_API);
    }

    #[test]
    fn test_unknown_sections_are_rejected() {
        let err = Settings::from_toml("[engnie]\nmax_results = 5").unwrap_err();
        assert!(err.to_string().contains("engnie"));
    }

    #[test]
    fn test_unreadable_file_names_the_path() {
        let err = Settings::load(Some(Path::new("/nonexistent/wikinode.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/wikinode.toml"));
    }

    #[test]
    fn test_flags_override_the_file() {
        let mut settings = Settings::from_toml("[engine]\nmax_results = 5").unwrap();
        settings.apply(&Overrides {
            colorize: true,
            log_scale: true,
            max_results: Some(3),
            concurrency: Some(2),
        });
        assert!(settings.engine.colorize);
        assert_eq!(settings.engine.scale, ScaleMode::Logarithmic);
        assert_eq!(settings.engine.max_results, 3);
        assert_eq!(settings.engine.fetch_concurrency, 2);
        assert_eq!(settings.engine.link_concurrency, 2);
    }

    #[test]
    fn test_no_flags_leave_settings_alone() {
        let mut settings = Settings::default();
        settings.apply(&Overrides::default());
        assert_eq!(settings, Settings::default());
    }
}
