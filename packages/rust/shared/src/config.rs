//! Application configuration for nbcolab.
//!
//! User config lives at `~/.nbcolab/nbcolab.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NbColabError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "nbcolab.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".nbcolab";

// ---------------------------------------------------------------------------
// Config structs (matching nbcolab.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which notebooks to convert and how to treat their header.
    #[serde(default)]
    pub notebook: NotebookConfig,

    /// Cell tags that drive the rewrite.
    #[serde(default)]
    pub tags: TagsConfig,

    /// Inline script dependency translation.
    #[serde(default)]
    pub dependencies: DependenciesConfig,

    /// Static asset link rewriting.
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// `[notebook]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookConfig {
    /// File names (not paths) that are never converted.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Substring marking the button row in a notebook's first markdown cell.
    #[serde(default = "default_header_marker")]
    pub header_marker: String,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            header_marker: default_header_marker(),
        }
    }
}

fn default_exclude() -> Vec<String> {
    vec![
        "cellpose_notebook.ipynb".into(),
        "cellpose_retraining_notebook.ipynb".into(),
    ]
}
fn default_header_marker() -> String {
    "custom-button-row".into()
}

/// `[tags]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Tag marking an exercise answer whose content is cleared.
    #[serde(default = "default_teacher_tag")]
    pub teacher: String,

    /// Tags that drop the cell entirely (any one is enough).
    #[serde(default = "default_remove_tags")]
    pub remove: Vec<String>,

    /// Tag stripped from cells without touching anything else.
    #[serde(default = "default_skip_execution_tag")]
    pub skip_execution: String,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            teacher: default_teacher_tag(),
            remove: default_remove_tags(),
            skip_execution: default_skip_execution_tag(),
        }
    }
}

fn default_teacher_tag() -> String {
    "teacher".into()
}
fn default_remove_tags() -> Vec<String> {
    vec![
        "remove-input".into(),
        "remove-output".into(),
        "remove-cell".into(),
    ]
}
fn default_skip_execution_tag() -> String {
    "skip-execution".into()
}

/// `[dependencies]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesConfig {
    /// Marker identifying a cell that carries inline script metadata.
    #[serde(default = "default_script_marker")]
    pub script_marker: String,

    /// Line prefix opening the dependency list.
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Line prefix closing the dependency list.
    #[serde(default = "default_end_marker")]
    pub end_marker: String,

    /// Substring identifying a dependency installed from a source URL.
    #[serde(default = "default_source_url_marker")]
    pub source_url_marker: String,

    /// Command prefix for every emitted install line.
    #[serde(default = "default_install_command")]
    pub install_command: String,

    /// Package that does not run in Colab and gets commented out.
    #[serde(default = "default_viz_package")]
    pub viz_package: String,

    /// Package recommended as a substitute for `viz_package`.
    #[serde(default = "default_plot_package")]
    pub plot_package: String,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            script_marker: default_script_marker(),
            start_marker: default_start_marker(),
            end_marker: default_end_marker(),
            source_url_marker: default_source_url_marker(),
            install_command: default_install_command(),
            viz_package: default_viz_package(),
            plot_package: default_plot_package(),
        }
    }
}

fn default_script_marker() -> String {
    "# /// script".into()
}
fn default_start_marker() -> String {
    "# dependencies".into()
}
fn default_end_marker() -> String {
    "# ]".into()
}
fn default_source_url_marker() -> String {
    "@ git+https://github.com".into()
}
fn default_install_command() -> String {
    "%pip install".into()
}
fn default_viz_package() -> String {
    "ndv".into()
}
fn default_plot_package() -> String {
    "matplotlib".into()
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Directory segment identifying static assets in relative links.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Raw-content URL that relative asset paths are rooted at.
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            raw_base_url: default_raw_base_url(),
        }
    }
}

fn default_static_dir() -> String {
    "_static/".into()
}
fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com/bobiac/bobiac-book/main/".into()
}

// ---------------------------------------------------------------------------
// Rewrite config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime rule set for the notebook rewriter, flattened from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub header_marker: String,
    pub teacher_tag: String,
    pub remove_tags: Vec<String>,
    pub skip_execution_tag: String,
    pub script_marker: String,
    pub start_marker: String,
    pub end_marker: String,
    pub source_url_marker: String,
    pub install_command: String,
    pub viz_package: String,
    pub plot_package: String,
    pub static_dir: String,
    pub raw_base_url: String,
}

impl From<&AppConfig> for RewriteConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            header_marker: config.notebook.header_marker.clone(),
            teacher_tag: config.tags.teacher.clone(),
            remove_tags: config.tags.remove.clone(),
            skip_execution_tag: config.tags.skip_execution.clone(),
            script_marker: config.dependencies.script_marker.clone(),
            start_marker: config.dependencies.start_marker.clone(),
            end_marker: config.dependencies.end_marker.clone(),
            source_url_marker: config.dependencies.source_url_marker.clone(),
            install_command: config.dependencies.install_command.clone(),
            viz_package: config.dependencies.viz_package.clone(),
            plot_package: config.dependencies.plot_package.clone(),
            static_dir: config.assets.static_dir.clone(),
            raw_base_url: config.assets.raw_base_url.clone(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl RewriteConfig {
    /// Reject rule sets the rewriter cannot apply meaningfully.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("notebook.header_marker", &self.header_marker),
            ("tags.teacher", &self.teacher_tag),
            ("tags.skip_execution", &self.skip_execution_tag),
            ("dependencies.script_marker", &self.script_marker),
            ("dependencies.start_marker", &self.start_marker),
            ("dependencies.end_marker", &self.end_marker),
            ("dependencies.source_url_marker", &self.source_url_marker),
            ("dependencies.install_command", &self.install_command),
            ("dependencies.viz_package", &self.viz_package),
            ("dependencies.plot_package", &self.plot_package),
            ("assets.static_dir", &self.static_dir),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(NbColabError::config(format!("{key} must not be empty")));
            }
        }

        if self.remove_tags.iter().any(|t| t.trim().is_empty()) {
            return Err(NbColabError::config("tags.remove must not contain empty tags"));
        }

        let base = Url::parse(&self.raw_base_url).map_err(|e| {
            NbColabError::config(format!(
                "assets.raw_base_url '{}' is not a valid URL: {e}",
                self.raw_base_url
            ))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(NbColabError::config(format!(
                "assets.raw_base_url must be http(s), got '{}'",
                base.scheme()
            )));
        }
        if !self.raw_base_url.ends_with('/') {
            return Err(NbColabError::config("assets.raw_base_url must end with '/'"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.nbcolab/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NbColabError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.nbcolab/nbcolab.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NbColabError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| NbColabError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NbColabError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NbColabError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NbColabError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("raw_base_url"));
        assert!(toml_str.contains("skip-execution"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.tags.remove.len(), 3);
        assert_eq!(parsed.dependencies.viz_package, "ndv");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[notebook]
exclude = ["scratch.ipynb"]

[assets]
raw_base_url = "https://raw.githubusercontent.com/acme/course/main/"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.notebook.exclude, vec!["scratch.ipynb".to_string()]);
        assert_eq!(config.notebook.header_marker, "custom-button-row");
        assert_eq!(config.assets.static_dir, "_static/");
        assert_eq!(config.tags.teacher, "teacher");
    }

    #[test]
    fn rewrite_config_from_app_config() {
        let rules = RewriteConfig::from(&AppConfig::default());
        assert_eq!(rules.teacher_tag, "teacher");
        assert_eq!(rules.install_command, "%pip install");
        assert_eq!(rules.plot_package, "matplotlib");
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut rules = RewriteConfig::default();
        rules.raw_base_url = "not a url".into();
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("not a valid URL"));

        rules.raw_base_url = "https://raw.githubusercontent.com/acme/course/main".into();
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("end with '/'"));

        rules.raw_base_url = "ftp://example.com/".into();
        assert!(rules.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_rules() {
        let mut rules = RewriteConfig::default();
        rules.viz_package = "  ".into();
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("dependencies.viz_package"));

        let mut rules = RewriteConfig::default();
        rules.remove_tags.push(String::new());
        assert!(rules.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nbcolab.toml");
        std::fs::write(&path, "[tags]\nremove = [\"remove-cell\"]\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.tags.remove, vec!["remove-cell".to_string()]);
        assert_eq!(config.tags.skip_execution, "skip-execution");
    }

    #[test]
    fn load_config_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[tags\nteacher = 1").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
