//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `~/.config/devmind/config.toml` (XDG user config)
//! 3. `./devmind.toml` (project-local)
//! 4. An explicit `--config <file>`
//! 5. Environment variables

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ConfigError, DevMindConfig, Result, env};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "devmind.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "devmind";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "DEVMIND_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: DevMindConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<&'static str>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Options controlling discovery.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory searched for `devmind.toml` (current directory when unset).
    pub project_dir: Option<PathBuf>,
    /// User config directory; overrides `DEVMIND_CONFIG_DIR` and the platform default.
    pub config_dir: Option<PathBuf>,
    /// Explicit config file; it must exist and parse.
    pub config_file: Option<PathBuf>,
    /// Skip environment variable overrides.
    pub skip_env: bool,
}

impl LoadOptions {
    /// Use `path` as the explicit config file.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Search `dir` for the project config.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Read the user config from `dir`.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Do not apply environment overrides.
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }
}

/// Load configuration with default discovery and environment overrides.
pub fn load_config() -> Result<LoadedConfig> {
    load_config_with_options(&LoadOptions::default())
}

/// Load configuration by discovering and merging all layers.
///
/// Malformed discovered files are reported as warnings and skipped; a
/// malformed or missing explicit file is an error.
pub fn load_config_with_options(options: &LoadOptions) -> Result<LoadedConfig> {
    let mut config = DevMindConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let user_config_path = match &options.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = options
        .project_dir
        .as_ref()
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // 3. Explicit file
    if let Some(path) = &options.config_file {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    }

    warnings.extend(config.plaintext_secret_warnings());

    // 4. Environment
    let env_overrides = if options.skip_env {
        Vec::new()
    } else {
        env::apply_process_env(&mut config)?
    };

    debug!(
        sources = sources.iter().filter(|s| s.loaded).count(),
        env = env_overrides.len(),
        "Configuration loaded"
    );

    Ok(LoadedConfig {
        config,
        sources,
        env_overrides,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<DevMindConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    DevMindConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &DevMindConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Get the XDG config file path for devmind.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for devmind.
///
/// Checks `DEVMIND_CONFIG_DIR` env var first, then falls back to platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut DevMindConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn isolated() -> (TempDir, TempDir, LoadOptions) {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let options = LoadOptions::default()
            .with_project_dir(project.path())
            .with_config_dir(user.path())
            .without_env();
        (project, user, options)
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/devmind.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let (_project, _user, options) = isolated();
        let loaded = load_config_with_options(&options).unwrap();
        assert_eq!(loaded.config, DevMindConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_layers_override_in_order() {
        let (project, user, options) = isolated();
        fs::write(
            user.path().join("config.toml"),
            "[llm]\nmodel = \"user-model\"\n\n[search]\nprovider = \"brave\"\n",
        )
        .unwrap();
        fs::write(
            project.path().join("devmind.toml"),
            "[llm]\nmodel = \"project-model\"\n",
        )
        .unwrap();
        let explicit = project.path().join("explicit.toml");
        fs::write(&explicit, "[agent]\nmax_iterations = 3\n").unwrap();

        let loaded = load_config_with_options(&options.with_config_file(&explicit)).unwrap();

        assert_eq!(loaded.config.llm().model, "project-model");
        assert_eq!(loaded.config.search().provider, "brave");
        assert_eq!(loaded.config.agent().max_iterations, 3);
        assert_eq!(loaded.loaded_from().len(), 3);
    }

    #[test]
    fn test_malformed_discovered_file_warns() {
        let (project, _user, options) = isolated();
        fs::write(project.path().join("devmind.toml"), "not valid {{{{").unwrap();

        let loaded = load_config_with_options(&options).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let (project, _user, options) = isolated();
        let options = options.with_config_file(project.path().join("absent.toml"));
        assert!(load_config_with_options(&options).is_err());
    }

    #[test]
    fn test_plaintext_key_warning() {
        let (project, _user, options) = isolated();
        fs::write(
            project.path().join("devmind.toml"),
            "[llm]\napi_key = \"sk-secret\"\n",
        )
        .unwrap();

        let loaded = load_config_with_options(&options).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("devmind.toml");
        let mut config = DevMindConfig::new();
        config.llm = Some(crate::LlmSection {
            model: "saved-model".to_string(),
            ..Default::default()
        });

        save_config(&config, &path).unwrap();
        assert_eq!(load_config_file(&path).unwrap().llm().model, "saved-model");
    }

    #[test]
    #[serial]
    fn test_config_dir_env_override() {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::set_var(CONFIG_DIR_ENV, dir.path()) };
        let path = xdg_config_path();
        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

        assert_eq!(path, Some(dir.path().join("config.toml")));
    }

    #[test]
    #[serial]
    fn test_process_env_is_last_layer() {
        let (project, _user, options) = isolated();
        fs::write(
            project.path().join("devmind.toml"),
            "[llm]\nmodel = \"project-model\"\n",
        )
        .unwrap();
        let options = LoadOptions {
            skip_env: false,
            ..options
        };

        unsafe { std::env::set_var("LLM_MODEL", "env-model") };
        let loaded = load_config_with_options(&options);
        unsafe { std::env::remove_var("LLM_MODEL") };

        let loaded = loaded.unwrap();
        assert_eq!(loaded.config.llm().model, "env-model");
        assert!(loaded.env_overrides.contains(&"LLM_MODEL"));
    }
}
