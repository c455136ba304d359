//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `MSP_ROOT_FOLDER` environment variable
//! 3. `MSP_ROOT` environment variable
//! 4. `root_folder` in the module's TOML config file
//! 5. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: the module logs a warning and runs
//! on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name under the platform data/config dirs
const APP_DIR_NAME: &str = "media-store-plus";

/// Name of the volume every platform is guaranteed to have
pub const DEFAULT_PRIMARY_VOLUME: &str = "external_primary";

/// Compiled fallback values used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./msp_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file; stderr when absent
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Which content index backend the store runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite-indexed store with pending-visibility support
    #[default]
    Indexed,
    /// Plain files, no pending phase
    Direct,
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Volume used when a request names none, or names an unknown one
    pub primary_volume: String,
    /// Additional named volumes besides the primary one
    pub external_volumes: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            primary_volume: DEFAULT_PRIMARY_VOLUME.to_string(),
            external_volumes: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Volume names become store directory names, one segment each
    pub fn validate(&self) -> Result<()> {
        for volume in std::iter::once(&self.primary_volume).chain(&self.external_volumes) {
            if volume.trim().is_empty()
                || volume == "."
                || volume == ".."
                || volume.contains(['/', '\\'])
            {
                return Err(Error::Config(format!("Invalid volume name: {:?}", volume)));
            }
        }
        Ok(())
    }

    /// All known volumes, primary first, without duplicates
    pub fn volume_names(&self) -> Vec<String> {
        let mut names = vec![self.primary_volume.clone()];
        for volume in &self.external_volumes {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(volume)) {
                names.push(volume.clone());
            }
        }
        names
    }
}

/// Module TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

/// Default TOML config path for a module (`<config_dir>/media-store-plus/<module>.toml`)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Load TOML config, falling back to defaults when the file does not exist
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    config.store.validate()?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
///
/// On unix the file is restricted to 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_file: default_config_path(module_name),
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Override the TOML file consulted at priority 4
    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in ["MSP_ROOT_FOLDER", "MSP_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        // Absent file: the loader of the module config reports it
        if let Some(config_file) = self.config_file.as_ref().filter(|p| p.exists()) {
            match load_toml_config(config_file) {
                Ok(config) => {
                    if let Some(root) = config.root_folder {
                        return root;
                    }
                }
                Err(e) => warn!(
                    module = %self.module_name,
                    error = %e,
                    "Ignoring unreadable config file during root folder resolution"
                ),
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first start
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create root and store directories if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.store_path())?;
        Ok(())
    }

    /// SQLite content index database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("media_index.db")
    }

    /// Directory holding the stored media bytes
    pub fn store_path(&self) -> PathBuf {
        self.root_folder.join("store")
    }

    /// Config file kept alongside the data
    pub fn config_path(&self) -> PathBuf {
        self.root_folder.join("msp.toml")
    }
}

/// Resolve the root folder, create its layout and load the config for it
///
/// Config file priority: `explicit_config`, then `msp.toml` in the root
/// folder, then the per-user config file for `module_name`.
pub fn load_module_settings(
    module_name: &str,
    cli_root: Option<PathBuf>,
    explicit_config: Option<PathBuf>,
) -> Result<(RootFolderInitializer, TomlConfig)> {
    let user_config_path = explicit_config
        .clone()
        .or_else(|| default_config_path(module_name))
        .unwrap_or_else(|| PathBuf::from(format!("{}.toml", module_name)));

    let root_folder = RootFolderResolver::new(module_name)
        .with_cli_arg(cli_root)
        .with_config_file(user_config_path.clone())
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let root_config_path = initializer.config_path();
    let config_path = if explicit_config.is_none() && root_config_path.exists() {
        root_config_path
    } else {
        user_config_path
    };
    let config = load_toml_config(&config_path)?;

    Ok((initializer, config))
}
