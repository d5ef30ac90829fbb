// Configuration loading and parsing (dugout.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub db_path: String,
    /// Events buffered per observer before a slow one starts skipping.
    pub broadcast_capacity: usize,
    pub log_filter: String,
    /// Roster CSV imported at startup, if set.
    pub roster_csv: Option<String>,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// dugout.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire dugout.toml file.
#[derive(Debug, Clone, Deserialize)]
struct DugoutFile {
    server: ServerConfig,
    database: DatabaseSection,
    #[serde(default)]
    broadcast: BroadcastSection,
    #[serde(default)]
    logging: LoggingSection,
    #[serde(default)]
    import: ImportSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BroadcastSection {
    capacity: usize,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        BroadcastSection { capacity: 256 }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingSection {
    filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            filter: "dugout=info,warn".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ImportSection {
    #[serde(default)]
    roster_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Seeds the operator password when none is stored yet.
    pub master_password: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/dugout.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- dugout.toml (required) ---
    let dugout_path = config_dir.join("dugout.toml");
    let dugout_text = read_file(&dugout_path)?;
    let file: DugoutFile = toml::from_str(&dugout_text).map_err(|e| ConfigError::ParseError {
        path: dugout_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        server: file.server,
        db_path: file.database.path,
        broadcast_capacity: file.broadcast.capacity,
        log_filter: file.logging.filter,
        roster_csv: file.import.roster_csv.filter(|p| !p.trim().is_empty()),
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    if !defaults_dir.exists() {
        if config_dir.exists() {
            return Ok(vec![]);
        }
        return Err(copy_err(format!(
            "neither defaults/ nor config/ directory found in {}; \
             run from the crate root or ensure defaults/ is present",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_err(format!("failed to create config directory: {e}")))?;

    let entries = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_err(format!("failed to read defaults directory: {e}")))?;

    let mut copied = Vec::new();
    for entry in entries {
        let source = entry
            .map_err(|e| copy_err(format!("failed to read defaults entry: {e}")))?
            .path();
        let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Templates stay in defaults/ for the user to copy by hand.
        if !source.is_file() || file_name.ends_with(".example") {
            continue;
        }

        let target = config_dir.join(file_name);
        if copy_if_missing(&source, &target).map_err(copy_err)? {
            copied.push(target);
        }
    }

    Ok(copied)
}

/// Copy `source` to `target` unless `target` already exists. The existence
/// check and create are one step (`create_new`), so an edited config file is
/// never overwritten.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, String> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(format!("failed to create {}: {e}", target.display())),
    };
    let mut src = std::fs::File::open(source)
        .map_err(|e| format!("failed to read {}: {e}", source.display()))?;
    std::io::copy(&mut src, &mut dest)
        .map_err(|e| format!("failed to write {}: {e}", target.display()))?;
    Ok(true)
}

/// Load configuration from the current working directory, copying any
/// missing files from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.host.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "server.host".into(),
            message: "must not be empty".into(),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.broadcast_capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "broadcast.capacity".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
