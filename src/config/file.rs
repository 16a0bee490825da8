//! Configuration file loading.

use crate::config::{Config, config_file_path};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_HEADER: &str = "# pavewatch configuration\n# Command-line flags override these values.\n\n";

/// The config file to use: `explicit` when given, else the platform default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit.map_or_else(config_file_path, |path| Ok(path.to_path_buf()))
}

/// Load configuration from `path`; a missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let config = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the explicit config file, or the platform default one.
///
/// Without an explicit path, a platform with no config directory gets the
/// defaults instead of an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config_file(path),
        None => config_file_path().map_or_else(|_| Ok(Config::default()), |path| load_config_file(&path)),
    }
}

/// Render `config` as TOML.
pub fn render_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| Error::ConfigSerialize { source: e })
}

/// Write `config` to `path`, replacing any existing file.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    create_parent(path)?;
    let contents = format!("{FILE_HEADER}{}", render_config(config)?);
    std::fs::write(path, contents).map_err(|e| Error::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the default configuration to `path` unless a file is already there.
///
/// Returns `false` when the file existed and was left alone.
pub fn init_config_file(path: &Path) -> Result<bool> {
    create_parent(path)?;
    let contents = format!("{FILE_HEADER}{}", render_config(&Config::default())?);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(Error::ConfigWrite {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    file.write_all(contents.as_bytes())
        .map_err(|e| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(true)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_nonexistent_file_returns_default() {
        let path = Path::new("/nonexistent/path/config.toml");
        let config = load_config_file(path).unwrap();
        assert_eq!(config.stream.skip_interval, 3);
        assert!(config.store.dir.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
dir = "/srv/roads"

[stream]
cooldown_secs = 2.5

[detector]
labels = ["pothole", "crack", "rutting"]
label_font = "/usr/share/fonts/road.ttf"
"#
        )
        .unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.store.dir, Some(std::path::PathBuf::from("/srv/roads")));
        assert_eq!(config.stream.cooldown_secs, 2.5);
        assert_eq!(config.detector.labels.len(), 3);
        assert_eq!(
            config.detector.label_font,
            Some(std::path::PathBuf::from("/usr/share/fonts/road.ttf"))
        );
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.route.default_count = 4;
        save_config(&config, &path).unwrap();

        assert_eq!(load_config_file(&path).unwrap().route.default_count, 4);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        assert!(init_config_file(&path).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# pavewatch configuration"));
        assert!(written.contains("[stream]"));

        std::fs::write(&path, "[route]\ndefault_count = 2\n").unwrap();
        assert!(!init_config_file(&path).unwrap());
        assert_eq!(load_config(Some(&path)).unwrap().route.default_count, 2);
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let explicit = Path::new("/tmp/elsewhere.toml");
        assert_eq!(resolve_config_path(Some(explicit)).unwrap(), explicit);
    }
}
