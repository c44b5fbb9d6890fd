use std::env;
use std::path::PathBuf;
use storegate_core::{CONFIG_FILENAME, STATE_FILENAME, STOREGATE_STATE_DIR_VAR};

/// XDG Base Directory paths for storegate
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/storegate or fallback
    pub fn config_dir() -> PathBuf {
        Self::base("XDG_CONFIG_HOME", ".config").join("storegate")
    }

    /// Get XDG_STATE_HOME/storegate or fallback
    ///
    /// `STOREGATE_STATE_DIR` replaces the whole path when set.
    pub fn state_dir() -> PathBuf {
        match env::var(STOREGATE_STATE_DIR_VAR) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => Self::base("XDG_STATE_HOME", ".local/state").join("storegate"),
        }
    }

    /// Default location of the configuration file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join(CONFIG_FILENAME)
    }

    /// Default location of the durable key-value state
    pub fn state_file() -> PathBuf {
        Self::state_dir().join(STATE_FILENAME)
    }

    fn base(var: &str, home_relative: &str) -> PathBuf {
        env::var(var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|home| home.join(home_relative))
                    .unwrap_or_else(|| PathBuf::from(home_relative))
            })
    }
}
