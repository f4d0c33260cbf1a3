//! File names, property names and path utilities.
//!
//! Centralizes the hardcoded names used by configuration discovery, logging
//! and skip policies.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".server-migration";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "server-migration.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/server-migration/config.toml";

/// Default log filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "server_migration=info";

/// Environment property names
pub mod properties {
    /// Suffix of task-scoped skip properties, as in `<task-name>.skip`
    pub const SKIP_SUFFIX: &str = ".skip";

    /// Overrides the interactive flag of the configuration
    pub const INTERACTIVE: &str = "migration.interactive";
}

/// `<workspace>/.server-migration`
pub fn app_dir_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(APP_DIR_NAME)
}

/// `<workspace>/.server-migration/config.toml`
pub fn local_config_file_path(workspace_root: &Path) -> PathBuf {
    app_dir_path(workspace_root).join(CONFIG_FILE_NAME)
}

/// `~/.server-migration/config.toml`
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_in_app_dir() {
        let root = Path::new("/srv/migration");
        assert_eq!(
            local_config_file_path(root),
            PathBuf::from("/srv/migration/.server-migration/config.toml")
        );
        assert_eq!(
            user_config_file_path(Path::new("/home/ops")),
            PathBuf::from("/home/ops/.server-migration/config.toml")
        );
    }
}
