// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Loading the optional cross-engine position synchronization file.

use std::path::Path;

use governor_core::ConfigError;
use governor_core::config::SyncConfig;

/// Parse a sync file: `device-name -> [position-name, ...]`.
pub fn load_sync_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_device_to_positions_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "motorA = [\"In\"]\n").unwrap();

        let sync = load_sync_config(&path).unwrap();
        assert_eq!(sync.0["motorA"], vec!["In".to_string()]);
    }

    #[test]
    fn missing_file_surfaces_as_io_error() {
        let err = load_sync_config(Path::new("/nonexistent/sync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
