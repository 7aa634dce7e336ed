//! Configuration: cache location and user-level restore settings.
//!
//! - [`get_cache_dir`]: where the shared cache lives
//! - [`RestoreConfig`]: parallelism, git timeout, and download headers

mod global;

pub use global::{CONFIG_PATH_ENV, HttpConfig, RestoreConfig};

use crate::core::file_error::{FileOperation, FileResultExt};
use anyhow::Result;
use std::path::PathBuf;

/// Environment variable overriding the cache location.
pub const CACHE_DIR_ENV: &str = "DOCRESTORE_CACHE_DIR";

/// Cache directory, created if missing.
///
/// `DOCRESTORE_CACHE_DIR` wins; otherwise `~/.docrestore/cache`
/// (`%LOCALAPPDATA%\docrestore\cache` on Windows).
pub fn get_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let cache_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("docrestore")
            .join("cache")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".docrestore")
            .join("cache")
    };

    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir).with_file_context(
            FileOperation::CreateDir,
            &cache_dir,
            "creating cache directory",
            "config::get_cache_dir",
        )?;
    }

    Ok(cache_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cache_dir_env_override() {
        let temp = tempfile::TempDir::new().unwrap();
        // SAFETY: serialized with every other test that touches the environment
        unsafe { std::env::set_var(CACHE_DIR_ENV, temp.path()) };
        let dir = get_cache_dir().unwrap();
        unsafe { std::env::remove_var(CACHE_DIR_ENV) };
        assert_eq!(dir, temp.path());
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        unsafe { std::env::set_var(CONFIG_PATH_ENV, "/tmp/docrestore-test/config.toml") };
        let path = RestoreConfig::default_path().unwrap();
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
        assert_eq!(path, PathBuf::from("/tmp/docrestore-test/config.toml"));
    }
}
