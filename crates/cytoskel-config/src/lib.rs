pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{AwsSettings, SESSION_DURATION_RANGE, Settings, StagingNames};

use std::path::{Path, PathBuf};

/// Environment variable pointing at a settings file
pub const CONFIG_ENV: &str = "CYTOSKEL_CONFIG";

const CANDIDATES: [&str; 2] = ["cytoskel.local.yaml", "cytoskel.yaml"];

/// Find the settings file to use
///
/// Search order:
/// 1. `explicit` (e.g. `--config`), then the `CYTOSKEL_CONFIG` environment variable
/// 2. current directory: cytoskel.local.yaml, cytoskel.yaml
/// 3. ./.cytoskel/cytoskel.yaml
/// 4. ~/.config/cytoskel/cytoskel.yaml
///
/// An explicitly named file must exist. Without one, `None` means no file was
/// found and the defaults apply.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let project_config = current_dir.join(".cytoskel").join("cytoskel.yaml");
    if project_config.exists() {
        return Ok(Some(project_config));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cytoskel").join("cytoskel.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Load settings from the discovered file, or the defaults
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match find_config_file(explicit)? {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_file(&path)
        }
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    struct CwdGuard(PathBuf);

    impl CwdGuard {
        fn enter(dir: &Path) -> Self {
            let original = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            Self(original)
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("cytoskel.yaml"), "stack: A").unwrap();
        let _cwd = CwdGuard::enter(temp_dir.path());

        let found = find_config_file(None).unwrap().unwrap();
        assert!(found.ends_with("cytoskel.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("cytoskel.yaml"), "stack: Shared").unwrap();
        fs::write(temp_dir.path().join("cytoskel.local.yaml"), "stack: Mine").unwrap();
        let _cwd = CwdGuard::enter(temp_dir.path());

        let settings = load_settings(None).unwrap();
        assert_eq!(settings.stack, "Mine");
    }

    #[test]
    #[serial]
    fn test_find_config_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".cytoskel");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("cytoskel.yaml"), "environment: prod").unwrap();
        let _cwd = CwdGuard::enter(temp_dir.path());

        let found = find_config_file(None).unwrap().unwrap();
        assert!(found.ends_with(".cytoskel/cytoskel.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_and_missing_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "project: Custom").unwrap();

        unsafe {
            std::env::set_var(CONFIG_ENV, &config_path);
        }
        let settings = load_settings(None);
        unsafe {
            std::env::remove_var(CONFIG_ENV);
        }
        assert_eq!(settings.unwrap().project, "Custom");

        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(
            find_config_file(Some(&missing)),
            Err(ConfigError::ConfigFileNotFound(path)) if path == missing
        ));
    }

    #[test]
    #[serial]
    fn test_parse_error_names_the_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("broken.yaml");
        fs::write(&config_path, "staging: [not, a, map]").unwrap();

        let err = load_settings(Some(&config_path)).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
