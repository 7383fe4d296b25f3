use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema version used when the config does not set one
pub const DEFAULT_VERSION: i32 = 1;

/// Table prefix used when the config does not set one
pub const DEFAULT_TABLE_PREFIX: &str = "ms_";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: Option<String>,
    pub version: Option<i32>,
    pub table_prefix: Option<String>,
}

impl StoreConfig {
    /// Database path, resolved against `base` when relative
    pub fn database_path_in(&self, base: &Path) -> PathBuf {
        match &self.database {
            Some(path) => base.join(path),
            None => default_database_path_in(base),
        }
    }

    pub fn version(&self) -> i32 {
        self.version.unwrap_or(DEFAULT_VERSION)
    }

    pub fn table_prefix(&self) -> &str {
        self.table_prefix.as_deref().unwrap_or(DEFAULT_TABLE_PREFIX)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("modelstore.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".modelstore").join("modelstore.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    if config.version() < 1 {
        anyhow::bail!("invalid schema version {} in {} (must be >= 1)", config.version(), path.display());
    }
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Add the database directory to `.gitignore` unless it is already listed
pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".modelstore/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.version(), DEFAULT_VERSION);
        assert_eq!(config.table_prefix(), DEFAULT_TABLE_PREFIX);
        assert_eq!(
            config.database_path_in(Path::new("/work")),
            PathBuf::from("/work/.modelstore/modelstore.db")
        );
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelstore.toml");
        let config = StoreConfig {
            database: Some("data/app.db".to_string()),
            version: Some(4),
            table_prefix: Some("app_".to_string()),
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.database_path_in(dir.path()), dir.path().join("data/app.db"));
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_rejects_non_positive_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelstore.toml");
        std::fs::write(&path, "version = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_gitignore_entry_added_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target/\n.modelstore/\n");
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/store.db");
        ensure_db_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
    }
}
