use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "url")]
    pub base_url: Option<String>,
    pub timeout: Option<usize>,
    pub proxy: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
    pub auto_wildcard: Option<bool>,
    #[serde(alias = "limit")]
    pub table_limit: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub shortcuts_file: Option<String>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

fn app_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".freqctl"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(app_dir()?.join("config.yml"))
}

pub fn default_shortcuts_path() -> Option<PathBuf> {
    Some(app_dir()?.join("shortcuts.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# freqctl config
#
# Location (default):
#   ~/.freqctl/config.yml

# Backend
base_url: http://localhost:8080/
timeout: 10
# proxy: http://127.0.0.1:8080

# Search
# Append a prefix wildcard to plain search terms (server01 -> server01*)
auto_wildcard: true

# Tables
table_limit: 100

# Reindex progress polling
poll_interval_ms: 500

# Shortcuts (saved queries)
# shortcuts_file: ~/.freqctl/shortcuts.yml

# Output (optional)
# output: ./results.html
# output_format: text

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let cfg: ConfigFile = serde_yaml::from_str(&default_config_yaml()).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://localhost:8080/"));
        assert_eq!(cfg.auto_wildcard, Some(true));
        assert_eq!(cfg.table_limit, Some(100));
        assert_eq!(cfg.output, None);
    }

    #[test]
    fn ensure_default_config_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.yml");
        ensure_default_config_file(&path).unwrap();
        std::fs::write(&path, "base_url: http://backend:9000/\n").unwrap();
        ensure_default_config_file(&path).unwrap();
        let cfg = load_config(&path, false).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://backend:9000/"));
    }

    #[test]
    fn missing_config_respects_allow_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        assert_eq!(load_config(&path, true).unwrap(), ConfigFile::default());
        assert!(load_config(&path, false).is_err());
    }

    #[test]
    fn aliases_are_accepted() {
        let cfg: ConfigFile = serde_yaml::from_str("url: http://x/\nlimit: 5\n").unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://x/"));
        assert_eq!(cfg.table_limit, Some(5));
    }
}
