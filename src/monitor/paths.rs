use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MonitorPaths {
    pub home: PathBuf,
    pub store_file: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub locks_dir: PathBuf,
}

impl MonitorPaths {
    /// Layout rooted at `home`, ignoring environment overrides.
    pub fn under(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            store_file: home.join("store.json"),
            config_file: home.join("chatmon.toml"),
            logs_dir: home.join("logs"),
            locks_dir: home.join("locks"),
            home,
        }
    }
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

pub fn resolve_paths() -> Result<MonitorPaths> {
    let home = match env_path("CHATMON_HOME") {
        Some(path) => path,
        None => required_home_dir()?.join(".chatmon"),
    };

    let mut paths = MonitorPaths::under(home);
    if let Some(store) = env_path("CHATMON_STORE_FILE") {
        paths.store_file = store;
    }
    if let Some(config) = env_path("CHATMON_CONFIG_PATH") {
        paths.config_file = config;
    }
    if let Some(logs) = env_path("CHATMON_LOGS_DIR") {
        paths.logs_dir = logs;
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::MonitorPaths;
    use std::path::PathBuf;

    #[test]
    fn under_lays_out_files_beneath_home() {
        let paths = MonitorPaths::under("/tmp/cm");
        assert_eq!(paths.store_file, PathBuf::from("/tmp/cm/store.json"));
        assert_eq!(paths.config_file, PathBuf::from("/tmp/cm/chatmon.toml"));
        assert_eq!(paths.logs_dir, PathBuf::from("/tmp/cm/logs"));
        assert_eq!(paths.locks_dir, PathBuf::from("/tmp/cm/locks"));
    }
}
