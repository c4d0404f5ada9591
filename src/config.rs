use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub runtest: RuntestConfig,
}

/// Settings for the fold/bookmark recorder.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Host editor configuration directory. The store lives under
    /// `<config_dir>/plugins/`. Defaults to the Geany config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    /// Report every capture/replay step to the host status window.
    #[serde(default)]
    pub debug: bool,
}

impl SessionConfig {
    pub fn host_config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_host_config_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        crate::session_store::store_path_in(&self.host_config_dir())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuntestConfig {
    /// Test command; `{}` is replaced with the dotted test identifier.
    #[serde(default = "RuntestConfig::default_command")]
    pub command: String,
    /// Shell program and the flag that makes it run a command string.
    #[serde(default = "RuntestConfig::default_shell")]
    pub shell: Vec<String>,
}

impl RuntestConfig {
    fn default_command() -> String {
        "cd .. ; python devmanage.py test {}".to_string()
    }

    #[cfg(not(windows))]
    fn default_shell() -> Vec<String> {
        vec!["sh".into(), "-c".into()]
    }

    #[cfg(windows)]
    fn default_shell() -> Vec<String> {
        vec!["cmd".into(), "/C".into()]
    }
}

impl Default for RuntestConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            shell: Self::default_shell(),
        }
    }
}

impl Config {
    /// Reads `config.toml`; a missing file means all defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Writes the default config unless one already exists. Returns its path.
    pub fn create_default() -> Result<PathBuf> {
        let path = get_config_path()?;
        if path.exists() {
            bail!("Config already exists: {}", path.display());
        }
        Config::default().save_to(&path)?;
        Ok(path)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Cannot determine user config directory")?;
    Ok(config_dir.join("remember").join("config.toml"))
}

fn default_host_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geany")
}

/// `remember config`: effective settings plus where the plugin keeps its store.
pub fn show_config() -> Result<()> {
    let path = get_config_path()?;
    let exists = path.exists();
    let config = Config::load_from(&path)?;

    println!("Config: {}", path.display());
    if !exists {
        println!("(file not created, showing defaults)");
    }
    println!("Store:  {}", config.session.store_path().display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );

    Ok(())
}
