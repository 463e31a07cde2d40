use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::links::{ImageMode, ImageResolver};

const DEFAULT_ENV_PREFIX: &str = "MEDIAWEEK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn image_resolver(&self) -> Result<ImageResolver> {
        anyhow::ensure!(
            self.images.mode != ImageMode::RemoteBase || !self.images.base_url.trim().is_empty(),
            "config: images.mode remote_base needs images.base_url (or --image-base)"
        );
        Ok(ImageResolver {
            mode: self.images.mode,
            image_dir: self.images.dir.clone(),
            base_url: self.images.base_url.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("mediaweek.csv")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagesConfig {
    #[serde(default)]
    pub mode: ImageMode,
    #[serde(default = "default_image_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub base_url: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            mode: ImageMode::default(),
            dir: default_image_dir(),
            base_url: String::new(),
        }
    }
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("image")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

fn default_title() -> String {
    "Media Trend Report".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        anyhow::ensure!(
            path.exists(),
            "config: file not found at {}",
            path.display()
        );
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.data.path.as_os_str().is_empty() {
        base.data.path = other.data.path;
    }

    base.images.mode = other.images.mode;
    if !other.images.dir.as_os_str().is_empty() {
        base.images.dir = other.images.dir;
    }
    if !other.images.base_url.is_empty() {
        base.images.base_url = other.images.base_url;
    }

    if !other.ui.title.trim().is_empty() {
        base.ui.title = other.ui.title;
    }

    if !other.log.level.trim().is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "data.path" => cfg.data.path = PathBuf::from(value),
        "images.mode" => {
            if let Some(mode) = ImageMode::parse(&value) {
                cfg.images.mode = mode;
            }
        }
        "images.dir" => cfg.images.dir = PathBuf::from(value),
        "images.base_url" => cfg.images.base_url = value,
        "ui.title" => cfg.ui.title = value,
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mediaweek").join("config.yaml"))
}

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("mediaweek").join("mediaweek.log"))
}
