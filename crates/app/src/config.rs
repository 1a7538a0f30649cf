//! Wallpaper rules and their JSON persistence

use overlay::MIN_OPACITY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "data.json";

/// Overrides the config location when set
pub const CONFIG_ENV: &str = "FREEDOMWALL_CONFIG";

/// Opacity used when the user leaves the field empty
pub const DEFAULT_OPACITY: f32 = 0.2;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One wallpaper target: windows whose title contains `key`
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRule {
    pub key: String,
    pub media_path: PathBuf,
    pub opacity: f32,
    pub exceptions: Vec<String>,
}

impl TargetRule {
    /// Build a rule, rejecting an empty key or an out-of-range opacity
    pub fn new(
        key: impl Into<String>,
        media_path: impl Into<PathBuf>,
        opacity: f32,
        exceptions: Vec<String>,
    ) -> ConfigResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::InvalidRule("window title must not be empty".into()));
        }
        validate_opacity(opacity)?;

        Ok(Self {
            key,
            media_path: media_path.into(),
            opacity,
            exceptions: exceptions.into_iter().filter(|e| !e.is_empty()).collect(),
        })
    }

    /// Whether `title` belongs to this rule's target.
    ///
    /// The key must occur in the title and no exception may.
    pub fn matches(&self, title: &str) -> bool {
        title.contains(&self.key) && !self.exceptions.iter().any(|e| title.contains(e.as_str()))
    }
}

fn validate_opacity(opacity: f32) -> ConfigResult<()> {
    if !opacity.is_finite() || !(MIN_OPACITY..=1.0).contains(&opacity) {
        return Err(ConfigError::InvalidRule(format!(
            "opacity must be between {MIN_OPACITY} and 1"
        )));
    }
    Ok(())
}

/// Parse opacity as typed by the user; empty input means the default
pub fn parse_opacity(input: &str) -> ConfigResult<f32> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DEFAULT_OPACITY);
    }

    let opacity: f32 = input
        .parse()
        .map_err(|_| ConfigError::InvalidRule(format!("{input:?} is not a number")))?;
    validate_opacity(opacity)?;
    Ok(opacity)
}

/// Split a comma separated exception list
pub fn parse_exceptions(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Serialize, Deserialize)]
struct RuleEntry {
    path: String,
    alpha: f32,
    #[serde(default)]
    exception: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    windows: Map<String, Value>,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default = "default_poll_interval")]
    poll_interval_ms: u64,
    #[serde(default)]
    debug: bool,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// In-memory configuration. Rules keep file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rules: Vec<TargetRule>,
    /// Title fragments that suspend tracking while focused
    pub ignore: Vec<String>,
    pub poll_interval_ms: u64,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            ignore: Vec::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            debug: false,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let mut rules = Vec::with_capacity(file.windows.len());

        for (key, value) in file.windows {
            let entry: RuleEntry = serde_json::from_value(value)?;
            if key.trim().is_empty() {
                tracing::warn!("skipping rule with an empty window title");
                continue;
            }

            let opacity = overlay::clamp_opacity(entry.alpha);
            if opacity != entry.alpha {
                tracing::warn!(rule = %key, alpha = entry.alpha, opacity, "rule opacity out of range, clamped");
            }

            rules.push(TargetRule {
                key,
                media_path: PathBuf::from(entry.path),
                opacity,
                exceptions: entry.exception.into_iter().filter(|e| !e.is_empty()).collect(),
            });
        }

        Ok(Self {
            rules,
            ignore: file.ignore,
            poll_interval_ms: file.poll_interval_ms.max(1),
            debug: file.debug,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut windows = Map::new();
        for rule in &self.rules {
            let entry = RuleEntry {
                path: rule.media_path.to_string_lossy().into_owned(),
                alpha: rule.opacity,
                exception: rule.exceptions.clone(),
            };
            windows.insert(rule.key.clone(), serde_json::to_value(entry)?);
        }

        let file = ConfigFile {
            windows,
            ignore: self.ignore.clone(),
            poll_interval_ms: self.poll_interval_ms,
            debug: self.debug,
        };
        serde_json::to_string_pretty(&file)
    }

    pub fn rule(&self, key: &str) -> Option<&TargetRule> {
        self.rules.iter().find(|r| r.key == key)
    }

    /// Replace the rule with the same key in place, or append
    pub fn upsert(&mut self, rule: TargetRule) {
        match self.rules.iter_mut().find(|r| r.key == rule.key) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<TargetRule> {
        let index = self.rules.iter().position(|r| r.key == key)?;
        Some(self.rules.remove(index))
    }

    /// Rule keys in configuration order
    pub fn keys(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.key.as_str()).collect()
    }
}

/// Config file next to the executable unless overridden by `FREEDOMWALL_CONFIG`
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    use anyhow::{anyhow, Context};

    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let exe_path = std::env::current_exe().context("resolve current executable")?;
    let parent = exe_path
        .parent()
        .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
    Ok(parent.join(CONFIG_FILE_NAME))
}

/// `debug` flag of the file at `path`, read before logging is set up.
///
/// Missing or malformed files read as `false`; the real load reports them.
pub fn peek_debug(path: &Path) -> bool {
    #[derive(Deserialize)]
    struct DebugFlag {
        #[serde(default)]
        debug: bool,
    }

    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str::<DebugFlag>(&text).ok())
        .is_some_and(|flag| flag.debug)
}

/// The config file and its last successfully loaded contents
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Load `path`, creating an empty config file if none exists.
    ///
    /// A malformed file is an error; the caller treats it as fatal at startup.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();

        if !path.exists() {
            let store = Self {
                path,
                config: Config::default(),
            };
            store.save()?;
            tracing::info!(path = %store.path.display(), "created empty config");
            return Ok(store);
        }

        let config = Self::read(&path)?;
        tracing::info!(path = %path.display(), rules = config.rules.len(), "config loaded");
        Ok(Self { path, config })
    }

    fn read(path: &Path) -> ConfigResult<Config> {
        let text = std::fs::read_to_string(path)?;
        Config::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &[TargetRule] {
        &self.config.rules
    }

    /// Re-read the file. On failure the previous config stays in memory.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let config = Self::read(&self.path)?;
        tracing::info!(rules = config.rules.len(), "config reloaded");
        self.config = config;
        Ok(())
    }

    /// Write the in-memory config to disk
    pub fn save(&self) -> ConfigResult<()> {
        self.write(&self.config)
    }

    fn write(&self, config: &Config) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, config.to_json()?)?;
        Ok(())
    }

    /// Apply `edit` to a copy, persist it, then reload from disk.
    ///
    /// Nothing changes in memory if writing fails.
    pub fn commit(&mut self, edit: impl FnOnce(&mut Config)) -> ConfigResult<()> {
        let mut next = self.config.clone();
        edit(&mut next);
        self.write(&next)?;
        self.reload()
    }
}
