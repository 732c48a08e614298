//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{IsvError, Result};

/// Largest array the renderer can still show legibly.
pub const MAX_NUM_VALUES: usize = 200;
/// Largest value; wider ranges make the numeric labels collide.
pub const MAX_VALUE_RANGE: u32 = 99;
/// Full speed: no delay between sub-steps.
pub const MAX_SPEED: u8 = 100;

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub array: ArrayConfig,
    pub animation: AnimationConfig,
    pub display: DisplayConfig,
    pub trace: TraceConfig,
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Shape of the randomly generated array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArrayConfig {
    pub num_values: usize,
    pub value_range: u32,
    /// Fixed RNG seed for reproducible arrays.
    pub seed: Option<u64>,
}

/// Animation pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnimationConfig {
    pub speed: u8,
    pub max_delay_ms: u64,
    /// Key polling / redraw cadence of the interactive front end.
    pub poll_interval_ms: u64,
}

/// Spacing rules (terminal columns) fed to the classifier's x-offsets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub comparison_padding: u16,
    pub sorted_padding: u16,
    pub wall_padding: u16,
}

/// Structured step trace output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TraceConfig {
    pub jsonl_path: Option<PathBuf>,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            num_values: 100,
            value_range: 50,
            seed: None,
        }
    }
}

impl ArrayConfig {
    /// Clamp user input to the supported maxima, the way the controls do
    /// before handing values to the engine. Zero is left alone so the engine
    /// can reject it.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            num_values: self.num_values.min(MAX_NUM_VALUES),
            value_range: self.value_range.min(MAX_VALUE_RANGE),
            seed: self.seed,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            speed: 80,
            max_delay_ms: 3_000,
            poll_interval_ms: 16,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            comparison_padding: 4,
            sorted_padding: 2,
            wall_padding: 1,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[ISV-CONFIG] WARNING: HOME not set, falling back to /tmp");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        home_dir.join(".config").join("isv").join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    /// Oversized array shapes are clamped before validation.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| IsvError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(IsvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = Some(path_buf);
        cfg.apply_env_overrides_from(env_var)?;
        cfg.array = cfg.array.clamped();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the trace header.
    ///
    /// FNV-1a keeps the value stable across processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ISV_ARRAY_NUM_VALUES") {
            self.array.num_values = parse_env("ISV_ARRAY_NUM_VALUES", &raw)?;
        }
        if let Some(raw) = lookup("ISV_ARRAY_VALUE_RANGE") {
            self.array.value_range = parse_env("ISV_ARRAY_VALUE_RANGE", &raw)?;
        }
        if let Some(raw) = lookup("ISV_ARRAY_SEED") {
            self.array.seed = Some(parse_env("ISV_ARRAY_SEED", &raw)?);
        }
        if let Some(raw) = lookup("ISV_ANIMATION_SPEED") {
            self.animation.speed = parse_env("ISV_ANIMATION_SPEED", &raw)?;
        }
        if let Some(raw) = lookup("ISV_ANIMATION_MAX_DELAY_MS") {
            self.animation.max_delay_ms = parse_env("ISV_ANIMATION_MAX_DELAY_MS", &raw)?;
        }
        if let Some(raw) = lookup("ISV_ANIMATION_POLL_INTERVAL_MS") {
            self.animation.poll_interval_ms = parse_env("ISV_ANIMATION_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("ISV_TRACE_JSONL_PATH") {
            self.trace.jsonl_path = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_NUM_VALUES).contains(&self.array.num_values) {
            return Err(IsvError::invalid(format!(
                "array.num_values must be in [1, {MAX_NUM_VALUES}], got {}",
                self.array.num_values
            )));
        }
        if !(1..=MAX_VALUE_RANGE).contains(&self.array.value_range) {
            return Err(IsvError::invalid(format!(
                "array.value_range must be in [1, {MAX_VALUE_RANGE}], got {}",
                self.array.value_range
            )));
        }
        if self.animation.speed > MAX_SPEED {
            return Err(IsvError::invalid(format!(
                "animation.speed must be in [0, {MAX_SPEED}], got {}",
                self.animation.speed
            )));
        }
        if self.animation.poll_interval_ms == 0 {
            return Err(IsvError::invalid(
                "animation.poll_interval_ms must be >= 1",
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| IsvError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
