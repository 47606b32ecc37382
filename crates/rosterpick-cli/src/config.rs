// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_CONNECT_DELAY: &str = "250ms";
const DEFAULT_POLL_INTERVAL: &str = "2s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            backend: Backend::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_searching: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_searching: Some(false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub connect_delay: Option<String>,
    pub poll_interval: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            connect_delay: Some(DEFAULT_CONNECT_DELAY.to_owned()),
            poll_interval: Some(DEFAULT_POLL_INTERVAL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROSTERPICK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set ROSTERPICK_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(rosterpick_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [storage], [ui], [backend] and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            rosterpick_db::validate_db_path(db_path)?;
        }

        if let Some(delay) = &self.backend.connect_delay {
            parse_duration(delay).with_context(|| {
                format!("backend.connect_delay in {} is invalid", path.display())
            })?;
        }

        if let Some(interval) = &self.backend.poll_interval {
            let parsed = parse_duration(interval).with_context(|| {
                format!("backend.poll_interval in {} is invalid", path.display())
            })?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.poll_interval in {} must be positive, got {}",
                    path.display(),
                    interval
                );
            }
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {level:?}",
                path.display(),
                LOG_LEVELS.join(", ")
            );
        }

        if self
            .log
            .file
            .as_deref()
            .is_some_and(|file| file.trim().is_empty())
        {
            bail!("log.file in {} must not be blank", path.display());
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => rosterpick_db::default_db_path(),
        }
    }

    pub fn start_searching(&self) -> bool {
        self.ui.start_searching.unwrap_or(false)
    }

    pub fn connect_delay(&self) -> Result<Duration> {
        parse_duration(
            self.backend
                .connect_delay
                .as_deref()
                .unwrap_or(DEFAULT_CONNECT_DELAY),
        )
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration(
            self.backend
                .poll_interval
                .as_deref()
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        )
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }

        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to a writable log path")
        })?;
        let app_dir = data_root.join(rosterpick_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create data directory {}", app_dir.display()))?;
        Ok(app_dir.join("rosterpick.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# rosterpick config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/rosterpick/rosterpick.db)\n# db_path = \"/absolute/path/to/rosterpick.db\"\n\n[ui]\n# Expand the search field as soon as the picker opens, like passing --search.\nstart_searching = false\n\n[backend]\nconnect_delay = \"{}\"\npoll_interval = \"{}\"\n\n[log]\nlevel = \"{}\"\n# file = \"/absolute/path/to/rosterpick.log\"\n",
            path.display(),
            DEFAULT_CONNECT_DELAY,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

/// Units are matched longest suffix first so `ms` is not read as minutes.
const DURATION_UNITS: [(&str, u64); 3] = [("ms", 1), ("s", 1_000), ("m", 60_000)];

fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    let (amount, millis_per_unit) = DURATION_UNITS
        .iter()
        .find_map(|(suffix, factor)| trimmed.strip_suffix(suffix).map(|amount| (amount, *factor)))
        .ok_or_else(|| {
            anyhow!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 250ms or 2s)")
        })?;
    let amount: u64 = amount
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let millis = amount
        .checked_mul(millis_per_unit)
        .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert!(!config.start_searching());
        assert_eq!(config.connect_delay()?, Duration::from_millis(250));
        assert_eq!(config.poll_interval()?, Duration::from_secs(2));
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[ui]\nstart_searching = true\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[ui]\nstart_searching = true\n[backend]\nconnect_delay = \"0ms\"\npoll_interval = \"1m\"\n[log]\nlevel = \"debug\"\nfile = \"/tmp/picker.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert!(config.start_searching());
        assert_eq!(config.connect_delay()?, Duration::ZERO);
        assert_eq!(config.poll_interval()?, Duration::from_secs(60));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/picker.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    /// Runs `body` with `key` set, restoring the unset state afterwards.
    fn with_env<T>(key: &str, value: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = env_lock();
        // SAFETY: env mutation is serialized by env_lock within this test binary.
        unsafe {
            std::env::set_var(key, value);
        }
        let result = body();
        // SAFETY: as above.
        unsafe {
            std::env::remove_var(key);
        }
        result
    }

    #[test]
    fn config_path_env_override_is_used_verbatim() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let custom = temp.path().join("picker.toml");
        let custom_str = custom.to_string_lossy().into_owned();
        let resolved = with_env("ROSTERPICK_CONFIG_PATH", &custom_str, Config::default_path)?;
        assert_eq!(resolved, custom);
        Ok(())
    }

    #[test]
    fn storage_db_path_beats_env_and_env_beats_default() -> Result<()> {
        let (_explicit_dir, explicit) =
            write_config("version = 1\n[storage]\ndb_path = \"/srv/roster/explicit.db\"\n")?;
        let (_bare_dir, bare) = write_config("version = 1\n")?;

        let (from_config, from_env) = with_env("ROSTERPICK_DB_PATH", "/srv/roster/env.db", || {
            Ok((Config::load(&explicit)?.db_path()?, Config::load(&bare)?.db_path()?))
        })?;
        assert_eq!(from_config, PathBuf::from("/srv/roster/explicit.db"));
        assert_eq!(from_env, PathBuf::from("/srv/roster/env.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ndb_path = \"https://evil.example/rosterpick.db\"\n",
        )?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = error.to_string();
        assert!(
            message.contains("looks like a URI") || message.contains("filesystem path"),
            "unexpected message: {message}"
        );
        Ok(())
    }

    #[test]
    fn durations_accept_each_unit_and_reject_the_rest() -> Result<()> {
        for (raw, expected) in [
            ("250ms", Duration::from_millis(250)),
            (" 3s ", Duration::from_secs(3)),
            ("4m", Duration::from_secs(240)),
            ("0ms", Duration::ZERO),
        ] {
            assert_eq!(parse_duration(raw)?, expected, "{raw}");
        }
        for raw in ["", "ms", "10", "1h", "-5s", "2.5s"] {
            let error = parse_duration(raw).expect_err("rejected duration");
            assert!(error.to_string().contains("duration"), "{raw}: {error}");
        }
        Ok(())
    }

    #[test]
    fn poll_interval_must_be_positive() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\npoll_interval = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero interval should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("bad level should fail");
        assert!(error.to_string().contains("log.level"));

        let (_temp, path) = write_config("version = 1\n[log]\nfile = \"  \"\n")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn example_config_includes_required_sections() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[storage]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[backend]"));
        assert!(example.contains("[log]"));

        let (_temp, written) = write_config(&example)?;
        let parsed = Config::load(&written)?;
        assert_eq!(parsed.log_level(), "info");
        Ok(())
    }
}
