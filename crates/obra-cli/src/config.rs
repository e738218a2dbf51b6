// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use obra_app::TabKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";

pub const APP_NAME: &str = "obra";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendConfig::default(),
            auth: Auth::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Auth {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub start_tab: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("OBRA_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set OBRA_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
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
                    "config file {} is not versioned. Add `version = 1` and place values under [backend], [auth], and [ui]",
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
        if let Some(base_url) = &self.backend.base_url {
            obra_client::validate_base_url(base_url)
                .with_context(|| format!("invalid [backend] in {}", path.display()))?;
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(start_tab) = &self.ui.start_tab
            && TabKind::parse(start_tab).is_none()
        {
            bail!(
                "ui.start_tab in {} is not a known tab: {:?}",
                path.display(),
                start_tab
            );
        }

        Ok(())
    }

    pub fn backend_base_url(&self) -> Result<&str> {
        let base_url = self.backend.base_url.as_deref().ok_or_else(|| {
            anyhow!(
                "backend.base_url is not set -- run `obra --print-example-config` for a template"
            )
        })?;
        Ok(base_url.trim_end_matches('/'))
    }

    /// The anon key may come from the environment instead of the config
    /// file, so the file can be committed without credentials.
    pub fn backend_anon_key(&self) -> Result<String> {
        if let Ok(key) = env::var("OBRA_ANON_KEY")
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
        self.backend.anon_key.clone().ok_or_else(|| {
            anyhow!("backend.anon_key is not set -- set it in the config or via OBRA_ANON_KEY")
        })
    }

    pub fn backend_timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn auth_email(&self) -> &str {
        self.auth.email.as_deref().unwrap_or("")
    }

    pub fn start_tab(&self) -> Option<TabKind> {
        self.ui.start_tab.as_deref().and_then(TabKind::parse)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# obra config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\nbase_url = \"https://your-project.example.co\"\n# Prefer the OBRA_ANON_KEY environment variable for this value.\n# anon_key = \"...\"\ntimeout = \"{}\"\n\n[auth]\n# Prefills the sign-in form.\n# email = \"you@example.com\"\n\n[ui]\n# start_tab = \"estimates\"\n",
            path.display(),
            DEFAULT_TIMEOUT,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
