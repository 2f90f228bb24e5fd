// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/tandem/tandem.toml`
//! 3. `~/.config/tandem/tandem.toml`
//! 4. `./tandem.toml`
//! 5. `TANDEM_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TandemConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/tandem/tandem.toml";
pub(crate) const LOCAL_CONFIG: &str = "tandem.toml";

/// Config sections that env var names are split on.
const SECTIONS: &[&str] = &["server", "storage", "auth", "realtime"];

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("tandem/tandem.toml"))
        .unwrap_or_default()
}

/// Figment over the full file hierarchy plus env overrides, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TandemConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<TandemConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string over the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<TandemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TandemConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file, with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TandemConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TandemConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// `TANDEM_REALTIME_SEND_BUFFER` must map to `realtime.send_buffer`, so only
/// the first underscore after a known section name becomes a dot. figment
/// hands the mapper the raw, still uppercase key.
fn env_provider() -> Env {
    Env::prefixed("TANDEM_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key
}
