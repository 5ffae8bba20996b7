// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./omnidesk.toml` > `~/.config/omnidesk/omnidesk.toml` > `/etc/omnidesk/omnidesk.toml`
//! with environment variable overrides via `OMNIDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::OmnideskConfig;

/// Config sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "server", "webhook", "storage", "meta", "gmail", "crm", "realtime",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/omnidesk/omnidesk.toml` (system-wide)
/// 3. `~/.config/omnidesk/omnidesk.toml` (user XDG config)
/// 4. `./omnidesk.toml` (local directory)
/// 5. `OMNIDESK_*` environment variables
pub fn load_config() -> Result<OmnideskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<OmnideskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OmnideskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<OmnideskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(OmnideskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(OmnideskConfig::default()))
        .merge(Toml::file("/etc/omnidesk/omnidesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("omnidesk/omnidesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("omnidesk.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// key names survive: `OMNIDESK_META_WA_ACCESS_TOKEN` maps to
/// `meta.wa_access_token`, not `meta.wa.access.token`.
fn env_provider() -> Env {
    Env::prefixed("OMNIDESK_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to its dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
