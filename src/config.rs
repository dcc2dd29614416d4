#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_NEWTUBE_PORT: u16 = 8080;
pub const DEFAULT_NEWTUBE_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1024;

pub const API_KEY_VAR: &str = "YOUTUBE_API_KEY";

/// Everything the lookup backend needs at startup.
///
/// A missing `api_key` does not stop the server from binding; each lookup
/// reports it as a configuration error.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub newtube_host: String,
    pub newtube_port: u16,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

impl LookupConfig {
    pub fn cache_ttl(&self) -> TimeDelta {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LookupOverrides {
    pub newtube_port: Option<u16>,
    pub newtube_host: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_lookup_config(overrides: LookupOverrides) -> Result<LookupConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_lookup_config_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_lookup_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> LookupConfig {
    build_lookup_config_with_overrides(file_vars, env_lookup, LookupOverrides::default())
}

fn build_lookup_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: LookupOverrides,
) -> LookupConfig {
    let api_key = lookup_value(API_KEY_VAR, file_vars, &env_lookup);
    let api_base = lookup_value("YOUTUBE_API_BASE", file_vars, &env_lookup)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let newtube_port = overrides
        .newtube_port
        .or_else(|| {
            lookup_value("NEWTUBE_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_NEWTUBE_PORT);
    let newtube_host = overrides
        .newtube_host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup_value("NEWTUBE_HOST", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_NEWTUBE_HOST.to_string());
    let cache_ttl_secs = lookup_value("NEWTUBE_CACHE_TTL_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_CACHE_TTL_SECS);
    let cache_max_entries = lookup_value("NEWTUBE_CACHE_MAX_ENTRIES", file_vars, &env_lookup)
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|max| *max > 0)
        .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);

    LookupConfig {
        api_key,
        api_base,
        newtube_host,
        newtube_port,
        cache_ttl_secs,
        cache_max_entries,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
