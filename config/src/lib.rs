//! Layered configuration: exports keys into the process environment with priority
//! **existing env > project `.env` > XDG `config.toml`**.
//!
//! The XDG file is `$XDG_CONFIG_HOME/<app>/config.toml` (falling back to the platform
//! config directory). Two tables are read:
//!
//! ```toml
//! [env]
//! RUST_LOG = "mindgraph=debug"
//!
//! [engine]
//! max_turn = 5          # exported as MINDGRAPH_MAX_TURN for app "mindgraph"
//! ```
//!
//! `[engine]` keys are prefixed with the upper-cased app name, so consumers only ever
//! read environment variables.

mod dotenv;
#[cfg(feature = "tracing-init")]
mod tracing_init;
mod xdg_toml;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "tracing-init")]
pub use tracing_init::{init_tracing, TracingGuard};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("unsupported value for [engine] key {0}: only strings, integers, floats and booleans")]
    EngineValue(String),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads the XDG file and the project `.env` for `app_name` and sets every key that is not
/// already present in the process environment.
///
/// * `override_dir`: directory holding `.env`; defaults to the current directory.
///
/// Returns the keys that were set.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<Vec<String>, LoadError> {
    let xdg = xdg_toml::load_env_map(app_name)?;
    let dotenv = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut applied = Vec::new();
    for (key, value) in merge(&xdg, &dotenv) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied.push(key);
    }
    applied.sort();
    Ok(applied)
}

/// `.env` values shadow XDG values for the same key.
fn merge(xdg: &HashMap<String, String>, dotenv: &HashMap<String, String>) -> HashMap<String, String> {
    let keys: HashSet<&String> = xdg.keys().chain(dotenv.keys()).collect();
    keys.into_iter()
        .filter_map(|k| {
            dotenv
                .get(k)
                .or_else(|| xdg.get(k))
                .map(|v| (k.clone(), v.clone()))
        })
        .collect()
}
