use std::any::Any;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use flow_core::FlowConfig;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    // stdout carries protocol frames, so logs go to stderr.
    // RUST_LOG=flow_core=debug,flow::webview=info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .compact()
        .try_init();
}

/// Route panics through tracing, tagged with the document being served.
pub fn install_panic_hook(document: String) {
    std::panic::set_hook(Box::new(move |info| {
        let payload = panic_message(info.payload());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        tracing::error!(%document, %location, %payload, "flow-bridge panicked");
    }));
}

pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// `<config_dir>/flow/config.json`, e.g. `~/.config/flow/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "flow").map(|dirs| dirs.config_dir().join("config.json"))
}

/// Config from `explicit` or the default location, then env overrides.
pub fn load_config(explicit: Option<PathBuf>) -> Result<FlowConfig> {
    let config = match explicit.or_else(default_config_path) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            FlowConfig::load(&path).context("Failed to load Flow config")?
        }
        None => FlowConfig::default(),
    };
    Ok(config.with_env_overrides())
}
