pub mod chat;
pub mod init;
pub mod memory;
pub mod skills;

use std::path::Path;

use anyhow::Context;
use capstan_config::AppConfig;

pub(crate) fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    AppConfig::load(explicit).context("Failed to load config")
}
