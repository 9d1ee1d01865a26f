//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use tracing::info;

use crate::error::CliError;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Load the blueprint at `path`, or the built-in SOURCE/EVEN/ODD layout
fn load_blueprint(path: Option<&Path>) -> Result<RouterBlueprint> {
    let Some(path) = path else {
        info!("No configuration given, using built-in routing table");
        return Ok(RouterBlueprint::default());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
