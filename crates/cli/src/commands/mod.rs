//! Command implementations.

mod info;
mod run;
mod sweep;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use sweep::run_sweep;
pub use validate::run_validate;

use std::path::Path;

use contracts::ExperimentBlueprint;
use tracing::info;

use crate::error::{CliError, Result};

/// Load and validate a blueprint, reporting a missing file distinctly
pub(crate) fn load_blueprint(path: &Path) -> Result<ExperimentBlueprint> {
    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
