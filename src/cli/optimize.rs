use serde::{Deserialize, Serialize};

use crate::core::file_io::FilePrefix;
use crate::error::DipError;
use crate::optimization::{optimize_controller, CampaignOutput, CancellationToken, OptimizationConfig};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OptimizeParams {
    pub optimization: OptimizationConfig,
}

/// Run the campaign and write `<prefix>_result.json`.
pub fn run_optimization(
    params: &OptimizeParams,
    file_prefix: &FilePrefix,
) -> Result<CampaignOutput, DipError> {
    let output = optimize_controller(&params.optimization, &CancellationToken::new())?;
    let path = file_prefix.write_json("_result.json", &output.artifact)?;
    tracing::info!(
        path = %path.display(),
        best_cost = output.result.best_cost,
        status = ?output.result.status,
        "wrote gain result"
    );
    Ok(output)
}
