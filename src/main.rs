use std::process::ExitCode;

use clap::Parser;
use dip_smc_pso::cli::args::{CommandsEnum, DipSmcPsoArgs, ParameterFilePath};
use dip_smc_pso::cli::optimize::{run_optimization, OptimizeParams};
use dip_smc_pso::cli::simulate::{run_simulation, SimulateParams};
use dip_smc_pso::core::file_io::{
    build_output_path_with_date_time, extract_base_name, maybe_date_time_string, read_json,
    FilePrefix,
};
use dip_smc_pso::core::logging::init_tracing;
use dip_smc_pso::error::{ConfigError, DipError};

fn build_file_prefix(params: &ParameterFilePath, command: &str) -> Result<FilePrefix, DipError> {
    let directory_path = build_output_path_with_date_time(
        &params.params_path,
        command,
        &maybe_date_time_string(params.date_time_out),
    )
    .map_err(ConfigError::from)?;
    Ok(FilePrefix {
        directory_path,
        file_base: extract_base_name(&params.params_path).to_owned(),
    })
}

fn run(args: DipSmcPsoArgs) -> Result<(), DipError> {
    match &args.command {
        Some(CommandsEnum::Optimize(params)) => {
            let optimize_params: OptimizeParams = read_json(&params.params_path)?;
            run_optimization(&optimize_params, &build_file_prefix(params, "optimize")?)?;
        }
        Some(CommandsEnum::Simulate(params)) => {
            let simulate_params: SimulateParams = read_json(&params.params_path)?;
            run_simulation(&simulate_params, &build_file_prefix(params, "simulate")?)?;
        }
        None => {
            tracing::warn!("no command given, see --help");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = DipSmcPsoArgs::parse();
    if let Err(err) = init_tracing() {
        eprintln!("{}", err);
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
