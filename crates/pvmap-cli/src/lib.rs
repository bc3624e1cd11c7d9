//! Shared plumbing of the `permas2vmap` and `vmap2permas` binaries.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser};
use log::info;
use pvmap_convert::{
    ConversionOptions, ConversionReport, ConverterConfig, ConvertError, PipelineError,
    StepSelection, VariableSelection,
};

/// Environment variable overriding the VMAP library location.
pub const LIBRARY_ENV: &str = "VMAP_DIR";

pub const FORWARD_EXAMPLES: &str = "\
Examples:
  permas2vmap model.hdf
  permas2vmap model.hdf results.hdf --steps 1.0,2.0 --variables DISPLACEMENT
  permas2vmap model.hdf --variables NODAL_POINT_STRESS,TEMPERATURE --config pvmap.json";

pub const INVERSE_EXAMPLES: &str = "\
Examples:
  vmap2permas model_toVMAP.hdf
  vmap2permas model_toVMAP.hdf --output model.dat";

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// JSON converter configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Converts a PERMAS-HDF model (and results) to VMAP.
#[derive(Debug, Parser)]
#[command(name = "permas2vmap", version, after_help = FORWARD_EXAMPLES)]
pub struct ForwardCli {
    /// PERMAS-HDF file holding the model.
    pub model: Option<PathBuf>,

    /// Separate PERMAS-HDF result file.
    pub results: Option<PathBuf>,

    /// Step values to convert: ALL, NONE or a comma separated list.
    #[arg(long, default_value = "ALL")]
    pub steps: String,

    /// Result variables to convert: ALL, NONE or names with `_` for spaces.
    #[arg(long, default_value = "ALL")]
    pub variables: String,

    /// Output file; defaults to `<model>_toVMAP.hdf`.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ForwardCli {
    pub fn options(&self) -> Result<ConversionOptions, ConvertError> {
        Ok(ConversionOptions {
            steps: self.steps.parse::<StepSelection>()?,
            variables: self.variables.parse::<VariableSelection>()?,
        })
    }
}

/// Writes the model of a VMAP file as PERMAS ASCII.
#[derive(Debug, Parser)]
#[command(name = "vmap2permas", version, after_help = INVERSE_EXAMPLES)]
pub struct InverseCli {
    /// VMAP file to read.
    pub input: Option<PathBuf>,

    /// Output file; defaults to `<input>_toPERMASASCII.dat`.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Configuration file (or defaults) with the library location override.
pub fn load_config(path: Option<&Path>, library_env: Option<OsString>) -> Result<ConverterConfig, ConvertError> {
    let mut config = match path {
        Some(path) => ConverterConfig::from_file(path)?,
        None => ConverterConfig::default(),
    };
    if let Some(dir) = library_env.filter(|d| !d.is_empty()) {
        info!("library location from {LIBRARY_ENV}: {}", dir.to_string_lossy());
        config = config.with_library_location(dir);
    }
    Ok(config)
}

pub fn config_from_args(args: &CommonArgs) -> Result<ConverterConfig, ConvertError> {
    load_config(args.config.as_deref(), std::env::var_os(LIBRARY_ENV))
}

pub fn print_report(report: &ConversionReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("report serialization failed: {err}"),
        }
    } else {
        print!("{}", report.render());
    }
}

/// Prints the outcome of a run and maps it to the process status.
pub fn finish(result: Result<ConversionReport, PipelineError>, output: &Path, json: bool) -> ExitCode {
    match result {
        Ok(report) => {
            print_report(&report, json);
            println!("written: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            print_report(&err.report, json);
            ExitCode::from(1)
        }
    }
}

pub fn usage_error(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::from(2)
}
