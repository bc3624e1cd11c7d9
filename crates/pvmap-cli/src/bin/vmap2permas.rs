use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use pvmap_cli::{InverseCli, config_from_args, finish, init_logging, usage_error};
use pvmap_convert::{convert_inverse, inverse_output_path};

fn main() -> ExitCode {
    let cli = InverseCli::parse();
    let Some(input) = cli.input.as_deref() else {
        let _ = InverseCli::command().print_help();
        return ExitCode::from(2);
    };
    init_logging();

    let config = match config_from_args(&cli.common) {
        Ok(config) => config,
        Err(err) => return usage_error(&err.to_string()),
    };
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| inverse_output_path(input));
    finish(convert_inverse(input, &output, &config), &output, cli.common.json)
}
