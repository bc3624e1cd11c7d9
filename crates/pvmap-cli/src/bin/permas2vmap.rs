use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use pvmap_cli::{ForwardCli, config_from_args, finish, init_logging, usage_error};
use pvmap_convert::{ForwardJob, convert_forward};

fn main() -> ExitCode {
    let cli = ForwardCli::parse();
    let Some(model) = cli.model.clone() else {
        let _ = ForwardCli::command().print_help();
        return ExitCode::from(2);
    };
    init_logging();

    let options = match cli.options() {
        Ok(options) => options,
        Err(err) => return usage_error(&err.to_string()),
    };
    let config = match config_from_args(&cli.common) {
        Ok(config) => config,
        Err(err) => return usage_error(&err.to_string()),
    };

    let mut job = ForwardJob::new(model, cli.results.clone());
    if let Some(output) = cli.output.clone() {
        job.output = output;
    }
    finish(convert_forward(&job, &config, &options), &job.output, cli.common.json)
}
