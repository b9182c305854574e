mod config;
mod logging;
mod run;

use std::process::ExitCode;

fn main() -> ExitCode {
    run::run_app()
}
