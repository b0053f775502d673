use std::process::ExitCode;

fn main() -> ExitCode {
    kampus_cli::run()
}
