use std::process::ExitCode;

fn main() -> ExitCode {
    thosejobs_cli::run()
}
