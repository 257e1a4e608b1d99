use clap::Parser;
use tradegym::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
