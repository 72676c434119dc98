use clap::Parser;
use tmvrank::cli::{run, Cli};
use tmvrank::logging::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    run(cli)
}
