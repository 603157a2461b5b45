//! CLI entry point for shattering images and converging canvas stacks

use clap::Parser;
use shatterstack::io::cli::{Cli, CommandRunner, init_tracing};

fn main() -> shatterstack::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());
    let mut runner = CommandRunner::new(cli);
    runner.run()
}
