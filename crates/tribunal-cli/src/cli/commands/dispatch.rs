use super::super::args::{Cli, Command};
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Evaluate(args) => super::evaluate::run(args).await,
        Command::Safety(args) => super::safety::run(args),
        Command::Perf(args) => super::perf::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
