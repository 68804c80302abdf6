use super::super::args::*;
use crate::exit_codes::SUCCESS;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Validate(args) => super::validate::run(args),
        Command::Route(args) => super::route::run(args),
        Command::Check(args) => super::check::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
