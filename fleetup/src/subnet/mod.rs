pub mod create;

use clap::Command;

pub const NAME: &str = "subnet";

pub fn command() -> Command {
    Command::new(NAME)
        .about("Creates and manages subnet configurations")
        .subcommand_required(true)
        .subcommands(vec![create::command()])
}
