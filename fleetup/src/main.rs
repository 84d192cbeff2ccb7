mod create;
mod deploy;
mod status;
mod subnet;

use std::{
    io::{self, Error, ErrorKind},
    path::PathBuf,
};

use clap::{crate_version, Arg, ArgMatches, Command};

const APP_NAME: &str = "fleetup";

/// Default state directory under the home directory.
pub const DEFAULT_BASE_DIR_NAME: &str = ".avalanche-fleet";

#[tokio::main]
async fn main() -> io::Result<()> {
    let matches = Command::new(APP_NAME)
        .version(crate_version!())
        .about("Avalanche validator fleets on AWS and GCP, and subnet genesis configuration")
        .subcommands(vec![
            create::command(),
            status::command(),
            deploy::command(),
            subnet::command(),
        ])
        .get_matches();

    match matches.subcommand() {
        Some((create::NAME, sub_matches)) => {
            create::execute(
                &log_level(sub_matches),
                base_dir(sub_matches)?,
                create::options(sub_matches),
            )
            .await
        }

        Some((status::NAME, sub_matches)) => {
            status::execute(
                &log_level(sub_matches),
                base_dir(sub_matches)?,
                status::options(sub_matches),
            )
            .await
        }

        Some((deploy::NAME, sub_matches)) => {
            deploy::execute(
                &log_level(sub_matches),
                base_dir(sub_matches)?,
                deploy::options(sub_matches),
            )
            .await
        }

        Some((subnet::NAME, sub_matches)) => match sub_matches.subcommand() {
            Some((subnet::create::NAME, create_matches)) => {
                subnet::create::execute(
                    &log_level(create_matches),
                    base_dir(create_matches)?,
                    subnet::create::options(create_matches),
                )
                .await
            }
            _ => Err(Error::new(
                ErrorKind::InvalidInput,
                "unknown subnet subcommand",
            )),
        },

        _ => Err(Error::new(ErrorKind::InvalidInput, "unknown subcommand")),
    }
}

/// "--log-level" shared by every subcommand.
pub fn log_level_arg() -> Arg {
    Arg::new("LOG_LEVEL")
        .long("log-level")
        .short('l')
        .help("Sets the log level")
        .required(false)
        .num_args(1)
        .value_parser(["debug", "info"])
        .default_value("info")
}

pub fn base_dir_arg() -> Arg {
    Arg::new("BASE_DIR")
        .long("base-dir")
        .help("Sets the state directory (default $HOME/.avalanche-fleet)")
        .required(false)
        .num_args(1)
}

fn log_level(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("LOG_LEVEL")
        .unwrap_or(&String::from("info"))
        .clone()
}

fn base_dir(matches: &ArgMatches) -> io::Result<PathBuf> {
    if let Some(d) = matches.get_one::<String>("BASE_DIR") {
        return Ok(PathBuf::from(d));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "no home directory, set --base-dir"))?;
    Ok(home.join(DEFAULT_BASE_DIR_NAME))
}

/// ref. https://github.com/env-logger-rs/env_logger/issues/47
pub fn init_logger(log_level: &str) {
    let _ = env_logger::try_init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
}
