//! Command line front ends of `kubexec` and `kuberlist`.

mod exec;
mod list;

use std::{error::Error as _, io::Write};

use log::LevelFilter;

pub use self::{exec::Cli, list::ListCli};
/// Has to run before any other thread is spawned.
pub use crate::time_ext::init as init_local_offset;
use crate::{
    cancel::Cancellation,
    config::{self, Config},
    Error, Result,
};

const BOLD_RED: &str = "\x1b[1;31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Whether `KUBEXEC_VERBOSE` asks for debug output.
pub fn verbose_from_env() -> bool {
    std::env::var(config::env::VERBOSE).is_ok_and(|value| config::parse_bool(&value))
}

/// Installs the logger. Records are bare messages unless `detailed` is set. Debug records pass the filter but stay
/// below the maximum level until [`raise_log_level`] runs, so a configuration file loaded later can still enable them.
pub fn init_logger(verbose: bool, detailed: bool) {
    let rust_log_set = std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_some();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"));
    if detailed {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp(),
                record.target(),
                record.level(),
                record.args()
            )
        });
    } else {
        builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    }
    if builder.try_init().is_err() {
        return;
    }

    if !rust_log_set && !verbose {
        log::set_max_level(LevelFilter::Info);
    }
}

pub fn raise_log_level() {
    if log::max_level() < LevelFilter::Debug {
        log::set_max_level(LevelFilter::Debug);
    }
}

/// Prints `error` the way both tools report failures, with its sources when `verbose`.
pub fn report_error(error: &Error, verbose: bool) {
    eprintln!("{BOLD_RED}error{RESET}{BOLD}:{RESET} {error}");
    if verbose {
        let mut source = error.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
    }
}

fn load_config(path: Option<std::path::PathBuf>, kubectl: &crate::kubectl::Kubectl) -> Result<Config> {
    let config = Config::load(path, kubectl)?;
    if config.verbose {
        raise_log_level();
    }
    Ok(config)
}

fn install_ctrlc_handler() -> Result<Cancellation> {
    Cancellation::install_ctrlc_handler().map_err(|error| {
        Error::Configuration(format!("unable to install the Ctrl-C handler: {error}"))
    })
}
