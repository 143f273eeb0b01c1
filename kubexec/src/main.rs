use clap::Parser;
use kubexec::cli::{self, Cli};

fn main() {
    // Must run before any thread is spawned.
    cli::init_local_offset();

    let args = Cli::parse();
    let verbose = args.verbose || cli::verbose_from_env();
    cli::init_logger(verbose, args.verbose);

    let exit_code = match args.run() {
        Ok(exit_code) => exit_code,
        Err(error) => {
            cli::report_error(&error, verbose);
            error.exit_code()
        }
    };
    std::process::exit(exit_code);
}
