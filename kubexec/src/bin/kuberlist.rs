use clap::Parser;
use kubexec::cli::{self, ListCli};

fn main() {
    cli::init_local_offset();

    let args = ListCli::parse();
    let verbose = args.verbose || cli::verbose_from_env();
    cli::init_logger(verbose, args.verbose);

    if let Err(error) = args.run() {
        cli::report_error(&error, verbose);
        std::process::exit(error.exit_code());
    }
}
