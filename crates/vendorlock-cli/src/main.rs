//! vendorlock CLI
//!
//! Command-line interface for writing and verifying vendor trees

use clap::{Parser, Subcommand};
use vendorlock_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "vendorlock")]
#[command(about = "vendorlock - Transactional vendor tree writes", long_about = None)]
struct Cli {
    /// Emit structured JSON logs on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring manifest, lock and vendor in line with a resolved lock
    Ensure(commands::ensure::EnsureArgs),
    /// Report the status of every vendored project
    Verify(commands::verify::VerifyArgs),
}

fn main() {
    let cli = Cli::parse();

    init(if cli.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Ensure(args) => commands::ensure::execute(args),
        Commands::Verify(args) => commands::verify::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
