use clap::Parser;

use bmn_docgen::cli::{self, Cli, Commands};
use bmn_docgen::daemon;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `serve` installs its own subscriber from the loaded config.
    let _guard = if cli.verbose && !matches!(cli.command, Some(Commands::Serve { .. })) {
        daemon::init_tracing(None, "debug")
    } else {
        None
    };

    if let Err(e) = cli::dispatch(&cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
