mod cli_main;

use clap::Parser;
use tracing_subscriber::FmtSubscriber;

use cli_main::Cli;

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Setting tracing default failed");

    let cli = Cli::parse();
    if let Err(e) = cli_main::run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
