mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let json_logs = matches!(&cli.command, Commands::Run(args) if args.json_logs);
    init_logging(json_logs);

    match cli.command {
        Commands::Version => commands::version::run()?,
        Commands::Validate { policy_file } => commands::validate::run(&policy_file).await?,
        Commands::Run(args) => commands::run::run(args).await?,
    }

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
