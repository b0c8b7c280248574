use anyhow::Context;
use clap::Parser;
use daemon_link::cli::{self, output, CheckCommand, Cli, Commands};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    // wss:// needs a process-wide rustls provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Watch(args) => cli::watch::execute(&args)
            .await
            .with_context(|| format!("watch failed ({})", args.config.display())),
        Commands::Check(CheckCommand::Config(arg)) => cli::check::execute_config(&arg.config)
            .with_context(|| format!("invalid configuration ({})", arg.config.display())),
    }
}
