//! Kolosal Churn - Main Entry Point
//!
//! Churn scoring dashboard with CLI and server modes.

use clap::Parser;
use kolosal_churn::cli::{
    cmd_info, cmd_models, cmd_overview, cmd_score, cmd_serve, score_selection, Cli, Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_churn=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command.as_ref() else {
        return cmd_overview();
    };
    let config = cli.dashboard_config()?;

    match command {
        Commands::Models => cmd_models(config)?,
        Commands::Score { model, threshold, permutation, repeats, scoring, top, output } => {
            let selection =
                score_selection(&config, model.clone(), *threshold, *permutation, *repeats, *scoring);
            cmd_score(config, selection, *top, output.as_deref())?;
        }
        Commands::Info => cmd_info(config)?,
        Commands::Serve { port, host } => cmd_serve(config, host, *port).await?,
    }

    Ok(())
}
