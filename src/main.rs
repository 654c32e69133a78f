use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lens::app::AppContext;
use lens::cli::commands::{self, ReadOptions};
use lens::cli::{Cli, Commands, InterestsAction, SignalsAction};
use lens::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(api) = cli.api {
        config.api.base_url = api;
    }
    let ctx = AppContext::new(config, None)?;

    match cli.command {
        Commands::Feeds { category } => {
            commands::list_feeds(&ctx, category.as_deref()).await?;
        }
        Commands::Interests { action } => match action {
            InterestsAction::List => commands::list_interests(&ctx),
            InterestsAction::Add { interest } => commands::add_interest(&ctx, &interest)?,
            InterestsAction::Remove { interest } => commands::remove_interest(&ctx, &interest)?,
            InterestsAction::Done => commands::finish_interests(&ctx).await?,
        },
        Commands::Signals { action } => match action {
            SignalsAction::List => commands::list_signals(&ctx),
            SignalsAction::Add { text } => commands::add_signal(&ctx, &text),
            SignalsAction::Remove { text } => commands::remove_signal(&ctx, &text),
        },
        Commands::Recommend => {
            commands::recommend(&ctx).await?;
        }
        Commands::Read {
            item_id,
            level,
            original,
            lang,
            summary,
            full,
        } => {
            let options = ReadOptions {
                level,
                original,
                lang,
                summary,
                full,
            };
            commands::read(&ctx, &item_id, options).await?;
        }
        Commands::Explain { item_id, text } => {
            commands::explain(&ctx, &item_id, &text).await?;
        }
        Commands::FontSize { size } => {
            commands::font_size(&ctx, size.as_deref())?;
        }
        Commands::Reset => {
            commands::reset(&ctx)?;
        }
    }

    Ok(())
}
