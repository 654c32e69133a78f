pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lens")]
#[command(about = "Read startup articles at your level, in your language", long_about = None)]
pub struct Cli {
    /// Base URL of the content service (overrides the config file)
    #[arg(long, global = true)]
    pub api: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List articles from all feeds
    Feeds {
        /// Only show feeds in this category ("Latest" shows all)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Choose the topics you want to read about
    Interests {
        #[command(subcommand)]
        action: InterestsAction,
    },
    /// Free-text descriptions of the blogs you like
    Signals {
        #[command(subcommand)]
        action: SignalsAction,
    },
    /// Show articles recommended for your interests and signals
    Recommend,
    /// Read an article
    Read {
        /// Item id as shown by `feeds` or `recommend`
        item_id: String,

        /// Complexity level, 1 (Basic) to 5 (Expert)
        #[arg(short, long)]
        level: Option<u8>,

        /// Show the original text instead of a rewritten version
        #[arg(long)]
        original: bool,

        /// Translate into this language (english, hindi, punjabi)
        #[arg(long)]
        lang: Option<String>,

        /// Show the summary instead of the full text
        #[arg(short, long)]
        summary: bool,

        /// Fetch the full article text from its page
        #[arg(long)]
        full: bool,
    },
    /// Explain a passage of an article
    Explain {
        item_id: String,
        /// The selected text
        text: String,
    },
    /// Show or set the reading font size (small, medium, large)
    FontSize { size: Option<String> },
    /// Forget interests, signals, settings and cached transforms
    Reset,
}

#[derive(Subcommand)]
pub enum InterestsAction {
    /// List the catalog, marking selected interests
    List,
    /// Select an interest by id or name
    Add { interest: String },
    /// Deselect an interest by id or name
    Remove { interest: String },
    /// Finish selecting and fetch recommendations
    Done,
}

#[derive(Subcommand)]
pub enum SignalsAction {
    List,
    Add { text: String },
    Remove { text: String },
}
