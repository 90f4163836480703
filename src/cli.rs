use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DeepcutConfig;
use crate::models::YearRange;
use crate::shuffle::ShufflePolicy;

#[derive(Parser, Debug)]
#[command(name = "deepcut")]
#[command(about = "Randomized discovery queue over a music catalog", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover items and print the first ones served
    Play(PlayArgs),
    /// Inspect or maintain the consumption history
    History {
        /// Number of recent ids to show
        #[arg(long, default_value_t = 20)]
        recent: usize,
        /// Keep only this many distinct ids
        #[arg(long)]
        prune: Option<usize>,
        /// Delete all history
        #[arg(long)]
        clear: bool,
        /// History database path
        #[arg(long)]
        history_db: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct PlayArgs {
    /// Ordering policy
    #[arg(short, long)]
    pub policy: Option<ShufflePolicy>,

    /// Number of items to serve
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,

    /// Items gathered per discovery run
    #[arg(long)]
    pub target: Option<usize>,

    #[arg(long)]
    pub max_popularity: Option<u8>,

    /// Reject explicit items
    #[arg(long)]
    pub no_explicit: bool,

    /// Also reject mainstream compilation markers
    #[arg(long)]
    pub obscure: bool,

    #[arg(long)]
    pub from_year: Option<i32>,

    #[arg(long)]
    pub to_year: Option<i32>,

    /// Allowed genre (repeatable)
    #[arg(long = "genre")]
    pub genres: Vec<String>,

    /// Language preference (ISO 639-1), used to pick a search market
    #[arg(long)]
    pub language: Option<String>,

    /// Serve from a JSON catalog dump instead of the remote catalog
    #[arg(long)]
    pub catalog_file: Option<PathBuf>,

    /// History database path
    #[arg(long)]
    pub history_db: Option<PathBuf>,

    /// Never sample recently consumed items
    #[arg(long)]
    pub exclude_recent: bool,

    /// Catalog access token
    #[arg(long, env = "DEEPCUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl PlayArgs {
    /// Overlay command-line choices on a loaded configuration.
    pub fn apply(&self, config: &mut DeepcutConfig) {
        if let Some(policy) = self.policy {
            config.queue.policy = policy;
        }
        if let Some(target) = self.target {
            config.queue.target_count = target;
        }
        if let Some(max) = self.max_popularity {
            config.constraints.max_popularity = max.min(100);
        }
        if self.no_explicit {
            config.constraints.allow_explicit = false;
        }
        if self.obscure {
            config.constraints.obscure_mode = true;
        }
        if self.from_year.is_some() || self.to_year.is_some() {
            config.constraints.year_range = Some(YearRange {
                from: self.from_year.unwrap_or(0),
                to: self.to_year.unwrap_or_else(|| chrono::Utc::now().year()),
            });
        }
        if !self.genres.is_empty() {
            config.constraints.genre_allowlist = Some(self.genres.clone());
        }
        if self.language.is_some() {
            config.language = self.language.clone();
        }
        if self.history_db.is_some() {
            config.history_db = self.history_db.clone();
        }
        if self.exclude_recent {
            config.queue.exclude_recent = true;
        }
    }
}
