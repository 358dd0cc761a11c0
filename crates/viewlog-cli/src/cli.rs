use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use viewlog_core::models::EpisodeFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List episodes with their viewed state
    Episodes {
        /// Which episodes to list: all, watched or pending
        #[arg(short, long, default_value = "all")]
        filter: EpisodeFilter,
    },
    /// Show one episode and its characters
    Show {
        id: u32,
    },
    /// Mark an episode as viewed
    Mark {
        id: u32,
    },
    /// Mark an episode as not viewed
    Unmark {
        id: u32,
    },
    /// Show viewing statistics
    Stats,
    /// Sign in as the given user id
    Login {
        user_id: String,
    },
    /// Sign out; viewed flags will no longer be saved
    Logout,
    /// Print the signed-in user
    Whoami,
}
