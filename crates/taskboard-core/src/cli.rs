use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::View;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    version,
    about = "Taskboard: a local-first task board that syncs with a taskboard server"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    /// rc file to read instead of $TASKBOARDRC / ~/.taskboardrc.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Directory holding tasks.json.
    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Base URL of the task API, e.g. http://localhost:5000.
    #[arg(long = "api")]
    pub api: Option<String>,

    /// Work against the local board only.
    #[arg(long = "offline")]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a task to the top of the board.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    /// Show one view, or all three when none is given.
    List { view: Option<View> },
    /// Change the title, date or time of a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    /// Flip a task between active and completed.
    Toggle { id: String },
    Delete { id: String },
    /// Drag a task: positions start at 1. Leaving out the destination
    /// cancels the drag.
    Move {
        source: View,
        source_position: usize,
        destination: Option<View>,
        destination_position: Option<usize>,
    },
    /// Re-fetch the board from the server.
    Sync,
    Status,
    /// Stay running and follow the server until interrupted, re-checking
    /// reachability every `--every` seconds.
    Watch {
        #[arg(long, default_value_t = 30)]
        every: u64,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Converts a 1-based position from the command line.
pub fn position_to_index(position: usize) -> anyhow::Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}
