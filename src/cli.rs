use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nexus launcher
#[derive(Parser)]
#[command(name = "nexus-launcher")]
#[command(about = "Install, update and launch Nexus games", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Override the data directory (settings, logs, default games folder)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every game's state and whether a launcher update exists
    Status,
    /// Download and install a game
    Install { game: String },
    /// Update an installed game to the remote version
    Update { game: String },
    /// Check a failed game again
    Retry { game: String },
    /// Start a game
    Launch { game: String },
    /// Use an existing copy of a game by pointing at its executable
    Relocate { game: String, exe: PathBuf },
    /// Delete a game's files
    Uninstall { game: String },
    /// Check that a game's executable is present
    Verify { game: String },
    /// Change where new games are installed
    SetInstallPath { dir: PathBuf },
    /// Replace the launcher with the latest release
    SelfUpdate,
}
