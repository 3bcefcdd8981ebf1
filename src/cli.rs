//! This module contains the command-line interface [`Cli`] parser for running the attendance
//! server and managing its records from a terminal.

use clap::{Parser, Subcommand};

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Settings file to load, without its extension.
    #[arg(long, short, default_value = "config")]
    pub config: String,

    /// The different commands available for managing attendance records.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web server.
    Serve,

    /// Create a faculty account.
    CreateFaculty {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },

    /// Show every registered student.
    Roster {
        /// Include branch and photo path.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Show the attendance report, most recent first.
    Report,
}
