//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod queue;
mod stream;

pub use queue::QueueCommands;
pub use stream::StreamCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::Item;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Queue management and consumption
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Stream management and shard reads
    Stream {
        #[command(subcommand)]
        command: StreamCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Queue { command } => queue::handle_queue_command(command, config),
        Commands::Stream { command } => stream::handle_stream_command(command, config),
    }
}

/// Render an item as one JSON line
fn item_to_json(item: &Item) -> serde_json::Value {
    serde_json::json!({
        "payload": item.payload_lossy(),
        "metadata": item.metadata,
    })
}

/// Print a received item, either as JSON or for humans
fn print_item(item: &Item, json: bool) {
    if json {
        println!("{}", item_to_json(item));
        return;
    }

    println!("  {} {}", "▸".cyan(), item.payload_lossy());
    for (key, value) in &item.metadata {
        println!("    {}: {}", key, value.dimmed());
    }
}
