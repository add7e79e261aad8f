//! Stream command handlers
//!
//! Handles stream lifecycle commands, record writes, and shard reads
//! driven by the cursor poller.

use anyhow::{Context, Result};
use clap::Subcommand;
use clap::builder::TypedValueParser as _;
use colored::*;
use sluice_client::source::StreamSource;
use sluice_client::stream::MAX_RECORDS_PER_READ;
use sluice_client::{ClientError, ServiceClient, ShardPosition, StreamRecord};
use sluice_core::{
    Batch, BatchSource, ContinueSignal, Cursor, Item, ResourceKind, ResourceRegistry,
    TerminationReason,
};
use std::time::Duration;
use tracing::{debug, info};

use super::print_item;
use crate::config::Config;
use crate::resolver::resolve_shard_id;
use crate::resume::poll_with_resume;

/// Stream subcommands
#[derive(Subcommand)]
pub enum StreamCommands {
    /// Create a stream
    Create {
        /// Stream name
        name: String,

        /// Number of shards
        #[arg(long, default_value_t = 1)]
        shards: u32,
    },
    /// Delete a stream
    Delete {
        /// Stream name
        name: String,
    },
    /// Describe a stream and list its shards
    Shards {
        /// Stream name
        stream: String,
    },
    /// Write one record
    Put {
        /// Stream name
        stream: String,

        /// Partition key deciding the target shard
        #[arg(long)]
        partition_key: String,

        /// Record payload
        data: String,
    },
    /// Read records from one shard
    Read {
        /// Stream name
        stream: String,

        /// Shard to read (defaults to the first shard)
        #[arg(long)]
        shard_id: Option<String>,

        /// Start position: latest, trim-horizon, at:<seq> or after:<seq>
        #[arg(long, default_value = "latest")]
        from: ShardPosition,

        /// Records requested per read
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..=MAX_RECORDS_PER_READ as u64).map(|n| n as usize))]
        batch_size: usize,

        /// Stop after this many records
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
        max_records: Option<usize>,

        /// Stop after this many consecutive empty reads (0 follows forever)
        #[arg(long, default_value_t = 3)]
        idle_polls: u32,

        /// Pause between reads, in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,

        /// Continue from a shard iterator printed by an earlier read
        #[arg(long, conflicts_with = "from")]
        resume_iterator: Option<String>,

        /// Print one JSON object per record
        #[arg(long)]
        json: bool,
    },
}

/// Handle stream commands
pub fn handle_stream_command(command: StreamCommands, config: &Config) -> Result<()> {
    let client = config.build_client()?;
    let mut registry = ResourceRegistry::new();

    match command {
        StreamCommands::Create { name, shards } => create_stream(&client, &name, shards),
        StreamCommands::Delete { name } => delete_stream(&client, &name),
        StreamCommands::Shards { stream } => describe_stream(&client, &mut registry, &stream),
        StreamCommands::Put {
            stream,
            partition_key,
            data,
        } => put_record(&client, &stream, &partition_key, &data),
        StreamCommands::Read {
            stream,
            shard_id,
            from,
            batch_size,
            max_records,
            idle_polls,
            poll_interval_ms,
            resume_iterator,
            json,
        } => {
            let shard_id = resolve_shard_id(&client, &mut registry, &stream, shard_id)?;
            let options = ReadOptions {
                batch_size,
                max_records,
                idle_polls,
                poll_interval: Duration::from_millis(poll_interval_ms),
                json,
            };
            read_shard(
                &client,
                config,
                &stream,
                &shard_id,
                from,
                resume_iterator.map(Cursor::new),
                &options,
            )
        }
    }
}

fn create_stream(client: &ServiceClient, name: &str, shards: u32) -> Result<()> {
    client
        .create_stream(name, shards)
        .with_context(|| format!("Failed to create stream '{}'", name))?;

    println!("{}", "✓ Stream created successfully!".green().bold());
    println!("  Name:   {}", name.bold());
    println!("  Shards: {}", shards.to_string().cyan());

    Ok(())
}

fn delete_stream(client: &ServiceClient, name: &str) -> Result<()> {
    client
        .delete_stream(name)
        .with_context(|| format!("Failed to delete stream '{}'", name))?;

    println!("{} Deleted stream {}", "✓".green(), name.bold());

    Ok(())
}

/// Describe a stream and register its ARN
fn describe_stream(
    client: &ServiceClient,
    registry: &mut ResourceRegistry,
    stream: &str,
) -> Result<()> {
    let description = client
        .describe_stream(stream)
        .with_context(|| format!("Failed to describe stream '{}'", stream))?;

    registry.insert(ResourceKind::StreamArn, stream, description.arn.clone());
    let arn = registry.require(ResourceKind::StreamArn, stream)?;

    println!("{}", "Stream Details:".bold());
    println!("  Name:   {}", description.name.bold());
    println!("  ARN:    {}", arn.cyan());
    println!("  Status: {}", colorize_status(&description.status));

    if description.shard_ids.is_empty() {
        println!("{}", "No shards found.".yellow());
    } else {
        println!();
        println!(
            "{}",
            format!("Found {} shard(s):", description.shard_ids.len()).bold()
        );
        for shard_id in &description.shard_ids {
            println!("  {} {}", "▸".cyan(), shard_id);
        }
        if description.has_more_shards {
            println!("  {}", "(more shards not shown)".dimmed());
        }
    }

    Ok(())
}

fn put_record(client: &ServiceClient, stream: &str, partition_key: &str, data: &str) -> Result<()> {
    let result = client
        .put_record(stream, partition_key, data.as_bytes())
        .with_context(|| format!("Failed to write to stream '{}'", stream))?;

    println!("{}", "✓ Record written".green().bold());
    println!("  Shard:    {}", result.shard_id.cyan());
    println!("  Sequence: {}", result.sequence_number.dimmed());

    Ok(())
}

struct ReadOptions {
    batch_size: usize,
    max_records: Option<usize>,
    idle_polls: u32,
    poll_interval: Duration,
    json: bool,
}

/// Wraps a shard source with pacing and an idle cutoff
///
/// Open shards never run out of iterators, so the read is declared done
/// after `idle_polls` consecutive empty reads. The last iterator seen is
/// kept so the read can be continued later.
struct PacedShard<'s, 'c> {
    source: &'s mut StreamSource<'c>,
    idle_polls: u32,
    poll_interval: Duration,
    empty_reads: u32,
    fetched_once: bool,
    last_iterator: Option<Cursor>,
}

impl BatchSource for PacedShard<'_, '_> {
    type Item = StreamRecord;
    type Error = ClientError;

    fn fetch(
        &mut self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> sluice_client::Result<Batch<StreamRecord>> {
        if self.fetched_once {
            std::thread::sleep(self.poll_interval);
        }
        self.fetched_once = true;

        let batch = self.source.fetch(cursor, limit)?;

        // A closed shard hands back no iterator; nothing is left to resume
        self.last_iterator = batch.next.clone();

        if batch.is_empty() {
            self.empty_reads += 1;
            if self.idle_polls > 0 && self.empty_reads >= self.idle_polls {
                debug!("No records after {} read(s), stopping", self.empty_reads);
                return Ok(Batch::exhausted(Vec::new()));
            }
        } else {
            self.empty_reads = 0;
        }

        Ok(batch)
    }
}

/// Read a shard until it closes, goes idle, or `max_records` is reached
fn read_shard(
    client: &ServiceClient,
    config: &Config,
    stream: &str,
    shard_id: &str,
    from: ShardPosition,
    resume_iterator: Option<Cursor>,
    options: &ReadOptions,
) -> Result<()> {
    let mut source = StreamSource::new(client, stream, shard_id, from);
    let mut paced = PacedShard {
        source: &mut source,
        idle_polls: options.idle_polls,
        poll_interval: options.poll_interval,
        empty_reads: 0,
        fetched_once: false,
        last_iterator: resume_iterator.clone(),
    };

    let mut count = 0usize;
    let mut last_sequence: Option<String> = None;

    let outcome = poll_with_resume(
        &mut paced,
        options.batch_size,
        resume_iterator,
        &config.retry,
        ClientError::is_retryable,
        |record| {
            last_sequence = Some(record.sequence_number.clone());
            print_item(&Item::from(record), options.json);
            count += 1;

            let done = options.max_records.is_some_and(|max| count >= max);
            ContinueSignal::from(!done)
        },
    )?;

    let last_iterator = paced.last_iterator.take();
    let behind = source.millis_behind_latest();

    match outcome {
        TerminationReason::SourceError { error, cursor } => {
            if let Some(cursor) = cursor {
                eprintln!("{} --resume-iterator {}", "Resume with".yellow(), cursor);
            }
            Err(error).with_context(|| {
                format!(
                    "Reading {}/{} failed after {} record(s)",
                    stream, shard_id, count
                )
            })
        }
        TerminationReason::ConsumerStopped => {
            info!("Stopped after {} record(s) from {}", count, shard_id);
            if !options.json {
                println!();
                println!("{}", format!("Read {} record(s)", count).bold());
                if let Some(sequence) = last_sequence {
                    println!("  Continue with: --from after:{}", sequence.cyan());
                }
            }
            Ok(())
        }
        TerminationReason::SourceExhausted => {
            if !options.json {
                println!();
                println!(
                    "{}",
                    format!("Reading completed: {} record(s)", count).bold()
                );
                if let Some(ms) = behind {
                    println!("  Behind latest: {}", format!("{} ms", ms).dimmed());
                }
                match last_iterator {
                    Some(iterator) => {
                        println!("  Continue with: --resume-iterator {}", iterator.as_str().dimmed())
                    }
                    None => println!("  {}", "Shard is closed".dimmed()),
                }
            }
            Ok(())
        }
    }
}

/// Colorize a stream status for display
fn colorize_status(status: &str) -> ColoredString {
    match status {
        "ACTIVE" => status.green(),
        "CREATING" | "UPDATING" => status.yellow(),
        "DELETING" => status.red(),
        _ => status.normal(),
    }
}
