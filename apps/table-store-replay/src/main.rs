//! Replays a store event log into a checkpointed table replica.
//!
//! Provides commands for:
//! - Folding a JSON-lines event log, optionally resuming from a checkpoint
//! - Inspecting the tables and records of a checkpoint

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use table_store_core::codec;
use table_store_core::persistence::CheckpointManager;
use table_store_core::replica::{EventOutcome, ReplicaBuilder, StoreEvent};
use table_store_core::types::SchemaType;
use table_store_core::{HaltPolicy, ReplicaConfig, Table, TableRegistry, UnknownTablePolicy};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fold an event log into the replica
    Replay {
        /// JSON-lines file with one store event per line
        #[arg(short, long)]
        events: PathBuf,

        /// Data directory for checkpoints
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Continue from the checkpoint in the data directory
        #[arg(long)]
        resume: bool,

        /// What a failing event halts
        #[arg(long, value_enum, default_value_t = HaltArg::Stream)]
        halt_policy: HaltArg,

        /// Handling of events for tables not registered yet
        #[arg(long, value_enum, default_value_t = UnknownTablesArg::Reject)]
        unknown_tables: UnknownTablesArg,

        /// Trust the encoded lengths carried by dynamic splices
        #[arg(long)]
        no_verify: bool,

        /// Write a checkpoint every N events (0 writes only at the end)
        #[arg(long, default_value_t = 0)]
        checkpoint_every: u64,
    },

    /// Print the tables or the records of one table from a checkpoint
    Inspect {
        /// Data directory for checkpoints
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Table as `name`, `namespace:name` or 0x-prefixed id
        #[arg(short, long)]
        table: Option<String>,

        /// Maximum number of records to print
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HaltArg {
    Stream,
    Key,
}

impl From<HaltArg> for HaltPolicy {
    fn from(arg: HaltArg) -> Self {
        match arg {
            HaltArg::Stream => HaltPolicy::Stream,
            HaltArg::Key => HaltPolicy::Key,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnknownTablesArg {
    Reject,
    Buffer,
}

impl From<UnknownTablesArg> for UnknownTablePolicy {
    fn from(arg: UnknownTablesArg) -> Self {
        match arg {
            UnknownTablesArg::Reject => UnknownTablePolicy::Reject,
            UnknownTablesArg::Buffer => UnknownTablePolicy::Buffer,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match cli.command {
        Commands::Replay {
            events,
            data_dir,
            resume,
            halt_policy,
            unknown_tables,
            no_verify,
            checkpoint_every,
        } => {
            let config = ReplicaConfig {
                unknown_table_policy: unknown_tables.into(),
                halt_policy: halt_policy.into(),
                verify_encoded_lengths: !no_verify,
                data_dir,
                ..Default::default()
            };
            replay(config, &events, resume, checkpoint_every)
        }
        Commands::Inspect {
            data_dir,
            table,
            limit,
        } => {
            let config = ReplicaConfig {
                data_dir,
                ..Default::default()
            };
            inspect(config, table.as_deref(), limit)
        }
    }
}

fn replay(config: ReplicaConfig, events: &Path, resume: bool, checkpoint_every: u64) -> Result<()> {
    let manager = CheckpointManager::new(&config);
    let mut builder = if resume {
        manager
            .restore(config.clone())
            .context("Failed to restore checkpoint")?
            .with_context(|| format!("No checkpoint in {}", manager.data_dir().display()))?
    } else {
        ReplicaBuilder::new(config)
    };

    let file = File::open(events).with_context(|| format!("Failed to open {}", events.display()))?;
    let start = builder.next_index();
    tracing::info!("Replaying {} from event {}", events.display(), start);

    let mut rejected = 0u64;
    for (line_no, line) in BufReader::new(file).lines().enumerate().skip(start as usize) {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let event: StoreEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", line_no + 1))?;

        match builder.apply(event) {
            Ok(EventOutcome::Rejected(_)) => rejected += 1,
            Ok(_) => {}
            Err(e) => {
                manager
                    .save(&builder)
                    .context("Failed to checkpoint before stopping")?;
                return Err(e).with_context(|| format!("Replay stopped on line {}", line_no + 1));
            }
        }

        if checkpoint_every > 0 && builder.next_index() % checkpoint_every == 0 {
            manager.save(&builder).context("Failed to write checkpoint")?;
        }
    }

    let checkpoint = manager.save(&builder).context("Failed to write checkpoint")?;
    if builder.pending_events() > 0 {
        tracing::warn!(
            "{} buffered events still wait for their table registration",
            builder.pending_events()
        );
    }
    println!(
        "Replayed {} events ({} rejected): {} tables, {} records, next event {}",
        checkpoint.next_index - start,
        rejected,
        checkpoint.table_count,
        checkpoint.record_count,
        checkpoint.next_index
    );
    Ok(())
}

fn inspect(config: ReplicaConfig, query: Option<&str>, limit: usize) -> Result<()> {
    let manager = CheckpointManager::new(&config);
    let Some(builder) = manager.restore(config).context("Failed to restore checkpoint")? else {
        bail!("No checkpoint in {}", manager.data_dir().display());
    };
    let registry = builder.registry();
    if let Err(e) = registry.validate_records() {
        tracing::warn!("Checkpoint holds records that do not decode: {}", e);
    }

    match query {
        None => print_tables(registry),
        Some(query) => {
            let table = registry
                .find(query)
                .with_context(|| format!("No table matches {}", query))?;
            print_records(table, limit);
        }
    }
    Ok(())
}

fn print_tables(registry: &TableRegistry) {
    for table in registry.tables() {
        println!(
            "{} {:?} key=({}) value=({}) records={}",
            table.id,
            table.kind,
            describe(&table.key_names, table.key_schema.types()),
            describe(&table.field_names, table.value_schema.types()),
            table.record_count()
        );
    }
}

fn describe(names: &[String], types: &[SchemaType]) -> String {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| match names.get(i) {
            Some(name) => format!("{} {}", ty, name),
            None => ty.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_records(table: &Table, limit: usize) {
    let mut records: Vec<_> = table.records().collect();
    records.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (key, record) in records.into_iter().take(limit) {
        let key_text = match codec::decode_key_tuple(&table.key_schema, key) {
            Ok(values) => values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
            Err(_) => key.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(", "),
        };
        let value_text = match table.get_values(key) {
            Ok(Some(values)) => values
                .iter()
                .enumerate()
                .map(|(i, v)| match table.field_names.get(i) {
                    Some(name) => format!("{}={}", name, v),
                    None => v.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Record ({}) of {} does not decode: {}", key_text, table.id, e);
                format!(
                    "0x{} | {} | 0x{}",
                    hex::encode(&record.static_data),
                    record.encoded_lengths.to_word(),
                    hex::encode(&record.dynamic_data)
                )
            }
        };
        println!("({}) -> {}", key_text, value_text);
    }
    if table.record_count() > limit {
        println!("... {} more", table.record_count() - limit);
    }
}
