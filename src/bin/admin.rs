use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use player_store::{
    PlayerStorage, StoredRecord,
    config::read_config_file,
    storage,
    util::get_config_path,
};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults to $PLAYER_STORE_CONFIG, then ./player-store.json)
    #[arg(short)]
    file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Connect to the configured backend and report its state
    Check,

    /// Print the stored data of one player
    Get { uuid: String },

    /// Delete the stored data of one player
    Delete { uuid: String },

    /// Print every stored record as one JSON object
    Dump,

    /// Rewrite legacy records in the current shape
    Migrate,
}

/// The binary shares the `player_store` crate name, so one target covers
/// both its own events and the library's.
fn log_filter() -> filter::Targets {
    filter::Targets::new().with_target("player_store", LevelFilter::TRACE)
}

fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(log_filter())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = get_config_path(args.file.as_deref());
    debug!("reading config from {path}");
    let config = read_config_file(&path)?;

    let storage =
        storage::from_config(&config.storage)?.with_probe_timeout(config.probe_timeout());
    storage.connect().await?;

    let result = run(&storage, args.command).await;
    storage.close().await;
    result
}

async fn run(storage: &PlayerStorage, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Check => {
            let closed = storage.is_closed().await;
            let records = storage.load_records().await;
            let legacy = records.values().filter(|r| r.is_legacy()).count();
            println!(
                "backend: {}\nconnected: {}\nrecords: {}\nlegacy: {legacy}",
                storage.store().kind(),
                !closed,
                records.len(),
            );
        }
        Command::Get { uuid } => {
            let data = storage.get_user_data(&uuid).await;
            if data.is_empty() {
                anyhow::bail!("no data stored for {uuid}");
            }
            println!("{data}");
        }
        Command::Delete { uuid } => {
            if !storage.is_user_registered(&uuid).await {
                anyhow::bail!("no data stored for {uuid}");
            }
            storage.delete_user_data(&uuid).await;
            info!("deleted {uuid}");
        }
        Command::Dump => {
            let players: BTreeMap<String, serde_json::Value> = storage
                .load_records()
                .await
                .into_iter()
                .map(|(uuid, record)| Ok((uuid, dump_value(record)?)))
                .collect::<anyhow::Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&players)?);
        }
        Command::Migrate => {
            let migrated = storage.migrate_legacy().await;
            println!("migrated {migrated} legacy records");
        }
    }

    Ok(())
}

fn dump_value(record: StoredRecord) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(record.into_current())?)
}
