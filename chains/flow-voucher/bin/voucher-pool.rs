use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flow_voucher::{FlowRestConnector, MinterConfig, TracingEventSink, VoucherMinterPool};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Flow voucher minter key-slot pool", long_about = None)]
struct Args {
    /// Path to voucher-pool.toml
    #[arg(short, long, default_value = "config/voucher-pool.toml")]
    config: String,

    /// Per-request timeout against the access node, in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Borrow and release clients concurrently, then print pool stats
    Probe {
        /// Concurrent borrowers
        #[arg(short = 'n', long, default_value_t = 16)]
        concurrency: usize,
    },
    /// Verify user signatures over a hex message
    Verify {
        /// Message in hex
        #[arg(long)]
        message: String,
        /// Account the keys belong to
        #[arg(long)]
        address: String,
        /// Key ids, in signature order
        #[arg(long, value_delimiter = ',', required = true)]
        key_ids: Vec<u32>,
        /// Hex signatures
        #[arg(long, value_delimiter = ',', required = true)]
        signatures: Vec<String>,
    },
    /// Resolve the vouchers of a submitted batch mint
    Resolve {
        transaction_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = core_logic::setup_logger("logs", "voucher-pool")?;

    // Fall back to the crate's config when run from the workspace root
    let config_path = if std::path::Path::new(&args.config).exists() {
        args.config.clone()
    } else if args.config == "config/voucher-pool.toml"
        && std::path::Path::new("chains/flow-voucher/config/voucher-pool.toml").exists()
    {
        "chains/flow-voucher/config/voucher-pool.toml".to_string()
    } else {
        args.config.clone()
    };
    let config = MinterConfig::from_path(&config_path).context("Failed to load config")?;

    let connector = FlowRestConnector::new(Duration::from_secs(args.request_timeout));
    let minter = VoucherMinterPool::with_config(
        connector,
        config.client.clone(),
        config.pool.clone(),
        Arc::new(TracingEventSink),
    )
    .context("Failed to create voucher minter pool")?;

    let range = minter.pool().key_range();
    info!(
        target: "voucher_pool",
        "Pool ready: key indices {}..{} on {}",
        range.start,
        range.end,
        config.client.access_endpoint()
    );

    let outcome = match args.command {
        Command::Probe { concurrency } => probe(&minter, concurrency).await,
        Command::Verify {
            message,
            address,
            key_ids,
            signatures,
        } => minter
            .verify_user_signature(&message, &address, &key_ids, &signatures)
            .await
            .map(|verified| println!("verified: {}", verified))
            .context("Signature verification failed"),
        Command::Resolve { transaction_id } => minter
            .resolve_batch_mint_voucher(&transaction_id)
            .await
            .map(|vouchers| {
                for v in &vouchers {
                    println!(
                        "token {} hash {} recipient {}",
                        v.token_id,
                        v.info_hash,
                        v.recipient.as_deref().unwrap_or("-")
                    );
                }
                println!("{} vouchers", vouchers.len());
            })
            .context("Resolving transaction failed"),
    };

    minter.close().await;
    outcome
}

async fn probe(minter: &VoucherMinterPool<FlowRestConnector>, concurrency: usize) -> Result<()> {
    let started = Instant::now();
    let mut handles = Vec::with_capacity(concurrency);

    for worker in 0..concurrency {
        let pool = minter.pool().clone();
        handles.push(tokio::spawn(async move {
            match pool.borrow().await {
                Ok(lease) => {
                    let key_index = lease.key_index();
                    let waited = lease.waited();
                    lease.release().await;
                    Some((key_index, waited))
                }
                Err(e) => {
                    error!(target: "voucher_pool", "Worker {} could not borrow: {}", worker, e);
                    None
                }
            }
        }));
    }

    let mut succeeded = 0;
    let mut max_wait = Duration::ZERO;
    for handle in handles {
        if let Some((key_index, waited)) = handle.await? {
            println!("key {:>4} borrowed after {:?}", key_index, waited);
            succeeded += 1;
            max_wait = max_wait.max(waited);
        }
    }

    let stats = minter.pool().stats();
    println!(
        "{}/{} borrows succeeded in {:?} (max wait {:?})",
        succeeded,
        concurrency,
        started.elapsed(),
        max_wait
    );
    println!(
        "capacity {} | idle {} | borrowed {} | free slots {} | created {} | destroyed {}",
        stats.capacity, stats.idle, stats.borrowed, stats.free_slots, stats.created, stats.destroyed
    );
    Ok(())
}
