//! CLI for lernstufe.
//!
//! Exposes the decision boundary (next, record, reset, stats) against a
//! file-backed state directory, plus a `serve` mode that answers JSON request
//! lines on stdin. It is the operational interface for the difficulty bandit.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lernstufe_api::{wire, DecisionApi};
use lernstufe_core::BanditConfig;
use lernstufe_store::{FileBackend, StateBackend};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Directory holding one state file per student
    #[arg(long, global = true, env = "LERNSTUFE_STATE_DIR", default_value = "data/lernstufe")]
    state_dir: PathBuf,

    /// Difficulty levels, comma separated
    #[arg(long, global = true, env = "LERNSTUFE_ARMS", value_delimiter = ',', default_value = "1,2,3,4,5")]
    arms: Vec<u8>,

    /// Pulls every level needs before the cold-start phase ends
    #[arg(long, global = true, env = "LERNSTUFE_MIN_EXPLORATION", default_value = "3")]
    min_exploration: u32,

    /// Pulls a level needs before its success rate is trusted
    #[arg(long, global = true, env = "LERNSTUFE_MIN_SAMPLES_FOR_EXPLOIT", default_value = "3")]
    min_samples_for_exploit: u32,

    /// Probability of serving the best level instead of exploring
    #[arg(long, global = true, env = "LERNSTUFE_EXPLOIT_PROB", default_value = "0.7")]
    exploit_prob: f64,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, global = true, env = "LERNSTUFE_SEED")]
    seed: Option<u64>,
}

impl GlobalOpts {
    fn bandit_config(&self) -> BanditConfig {
        BanditConfig {
            arms: self.arms.clone(),
            min_exploration: self.min_exploration,
            min_samples_for_exploit: self.min_samples_for_exploit,
            exploit_prob: self.exploit_prob,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the next difficulty for a student
    Next {
        #[arg(long)]
        student: String,
    },
    /// Record the outcome of a served difficulty
    Record {
        #[arg(long)]
        student: String,

        /// Difficulty that was served
        #[arg(long, allow_hyphen_values = true)]
        decision: String,

        /// 1 = correct, 0 = incorrect
        #[arg(long, allow_hyphen_values = true)]
        reward: String,
    },
    /// Forget everything learned about a student
    Reset {
        #[arg(long)]
        student: String,
    },
    /// Print per-level statistics of a student as JSON
    Stats {
        #[arg(long)]
        student: String,
    },
    /// Answer JSON request lines from stdin until EOF
    Serve {
        /// Worker count (default: available parallelism)
        #[arg(long)]
        workers: Option<NonZeroUsize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn shard(line: &str, workers: usize) -> usize {
    match wire::routing_key(line) {
        Some(key) => {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            usize::try_from(hasher.finish() % workers as u64).unwrap_or(0)
        }
        None => 0,
    }
}

fn encode(response: &wire::ResponseEnvelope) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        serde_json::json!({"error": e.to_string(), "kind": "internal"}).to_string()
    })
}

/// Reads request lines, routes each student to a fixed worker so their
/// requests stay in order, and writes responses through a single writer.
async fn serve<B>(api: Arc<DecisionApi<B>>, workers: usize) -> Result<()>
where
    B: StateBackend + 'static,
{
    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (job_tx, mut job_rx) = mpsc::channel::<String>(64);
        let api = Arc::clone(&api);
        let out = out_tx.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            while let Some(line) = job_rx.blocking_recv() {
                let response = wire::handle_line(&api, &line);
                if out.blocking_send(encode(&response)).is_err() {
                    break;
                }
            }
        }));
        senders.push(job_tx);
    }
    drop(out_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut received = 0u64;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        received += 1;
        senders[shard(&line, workers)]
            .send(line)
            .await
            .context("Worker stopped unexpectedly")?;
    }
    drop(senders);

    for handle in handles {
        handle.await.context("Worker panicked")?;
    }
    writer
        .await
        .context("Writer task panicked")?
        .context("Failed to write response")?;
    tracing::info!(requests = received, "serve finished");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let registry = cli
        .opts
        .bandit_config()
        .validate()
        .context("Invalid bandit configuration")?;
    let backend = FileBackend::open(&cli.opts.state_dir)
        .with_context(|| format!("Failed to open state dir {:?}", cli.opts.state_dir))?;
    let api = match cli.opts.seed {
        Some(seed) => DecisionApi::seeded(registry, backend, seed),
        None => DecisionApi::from_entropy(registry, backend),
    };

    match cli.command {
        Commands::Next { student } => {
            let arm = api.next(&student)?;
            println!("{arm}");
        }
        Commands::Record {
            student,
            decision,
            reward,
        } => {
            let stats = api.record(&student, &decision, &reward)?;
            println!(
                "Recorded difficulty {} (reward {}) for {}: {} pulls, {} successes",
                decision.trim(),
                reward.trim(),
                student.trim(),
                stats.pulls,
                stats.successes
            );
        }
        Commands::Reset { student } => {
            api.reset(&student)?;
            println!("Reset state for {}", student.trim());
        }
        Commands::Stats { student } => {
            let summary = api.stats(&student)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Serve { workers } => {
            let workers = workers
                .or_else(|| std::thread::available_parallelism().ok())
                .map_or(4, NonZeroUsize::get);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            runtime.block_on(serve(Arc::new(api), workers))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_is_stable_per_student_and_in_range() {
        let a = r#"{"op":"next","student_id":"s1"}"#;
        let b = r#"{"op":"record","student_id":" s1 ","decision":"2","reward":1}"#;
        for workers in 1..8 {
            assert_eq!(shard(a, workers), shard(b, workers));
            assert!(shard(a, workers) < workers);
        }
        assert_eq!(shard("garbage", 5), 0);
    }

    #[test]
    fn default_options_give_default_config() {
        let cli = Cli::try_parse_from(["lernstufe", "next", "--student", "s1"]).unwrap();
        assert_eq!(cli.opts.bandit_config(), BanditConfig::default());
    }

    #[test]
    fn arms_are_comma_separated() {
        let cli = Cli::try_parse_from(["lernstufe", "--arms", "1,2,3", "stats", "--student", "x"])
            .unwrap();
        assert_eq!(cli.opts.arms, vec![1, 2, 3]);
    }
}
