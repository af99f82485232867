use std::env;
use std::process;
use std::sync::Arc;

use chrono::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use payout_eng::clock::{Clock, FixedClock, SystemClock};
use payout_eng::csv::{read_transactions, write_planned, write_winners};
use payout_eng::day;
use payout_eng::engine::{PrizeDraw, ReleaseRequest, SeededDraw, UniformDraw};
use payout_eng::store::MemoryStore;
use payout_eng::{Amount, BudgetMonitor, Config, Engine};

fn usage() -> ! {
    eprintln!("usage: payout-eng <transactions.csv> <command>");
    eprintln!("  preview <budget> <min> <max>");
    eprintln!("  commit <budget> <min> <max> [actor]");
    eprintln!("  status");
    process::exit(2);
}

fn amount_arg(args: &[String], index: usize) -> Amount {
    let raw = args.get(index).unwrap_or_else(|| usage());
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Amount::from_float(value),
        _ => {
            eprintln!("not a valid amount: '{raw}'");
            process::exit(2);
        }
    }
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("{err}");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let (path, command) = match (args.get(1), args.get(2)) {
        (Some(path), Some(command)) => (path.clone(), command.clone()),
        _ => usage(),
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let config = Config::from_env();

    // CONSOLE_DATE replays the ledger as of a past civil day; otherwise the
    // console operates on the real "today".
    let clock: Arc<dyn Clock> = match env::var("CONSOLE_DATE").ok() {
        Some(raw) => {
            let date = day::parse_civil_date(&raw).unwrap_or_else(|e| fail(e));
            let tz = day::zone(&config.zone).unwrap_or_else(|e| fail(e));
            Arc::new(FixedClock(day::day_window(date, tz).start + Duration::hours(12)))
        }
        None => Arc::new(SystemClock),
    };

    let draw: Arc<dyn PrizeDraw> = match env::var("CONSOLE_SEED").ok().and_then(|s| s.parse().ok())
    {
        Some(seed) => Arc::new(SeededDraw::new(seed)),
        None => Arc::new(UniformDraw),
    };

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        Arc::clone(&store) as Arc<dyn payout_eng::store::Store>,
        Arc::clone(&clock),
        draw,
        &config,
    )
    .unwrap_or_else(|e| fail(e));

    // Feed the ledger file through a channel, like a live callback stream.
    let (tx_sender, tx_receiver) = tokio::sync::mpsc::channel(16);
    let feed_path = path.clone();
    tokio::spawn(async move {
        for result in read_transactions(&feed_path) {
            match result {
                Ok(tx) => {
                    tx_sender.send(tx).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });
    engine.ingest(ReceiverStream::new(tx_receiver)).await;

    match command.as_str() {
        "preview" => {
            let request = ReleaseRequest::new(
                amount_arg(&args, 3),
                amount_arg(&args, 4),
                amount_arg(&args, 5),
            );
            match engine.preview_release(&request).await {
                Ok(plan) => write_planned(&plan.winners),
                Err(e) => fail(e),
            }
        }
        "commit" => {
            let mut request = ReleaseRequest::new(
                amount_arg(&args, 3),
                amount_arg(&args, 4),
                amount_arg(&args, 5),
            );
            if let Some(actor) = args.get(6) {
                request.actor = actor.clone();
            }
            match engine.release_winners(&request).await {
                Ok(outcome) => write_winners(&outcome.winners),
                Err(e) => fail(e),
            }
        }
        "status" => {
            let monitor = BudgetMonitor::new(store, clock, config).unwrap_or_else(|e| fail(e));
            match monitor.status().await {
                Ok(status) => {
                    println!("enabled={}", status.enabled);
                    println!("collected={}", status.today.collected);
                    println!("paid_count={}", status.today.paid_count);
                    println!("ceiling={}", status.today.ceiling);
                    println!("paid_out={}", status.today.paid_out);
                    println!("remaining={}", status.today.remaining);
                    println!("usage_percentage={}", status.today.usage_percentage);
                    println!("anomaly={}", status.anomaly.level());
                    println!("message={}", status.anomaly.message());
                }
                Err(e) => fail(e),
            }
        }
        _ => usage(),
    }
}
