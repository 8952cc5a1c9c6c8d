//! Feed publisher entry point.
//!
//! Multicasts timestamped order book updates at a fixed rate so a receiver
//! can measure one-way latency.

use clap::Parser;
use feed::{feed_groups, FeedConfig, FeedPublisher};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Symbols suggested for a multi-feed run
const MULTI_FEED_SYMBOLS: [&str; 4] = ["AAPL", "MSFT", "GOOG", "AMZN"];

/// UDP multicast order book feed
#[derive(Parser, Debug)]
#[command(name = "feed")]
#[command(about = "Multicast order book feed for latency benchmarking")]
struct Args {
    /// Multicast group address
    #[arg(short, long, default_value = "239.1.1.1")]
    group: Ipv4Addr,

    /// UDP port
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Symbol (up to 4 ASCII characters)
    #[arg(short, long, default_value = "AAPL")]
    symbol: String,

    /// Messages per second (0 = as fast as possible)
    #[arg(short, long, default_value_t = 10_000)]
    rate: u64,

    /// Duration in seconds
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// Multicast TTL (time-to-live)
    #[arg(long, default_value_t = 2)]
    ttl: u32,

    /// Outgoing interface address
    #[arg(short, long, default_value = "0.0.0.0")]
    interface: Ipv4Addr,

    /// Do not loop messages back to receivers on this host
    #[arg(long)]
    no_loopback: bool,

    /// Print commands for running one feed per symbol and exit
    #[arg(short, long)]
    multiple: bool,
}

fn print_multi_feed_commands(args: &Args) {
    println!("For multiple feeds, run one publisher per group:");
    let groups = feed_groups(args.group, MULTI_FEED_SYMBOLS.len());
    for (group, symbol) in groups.iter().zip(MULTI_FEED_SYMBOLS) {
        println!(
            "  feed -g {} -p {} -s {} -r {} -d {}",
            group, args.port, symbol, args.rate, args.duration
        );
    }
}

fn main() {
    let args = Args::parse();

    if args.multiple {
        print_multi_feed_commands(&args);
        return;
    }

    let config = FeedConfig::new(args.group, args.port)
        .with_interface(args.interface)
        .with_ttl(args.ttl)
        .with_symbol(args.symbol.as_str())
        .with_rate(args.rate)
        .with_duration(Duration::from_secs(args.duration))
        .with_loopback(!args.no_loopback);

    let mut publisher = match FeedPublisher::new(config) {
        Ok(publisher) => publisher,
        Err(e) => {
            eprintln!("Failed to create feed publisher: {}", e);
            std::process::exit(1);
        }
    };

    println!("Starting feed: {}", args.symbol);
    println!("  Multicast: {}:{}", args.group, args.port);
    println!("  Rate: {} msg/sec, Duration: {} sec", args.rate, args.duration);
    println!("  TTL: {}", args.ttl);
    println!("Press Ctrl-C to stop\n");

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        println!("\nStopping feed...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Failed to set Ctrl-C handler");

    let result = publisher.run(&running, |stats, elapsed| {
        println!(
            "Sent {} messages in {:.1}s ({:.0} msg/sec)",
            stats.messages_sent,
            elapsed.as_secs_f64(),
            stats.rate(elapsed)
        );
    });

    let stats = publisher.stats();
    match result {
        Ok(elapsed) => {
            println!(
                "\nFinal stats: {} messages, {} bytes in {:.1}s (avg: {:.0} msg/sec)",
                stats.messages_sent,
                stats.bytes_sent,
                elapsed.as_secs_f64(),
                stats.rate(elapsed)
            );
        }
        Err(e) => {
            eprintln!("Send failed after {} messages: {}", stats.messages_sent, e);
            std::process::exit(1);
        }
    }
}
