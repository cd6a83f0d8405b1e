//! Probe: badges REST endpoint
//!
//! Hits GET https://badges.roblox.com/v1/badges/<id> and documents:
//! - Response shape and fields
//! - Whether the body normalizes into a snapshot
//! - Latency and count drift over repeated requests

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use url::Url;

use badge_watch::BADGES_API_BASE;
use badge_watch::api::{badge_url, parse_badge};

#[derive(Parser)]
#[command(name = "probe_badge", about = "Inspect the badges API response for one badge")]
struct Args {
    /// Badge ID to fetch
    badge_id: u64,

    /// Number of repeated requests for the latency check
    #[arg(long, default_value_t = 5)]
    repeat: u32,

    /// Delay between repeated requests in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();
    let url = badge_url(&Url::parse(BADGES_API_BASE)?, args.badge_id)?;

    println!("=== Probe: Badge {} ===", args.badge_id);
    println!("URL: {url}");
    println!();

    // 1. Single fetch, raw body
    println!("--- 1. Raw response ---");
    let start = Instant::now();
    let resp = client.get(url.clone()).send().await?;
    let latency = start.elapsed();
    let status = resp.status();
    let body = resp.text().await?;
    println!("Status: {status}");
    println!("Latency: {latency:?}");

    match serde_json::from_str::<Value>(&body) {
        Ok(json) => {
            println!("{}", serde_json::to_string_pretty(&json)?);
            if let Some(obj) = json.as_object() {
                println!("\nFields present:");
                for key in obj.keys() {
                    println!("  - {key}");
                }
            }
        }
        Err(_) => println!("Body is not JSON:\n{body}"),
    }
    println!();

    // 2. Normalization
    println!("--- 2. Normalized snapshot ---");
    match parse_badge(&body) {
        Ok(snap) => {
            println!("  name:          {}", snap.name);
            println!("  awardedCount:  {}", snap.current_count);
            println!("  pastDay:       {}", snap.past_day_count);
            println!("  winRate:       {}", snap.win_rate_percentage);
            println!("  game:          {}", snap.awarding_universe.name);
            println!("  link:          {}", snap.awarding_universe.game_link());
        }
        Err(e) => println!("  Failed to normalize: {e:#}"),
    }
    println!();

    // 3. Repeated requests
    println!("--- 3. {} repeated requests ---", args.repeat);
    let mut counts = Vec::new();
    for i in 0..args.repeat {
        let start = Instant::now();
        let resp = client.get(url.clone()).send().await?;
        let latency = start.elapsed();
        let status = resp.status();
        let count = parse_badge(&resp.text().await?).ok().map(|s| s.current_count);
        println!("  #{}: status={status} latency={latency:?} awardedCount={count:?}", i + 1);
        if let Some(c) = count {
            counts.push(c);
        }
        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }
    if let (Some(first), Some(last)) = (counts.first(), counts.last()) {
        println!("  Drift over run: {}", *last as i64 - *first as i64);
    }

    Ok(())
}
