//! Example: Generate JSON-lines feeds for every scenario.
//!
//! Run with: cargo run -p sentinel-testdata --example generate_feed [out_dir]

use sentinel_testdata::{generate_feed, FeedConfig, FeedScenario};
use std::path::PathBuf;

fn main() {
    println!("Sentinel Testdata Generator");
    println!("===========================\n");

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("feeds"));

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("Could not create {}: {}", out_dir.display(), e);
        return;
    }

    let config = FeedConfig::new()
        .with_sample_interval_secs(5)
        .with_duration_minutes(30.0)
        .with_seed(42);

    for scenario in FeedScenario::ALL {
        let feed = generate_feed(scenario, &config);
        let path = out_dir.join(format!("{}.jsonl", scenario));

        match feed.write_jsonl(&path) {
            Ok(()) => println!("  Created {} ({} samples)", path.display(), feed.len()),
            Err(e) => eprintln!("  Warning: Could not save {}: {}", path.display(), e),
        }

        for episode in &feed.expected {
            println!(
                "    expect {} active for samples {}..{}",
                episode.alert, episode.start_sample, episode.end_sample
            );
        }
    }

    println!("\nAll feeds generated successfully!");
}
