//! Plan many transfers at once on the rayon pool.
//!
//! Run with: cargo run --release --example batch_directions --features parallel

use serde_json::json;
use std::time::Instant;
use transfer_guide::{generate_directions_batch, FeatureCollection, GuidanceConfig};

/// A zig-zag corridor with a lift half way along.
fn synthetic_transfer(seed: usize) -> FeatureCollection {
    let origin_lng = 8.5 + (seed % 100) as f64 * 0.01;
    let origin_lat = 47.0 + (seed / 100) as f64 * 0.01;

    let corridor: Vec<[f64; 2]> = (0..40)
        .map(|i| {
            let lng = origin_lng + i as f64 * 0.00005;
            let lat = origin_lat + if (i / 5) % 2 == 0 { 0.0 } else { 0.0002 };
            [lng, lat]
        })
        .collect();
    let lift = corridor[20];
    let first = corridor[0];
    let last = corridor[corridor.len() - 1];

    FeatureCollection::from_value(json!({
        "features": [
            {"geometry": {"type": "Point", "coordinates": first},
             "properties": {"endpointType": "from", "floor": 0, "label": format!("Track {}", seed % 30 + 1)}},
            {"geometry": {"type": "LineString", "coordinates": &corridor[..21]}, "properties": {"floor": 0}},
            {"geometry": {"type": "Point", "coordinates": lift},
             "properties": {"travelType": "LIFT", "direction": "up", "sourceFloor": 0, "destinationFloor": 1}},
            {"geometry": {"type": "LineString", "coordinates": &corridor[20..]}, "properties": {"floor": 1}},
            {"geometry": {"type": "Point", "coordinates": last},
             "properties": {"endpointType": "to", "label": "Platform exit"}}
        ]
    }))
    .unwrap_or_default()
}

fn main() {
    env_logger::init();

    let collections: Vec<FeatureCollection> = (0..2_000).map(synthetic_transfer).collect();
    let config = GuidanceConfig::default();

    let start = Instant::now();
    let results = generate_directions_batch(&collections, &config);
    let elapsed = start.elapsed();

    let planned: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let instructions: usize = planned.iter().map(|d| d.instructions.len()).sum();
    let meters: f64 = planned.iter().map(|d| d.total_distance).sum();

    println!("Batch Directions\n");
    println!("Transfers planned: {}/{}", planned.len(), collections.len());
    println!("Instructions:      {}", instructions);
    println!("Total walking:     {:.1} km", meters / 1000.0);
    println!("Elapsed:           {:.1} ms", elapsed.as_secs_f64() * 1000.0);

    if let Some(first) = planned.first() {
        println!("\nFirst transfer:");
        for line in first.lines() {
            println!("  {}", line);
        }
    }
}
