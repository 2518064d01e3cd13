//! Plan directions for a transfer built in-process, no network needed.
//!
//! Run with: RUST_LOG=debug cargo run --example offline_directions

use serde_json::json;
use transfer_guide::{plan_directions, FeatureCollection, GuidanceConfig, Instruction};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Track 31 on the lower concourse to track 18 one floor up (Zurich HB area)
    let collection = FeatureCollection::from_value(json!({
        "type": "FeatureCollection",
        "features": [
            {"geometry": {"type": "Point", "coordinates": [8.53990, 47.37780]},
             "properties": {"endpointType": "from", "floor": -1, "label": "Track 31"}},
            {"geometry": {"type": "LineString", "coordinates": [
                [8.53990, 47.37780], [8.54010, 47.37781], [8.54030, 47.37780], [8.54030, 47.37800]
             ]},
             "properties": {"floor": -1}},
            {"geometry": {"type": "Point", "coordinates": [8.54030, 47.37800]},
             "properties": {"travelType": "ESCALATOR", "direction": "up", "sourceFloor": -1, "destinationFloor": 0}},
            {"geometry": {"type": "LineString", "coordinates": [
                [8.54030, 47.37800], [8.54060, 47.37810], [8.54060, 47.37840]
             ]},
             "properties": {"floor": 0}},
            {"geometry": {"type": "Point", "coordinates": [8.54060, 47.37840]},
             "properties": {"endpointType": "to", "floor": 0, "label": "Track 18"}}
        ]
    }))?;

    let config = GuidanceConfig::default();
    let directions = plan_directions(&collection.features, &config)?;

    println!("Transfer directions\n");
    for (i, line) in directions.lines().iter().enumerate() {
        println!("{:2}. {}", i + 1, line);
    }

    let turns = directions
        .instructions
        .iter()
        .filter(|i| matches!(i, Instruction::Turn { .. }))
        .count();
    println!(
        "\n{} path points after simplification, {} turns, arriving on floor {}",
        directions.path.len(),
        turns,
        directions.final_floor
    );

    println!("\nAs JSON:\n{}", serde_json::to_string_pretty(&directions.instructions)?);
    Ok(())
}
