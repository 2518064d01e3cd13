//! Fetch a transfer from the journey-maps API and print walking directions.
//!
//! Run with:
//!   cargo run --example transfer_directions --features http -- API_KEY STATION FROM_TRACK TO_TRACK
//!
//! STATION may be an operating-point number (e.g. 8503000) or, when a
//! stations.json file is present in the working directory, part of a name.

use std::fs::File;
use std::process::ExitCode;
use transfer_guide::{GuidanceConfig, StationIndex, TransferClient, TransferRequest};

fn resolve_station(query: &str) -> Option<String> {
    if query.chars().all(|c| c.is_ascii_digit()) {
        return Some(query.to_string());
    }

    let index = StationIndex::from_reader(File::open("stations.json").ok()?).ok()?;
    let matches = index.search(query);
    for station in matches.iter().skip(1).take(5) {
        log::info!("Also matching: {} ({})", station.name, station.id);
    }
    matches.first().map(|station| {
        println!("Using {} ({})", station.name, station.id);
        station.id.clone()
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [api_key, station, from_track, to_track] = args.as_slice() else {
        eprintln!("usage: transfer_directions API_KEY STATION FROM_TRACK TO_TRACK");
        return ExitCode::FAILURE;
    };

    let Some(station_id) = resolve_station(station) else {
        eprintln!("Unknown station: {}", station);
        return ExitCode::FAILURE;
    };

    let client = match TransferClient::new(api_key) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = TransferRequest::within_station(&station_id, from_track, to_track);
    match client.directions(&request, &GuidanceConfig::default()).await {
        Ok(directions) => {
            for line in directions.lines() {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("An error occurred: {}", e);
            ExitCode::FAILURE
        }
    }
}
