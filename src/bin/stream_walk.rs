//! Walk an observer through a catalog world without a renderer.
//!
//! Usage: cargo run --release --bin stream_walk -- --catalog <FILE> --sector <NAME> [OPTIONS]
//!
//! Options:
//!   --catalog <FILE>       Catalog XML to ingest (required)
//!   --sector <NAME>        Starting sector (required)
//!   --config <FILE>        Streaming config JSON (default: built-in defaults)
//!   --data-dir <DIR>       Directory asset files resolve against (default: catalog directory)
//!   --waypoints <LIST>     "x,y,z[@sector];..." path to walk (default: "0,0,0")
//!   --steps <N>            Interpolated positions between waypoints (default: 10)
//!   --ticks <N>            Extra updates at each position to let loads finish (default: 3)
//!   --debug-port <PORT>    Serve the debug protocol and keep running after the walk
//!
//! Output: one stats line per waypoint, and a final summary as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tokio::sync::Mutex;

use sectorstream::core::{logging, Error, Result};
use sectorstream::engine::HeadlessEngine;
use sectorstream::streaming::StreamingConfig;
use sectorstream::WorldLoader;
use sectorstream_debug::{DebugHandler, DebugServer};

struct Waypoint {
    position: Vec3,
    sector: Option<String>,
}

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let catalog = parse_str_arg(&args, "--catalog")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("--catalog is required".into()))?;
    let start_sector =
        parse_str_arg(&args, "--sector").ok_or_else(|| Error::Config("--sector is required".into()))?;
    let config = match parse_str_arg(&args, "--config") {
        Some(path) => StreamingConfig::load(Path::new(&path))?,
        None => StreamingConfig::default(),
    };
    let data_dir = parse_str_arg(&args, "--data-dir")
        .map(PathBuf::from)
        .or_else(|| catalog.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let waypoints = parse_waypoints(&parse_str_arg(&args, "--waypoints").unwrap_or_else(|| "0,0,0".into()))?;
    let steps = parse_usize_arg(&args, "--steps").unwrap_or(10).max(1);
    let ticks = parse_usize_arg(&args, "--ticks").unwrap_or(3);
    let debug_port = parse_u16_arg(&args, "--debug-port");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("stream-walk")
        .enable_all()
        .build()?;

    let engine = HeadlessEngine::with_handle(&data_dir, runtime.handle().clone());
    let mut loader = WorldLoader::init(config, engine)?;
    let summary = loader.load_catalog(&catalog)?;
    log::info!("Catalog ready: {} sectors, {} meshes", summary.sectors, summary.meshes);

    let loader = Arc::new(Mutex::new(loader));
    let _server = debug_port.map(|port| {
        let _guard = runtime.enter();
        let handler: Arc<Mutex<dyn DebugHandler>> = loader.clone();
        DebugServer::start(handler, port)
    });

    let mut sector = start_sector;
    let mut from = waypoints.first().map(|w| w.position).unwrap_or(Vec3::ZERO);
    for (index, waypoint) in waypoints.iter().enumerate() {
        if let Some(next) = &waypoint.sector {
            sector = next.clone();
        }
        for step in 1..=steps {
            let position = from.lerp(waypoint.position, step as f32 / steps as f32);
            let mut walker = loader.blocking_lock();
            walker.update_position(position, &sector, false)?;
            for _ in 0..ticks {
                // Let in-flight reads land before re-pumping
                if walker.engine().in_flight() > 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
                walker.update_position(position, &sector, true)?;
            }
        }
        from = waypoint.position;
        log::info!("Waypoint {} ({}): {}", index, waypoint.position, loader.blocking_lock().stats());
    }

    {
        let walker = loader.blocking_lock();
        let report = serde_json::json!({
            "streaming": walker.stats(),
            "engine": walker.engine().stats(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let Some(port) = debug_port {
        log::info!("Walk finished; debug server still answering on port {}", port);
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }
    Ok(())
}

/// Parse "x,y,z[@sector];..." into waypoints.
fn parse_waypoints(list: &str) -> Result<Vec<Waypoint>> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (coords, sector) = match entry.split_once('@') {
                Some((coords, sector)) => (coords, Some(sector.trim().to_string())),
                None => (entry, None),
            };
            let values = coords
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Config(format!("bad waypoint '{}': {}", entry, e)))?;
            match values.as_slice() {
                [x, y, z] => Ok(Waypoint {
                    position: Vec3::new(*x, *y, *z),
                    sector,
                }),
                _ => Err(Error::Config(format!("waypoint '{}' needs three coordinates", entry))),
            }
        })
        .collect()
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u16_arg(args: &[String], flag: &str) -> Option<u16> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
