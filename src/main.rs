use bevy::prelude::*;

use stampede::game::agents::{AgentArena, AgentKind, FocalPoint};
use stampede::game::config::load_sim_config;
use stampede::game::simulation::{build_simulation, AgentSimulation};

use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn setup_file_logging() -> String {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir).expect("Failed to create logs directory");
    }

    // Clean up old log files, keeping only the last 25
    cleanup_old_logs(&log_dir, 25);

    // Generate timestamped filename
    let now = chrono::Local::now();
    let log_filename = format!("stampede_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_file_path = log_dir.join(&log_filename);
    let log_path_str = log_file_path.to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // Don't rotate during a single run
        &log_dir,
        &log_filename,
    );

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wgpu=error,stampede=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("stampede") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Sort by modified time (oldest first)
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        // Delete oldest files if we exceed keep_count
        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

/// Headless stress demo: a large horde scattered over a big world chasing an
/// orbiting focal point. Drives the core directly at a fixed timestep so it
/// runs the same with or without a display.
fn main() {
    let log_file = setup_file_logging();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Stampede - headless horde demo                          ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Log file: {:<45} ║", log_file);
    println!("╚══════════════════════════════════════════════════════════╝");

    let config = load_sim_config("assets/sim_config.ron");
    let dt = (1.0 / config.tick_rate) as f32;

    let mut arena = AgentArena::default();
    let mut rng = rand::rng();
    for i in 0..5000 {
        let pos = Vec2::new(
            rng.random_range(-4000.0..4000.0),
            rng.random_range(-4000.0..4000.0),
        );
        let kind = match i % 10 {
            0 => AgentKind::Large,
            1..=3 => AgentKind::Medium,
            _ => AgentKind::Small,
        };
        arena.spawn(pos, kind);
    }
    info!("spawned {} agents", arena.len());

    let mut sim = build_simulation(&config);
    let mut focal = FocalPoint {
        pos: Vec2::new(100.0, 0.0),
        vel: Vec2::ZERO,
    };

    let ticks = (config.tick_rate * 60.0) as u64; // one simulated minute
    let start = std::time::Instant::now();
    for tick in 0..ticks {
        // Focal point orbits the origin at walking pace.
        let t = tick as f32 * dt;
        let angle = t * 0.2;
        let next = Vec2::new(angle.cos(), angle.sin()) * 100.0;
        focal.vel = (next - focal.pos) / dt;
        focal.pos = next;

        sim.update(&mut arena, &focal, dt);

        if tick % 300 == 0 {
            let nearby = sim.query(focal.pos.x, focal.pos.y, 50.0).len();
            sim.clear_query_cache();
            info!(
                "tick {} | {} active | {} candidates within 50 of the focal point",
                tick,
                arena.active_count(),
                nearby
            );
        }
    }
    let elapsed = start.elapsed();
    info!(
        "{} ticks of {} agents in {:.2?} ({:.2} ms/tick)",
        ticks,
        arena.len(),
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / ticks as f64
    );
}
