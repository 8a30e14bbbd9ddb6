mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cubeworld_common::{Config, Extent2D};
use cubeworld_kernel::SchedulerConfig;
use cubeworld_render::{CameraSettings, RendererOptions, Scene, VoxelWorld};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cubeworld-cli", about = "Headless tooling for the cube world")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (`key value` lines)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Load or generate a voxel world and print mesh statistics
    Mesh {
        /// World file of raw cell bytes (overrides World.File)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Grid size along x, y and z (overrides World.SizeX/Y/Z)
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
        size: Option<Vec<usize>>,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the frame loop against the headless renderer
    Simulate {
        /// Number of frames to render
        #[arg(short, long, default_value = "600")]
        frames: u64,
        /// Seconds between frames
        #[arg(short, long, default_value_t = 1.0 / 60.0)]
        delta: f64,
        /// Frame indices at which the device is removed (repeatable)
        #[arg(long = "lose-device-at")]
        lose_device_at: Vec<u64>,
        /// Print the draw list of the last frame
        #[arg(long)]
        dump_draw_list: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("reading {}", path.display())),
        None => Ok(Config::new()),
    }
}

fn load_world(config: &Config) -> Result<VoxelWorld> {
    VoxelWorld::from_config(config).context("loading voxel world")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("cubeworld-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", cubeworld_common::crate_info());
            println!("voxel: {}", cubeworld_voxel::crate_info());
            println!("kernel: {}", cubeworld_kernel::crate_info());
            println!("render: {}", cubeworld_render::crate_info());
            println!("config keys: {}", config.len());
        }
        Commands::Mesh { file, size, json } => {
            if let Some(file) = file {
                config.set("World.File", file.display());
            }
            if let Some([x, y, z]) = size.as_deref() {
                config.set("World.SizeX", x);
                config.set("World.SizeY", y);
                config.set("World.SizeZ", z);
            }
            let world = load_world(&config)?;
            let stats = world.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let dims = world.grid().dims();
                println!("grid: {} x {} x {}", dims.x, dims.y, dims.z);
                println!("occupied cells: {} / {}", stats.occupied, stats.cells);
                println!("exposed faces: {}", stats.exposed_faces);
                println!("vertices: {} ({} triangles)", stats.vertices, stats.triangles);
                println!("vertex data: {} bytes", stats.bytes);
            }
        }
        Commands::Simulate {
            frames,
            delta,
            lose_device_at,
            dump_draw_list,
            json,
        } => {
            let width = config.get_int_or_default("MainWindow.Width", 800)?;
            let height = config.get_int_or_default("MainWindow.Height", 600)?;
            let params = simulate::SimulationParams {
                frames,
                delta,
                lose_device_at: lose_device_at.into_iter().collect(),
                size: Extent2D::new(
                    u32::try_from(width).context("MainWindow.Width out of range")?,
                    u32::try_from(height).context("MainWindow.Height out of range")?,
                ),
            };
            let mut scene = Scene::new(CameraSettings::from_config(&config)?);
            scene.init(Some(load_world(&config)?));
            scene.on_screen_size_change(params.size.width, params.size.height);

            let summary = simulate::run(
                params,
                RendererOptions::from_config(&config)?,
                SchedulerConfig::from_config(&config)?,
                scene,
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "frames: {} rendered, {} presented, {} skipped",
                    summary.frames_rendered, summary.frames_presented, summary.frames_skipped
                );
                println!(
                    "fixed ticks: {} ({} clamped frames)",
                    summary.scene_ticks, summary.scheduler.clamped_frames
                );
                println!("scene time: {:.3}s", summary.scene_time);
                println!(
                    "device: generation {}, {} recoveries",
                    summary.device_generation, summary.recoveries
                );
                println!("backend calls: {}", summary.backend_calls);
            }
            if dump_draw_list {
                print!("{}", summary.last_frame);
            }
            if summary.exit_code != 0 {
                std::process::exit(summary.exit_code);
            }
        }
    }

    Ok(())
}
