#![deny(unsafe_code)]
//! Headless driver for the distort-fluid solver.
//!
//! Subcommands:
//! - `run`: drive the CPU backend with a scripted pointer sweep, write the
//!   dye field as a PNG
//! - `config`: print the default parameters and their schema

mod error;
mod snapshot;

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use distort_fluid_core::{
    Channels, FrameStatus, HeadlessDevice, Simulation, SimulationConfig, Viewport,
};
use error::CliError;

#[derive(Parser)]
#[command(name = "distort-fluid", about = "Stable-fluids distortion field solver")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the solver for N frames under a Lissajous pointer sweep.
    Run {
        /// Number of display ticks.
        #[arg(short, long, default_value_t = 120)]
        frames: u32,

        /// Viewport width in pixels. At or below 768 the solver stays idle.
        #[arg(short = 'W', long, default_value_t = 1280.0)]
        width: f32,

        /// Viewport height in pixels.
        #[arg(short = 'H', long, default_value_t = 720.0)]
        height: f32,

        /// Solver parameters as a JSON object (see `config`).
        #[arg(long, default_value = "{}")]
        params: String,

        /// Toggle dye retention to its boosted value before the first frame.
        #[arg(long)]
        boost: bool,

        /// Simulate a device rendering at most this many channels (4, 2 or 1).
        #[arg(long, default_value_t = 4)]
        max_channels: usize,

        /// Simulate a device without linear float filtering.
        #[arg(long)]
        no_linear_filtering: bool,

        /// Output PNG path.
        #[arg(short, long, default_value = "dye.png")]
        output: PathBuf,
    },
    /// Print default parameters and their schema.
    Config,
}

/// Pointer position in viewport pixels at `frame` of the sweep.
fn sweep(frame: u32, frames: u32, width: f32, height: f32) -> (f32, f32) {
    let t = frame as f32 / frames.max(1) as f32 * TAU;
    (
        width * (0.5 + 0.35 * (3.0 * t).sin()),
        height * (0.5 + 0.35 * (2.0 * t).sin()),
    )
}

#[allow(clippy::too_many_arguments)]
fn run_sweep(
    json: bool,
    frames: u32,
    width: f32,
    height: f32,
    params: &str,
    boost: bool,
    max_channels: usize,
    no_linear_filtering: bool,
    output: PathBuf,
) -> Result<(), CliError> {
    let params: serde_json::Value = serde_json::from_str(params)
        .map_err(|e| CliError::Input(format!("invalid --params JSON: {e}")))?;
    let config = SimulationConfig::from_json(&params);

    let mut device = HeadlessDevice::with_max_channels(Channels::from_count(max_channels)?);
    if no_linear_filtering {
        device = device.without_linear_filtering();
    }

    let mut sim = Simulation::headless(config, &device, Viewport::new(width, height)?)?;
    if boost {
        sim.toggle_density_dissipation();
    }

    let mut impulses = 0;
    for frame in 0..frames {
        let (x, y) = sweep(frame, frames, width, height);
        sim.record_pointer(x, y);
        if let FrameStatus::Active { impulses: n } = sim.tick()? {
            impulses += n;
        }
    }

    snapshot::write_png(sim.dye(), &output)?;
    log::info!("wrote dye field to {}", output.display());

    let peak = sim.dye().peak(3);
    if json {
        let info = serde_json::json!({
            "frames": frames,
            "active_frames": sim.frame(),
            "impulses": impulses,
            "config": sim.config().to_json(),
            "formats": sim.formats(),
            "dye_peak": peak,
            "output": output.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let formats = sim.formats();
        eprintln!(
            "ran {} of {frames} frames ({impulses} impulses, dye {:?}/{:?}, {:?} filtering, peak {peak:.3}) -> {}",
            sim.frame(),
            formats.dye.channels,
            formats.dye.precision,
            formats.filter_mode,
            output.display()
        );
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Config => {
            let config = SimulationConfig::default();
            if cli.json {
                let info = serde_json::json!({
                    "defaults": config.to_json(),
                    "schema": SimulationConfig::param_schema(),
                });
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&config.to_json())?);
            }
            Ok(())
        }
        Command::Run {
            frames,
            width,
            height,
            params,
            boost,
            max_channels,
            no_linear_filtering,
            output,
        } => run_sweep(
            cli.json,
            frames,
            width,
            height,
            &params,
            boost,
            max_channels,
            no_linear_filtering,
            output,
        ),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sweep_stays_inside_viewport() {
        for frame in 0..200 {
            let (x, y) = sweep(frame, 200, 1280.0, 720.0);
            assert!((0.0..=1280.0).contains(&x) && (0.0..=720.0).contains(&y));
        }
    }

    #[test]
    fn sweep_moves_every_frame() {
        let a = sweep(0, 60, 1000.0, 1000.0);
        let b = sweep(1, 60, 1000.0, 1000.0);
        assert_ne!(a, b);
    }

    #[test]
    fn run_parses_limited_device_flags() {
        let cli = Cli::parse_from([
            "distort-fluid",
            "--json",
            "run",
            "--frames",
            "3",
            "--max-channels",
            "1",
            "--no-linear-filtering",
        ]);
        assert!(cli.json);
        match cli.command {
            Command::Run {
                frames,
                max_channels,
                no_linear_filtering,
                ..
            } => {
                assert_eq!(frames, 3);
                assert_eq!(max_channels, 1);
                assert!(no_linear_filtering);
            }
            Command::Config => panic!("expected run"),
        }
    }

    #[test]
    fn run_sweep_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dye.png");
        let params = r#"{"sim_resolution": 16, "dye_resolution": 32}"#;
        run_sweep(true, 4, 1024.0, 768.0, params, true, 2, true, output.clone()).unwrap();
        let img = image::open(&output).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (32, 32));
    }

    #[test]
    fn run_sweep_rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dye.png");
        let bad_json = run_sweep(false, 1, 1024.0, 768.0, "{", false, 4, false, output.clone());
        assert_eq!(bad_json.unwrap_err().exit_code(), 12);
        let bad_channels = run_sweep(false, 1, 1024.0, 768.0, "{}", false, 3, false, output.clone());
        assert_eq!(bad_channels.unwrap_err().exit_code(), 12);
        let bad_size = run_sweep(false, 1, 0.0, 768.0, "{}", false, 4, false, output);
        assert_eq!(bad_size.unwrap_err().exit_code(), 10);
    }
}
