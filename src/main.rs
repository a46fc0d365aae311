use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use lane_control::control::ControlLoop;
use lane_control::engine::SimEngine;
use lane_control::scenario;

#[derive(Parser)]
#[command(name = "lane_control")]
#[command(about = "Priority-lane access control over a traffic simulation")]
struct Cli {
    /// Show the terminal map view while running
    #[arg(long)]
    gui: bool,

    /// Run the simulation without the priority-lane policy (baseline)
    #[arg(long)]
    no_control: bool,

    /// RNG seed for scenario generation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of vehicle trips to schedule
    #[arg(long, default_value = "40")]
    vehicles: usize,

    /// Safety cap on simulation ticks
    #[arg(long, default_value = "5000")]
    max_ticks: u64,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let engine = match scenario::build_demo_engine(cli.seed, cli.vehicles) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("Setup failed: {:#}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&cli, engine) {
        eprintln!("Simulation failed mid-run: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, engine: SimEngine) -> Result<()> {
    let control_loop = if cli.no_control {
        println!("Running baseline simulation (lane control disabled)...");
        ControlLoop::new_baseline(engine)
    } else {
        println!("Running simulation with priority-lane control...");
        ControlLoop::new(engine)
    };
    let mut control_loop = control_loop.with_tick_limit(cli.max_ticks);

    control_loop
        .initialize()
        .context("Failed to initialize the control loop")?;

    if cli.gui {
        control_loop.engine().draw_map();
        while control_loop.step()? {
            if control_loop.tick() % 10 == 0 {
                control_loop.engine().draw_map();
                thread::sleep(Duration::from_millis(200));
            }
        }
        control_loop.engine().draw_map();
    } else {
        control_loop.run()?;
    }

    let engine = control_loop.engine();
    println!(
        "Completed {}/{} vehicles in {} ticks",
        engine.completed(),
        engine.spawned(),
        control_loop.tick()
    );
    Ok(())
}
