//! `steerbus` – terminal front end for the steering bus.
//!
//! Runs the controller and the display side by side in one process:
//!
//! 1. Loads the bus profile (`~/.steerbus/profile.toml` or the built-in
//!    default) and opens the in-process [`Domain`].
//! 2. Attaches the `SteeringDisplay` reader and spawns its poll loop, which
//!    prints the wheel rotation for every accepted sample.
//! 3. Attaches the `SteeringController` writer, publishes the initial `0` and
//!    drops into a REPL where numbers move the slider.
//! 4. Ctrl-C or `/quit` stops the REPL and the poll loop.

mod args;
mod repl;

use args::Args;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use steerbus_middleware::Domain;
use steerbus_middleware::profile::{
    self, CONTROLLER_PARTICIPANT, CONTROLLER_WRITER, DISPLAY_PARTICIPANT, DISPLAY_READER,
};
use steerbus_runtime::{PollLoop, SteeringController, SteeringDisplay, init_tracing};
use steerbus_types::BusError;

fn main() -> ExitCode {
    // Bad arguments exit with code 2 and usage text before anything starts.
    let args = Args::parse();
    let _telemetry = init_tracing("steerbus");

    print_banner();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bus initialisation failed");
            eprintln!("{}: {}", "Bus initialisation failed".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<(), BusError> {
    let profile = profile::load()?;
    let period = profile.poll_period();
    let domain = Domain::new(profile)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| BusError::Config(format!("tokio runtime: {e}")))?;
    let _enter = runtime.enter();

    // Reader first so the controller's initial sample is not lost.
    let display = domain.create_participant(DISPLAY_PARTICIPANT)?;
    let reader = display.find_reader(DISPLAY_READER)?;
    let sink = SteeringDisplay::new(|rotation: f32| {
        println!("  {} rotation {:>7.1}°", "wheel".bold().magenta(), rotation);
    });
    let poll = PollLoop::new(reader, sink).spawn(period);

    let controller_participant = domain.create_participant(CONTROLLER_PARTICIPANT)?;
    let writer = Arc::new(controller_participant.find_writer(CONTROLLER_WRITER)?);
    // `--strength`, then STEERBUS_STRENGTH, then the profile.
    if let Some(strength) = args.strength {
        writer.set_strength(strength);
    }

    let mut controller = SteeringController::new(writer);
    println!("  {}", controller.title().bold());
    controller.start()?;
    println!(
        "  Type a number to move the slider, {} for commands.\n",
        "/help".bold().cyan()
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – press Enter to finish shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    repl::run(&mut controller, shutdown);

    match runtime.block_on(poll.shutdown()) {
        Ok(stopped) => info!(ticks = stopped.ticks(), frames = stopped.sink().frames(), "display stopped"),
        Err(e) => warn!(error = %e, "poll loop ended abnormally"),
    }
    Ok(())
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "SteerBus".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Steering command bus: slider controller and wheel display");
    println!();
}
