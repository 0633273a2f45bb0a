//! Command-line arguments.

use clap::Parser;

/// SteerBus: slider controller and steering wheel display on one bus
#[derive(Parser, Debug)]
#[command(name = "steerbus", version)]
#[command(about = "Slider controller and steering wheel display sharing one steering bus")]
pub struct Args {
    /// Ownership strength of the controller's writer [default: the profile's]
    #[arg(long, env = "STEERBUS_STRENGTH", allow_negative_numbers = true)]
    pub strength: Option<i32>,
}
