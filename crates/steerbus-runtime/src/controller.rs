//! [`SteeringController`] – the producer side of the steering bus.
//!
//! Models the slider of a controller UI. Every movement publishes the slider
//! value, truncated to a whole degree, as the steering position with zero
//! speed.

use std::sync::Arc;

use steerbus_middleware::DataWriter;
use steerbus_types::BusError;
use tracing::debug;

/// Slider range in degrees.
pub const SLIDER_MIN: i32 = -180;
pub const SLIDER_MAX: i32 = 180;

pub struct SteeringController {
    writer: Arc<DataWriter>,
    value: i32,
}

impl SteeringController {
    pub fn new(writer: Arc<DataWriter>) -> Self {
        Self { writer, value: 0 }
    }

    /// Publish the slider's initial position.
    pub fn start(&mut self) -> Result<usize, BusError> {
        self.on_slider(0.0)
    }

    /// Slider moved to `raw`.
    ///
    /// The value is truncated toward zero and held within the slider range,
    /// as a slider widget would. Returns how many readers received it.
    pub fn on_slider(&mut self, raw: f64) -> Result<usize, BusError> {
        // `as` saturates and maps NaN to 0.
        self.value = (raw.trunc() as i32).clamp(SLIDER_MIN, SLIDER_MAX);
        let delivered = self.writer.publish(self.value as f32, 0.0)?;
        debug!(value = self.value, delivered, "slider published");
        Ok(delivered)
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn set_strength(&self, strength: i32) {
        self.writer.set_strength(strength);
    }

    pub fn writer(&self) -> &Arc<DataWriter> {
        &self.writer
    }

    /// Text of the value label.
    pub fn label(&self) -> String {
        format!("Value: {}", self.value)
    }

    /// Window title, showing the writer's current strength.
    pub fn title(&self) -> String {
        format!("Slider Control : Strength = {}", self.writer.strength())
    }
}
