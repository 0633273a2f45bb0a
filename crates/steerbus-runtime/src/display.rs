//! [`SteeringDisplay`] – renders the steering wheel at the latest angle.
//!
//! The display itself only tracks state. Drawing is delegated to a
//! [`Render`] backend, which receives the wheel rotation: the negated
//! steering position, so a positive (rightward) command turns the picture
//! clockwise. Positions are passed through untouched; `-180.0` and `180.0`
//! render as the same upside-down wheel without any clamping.

use steerbus_types::SampleInfo;
use tracing::debug;

use crate::poll_loop::SampleSink;

/// Drawing backend for the wheel.
pub trait Render: Send {
    fn render(&mut self, rotation_degrees: f32);
}

impl<F> Render for F
where
    F: FnMut(f32) + Send,
{
    fn render(&mut self, rotation_degrees: f32) {
        self(rotation_degrees)
    }
}

pub struct SteeringDisplay<R> {
    renderer: R,
    angle: f32,
    frames: u64,
}

impl<R: Render> SteeringDisplay<R> {
    /// Create the display and draw the wheel at rest.
    pub fn new(renderer: R) -> Self {
        let mut display = Self {
            renderer,
            angle: 0.0,
            frames: 0,
        };
        display.show(0.0);
        display
    }

    /// Last rendered steering position in degrees.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Rotation applied to the wheel picture.
    pub fn rotation(&self) -> f32 {
        -self.angle
    }

    /// Frames drawn so far, the initial one included.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn show(&mut self, angle: f32) {
        self.angle = angle;
        self.frames += 1;
        self.renderer.render(-angle);
    }
}

impl<R: Render> SampleSink for SteeringDisplay<R> {
    fn on_sample(&mut self, position: f32, _speed: f32) {
        self.show(position);
    }

    fn on_metadata(&mut self, info: &SampleInfo) {
        debug!(
            writer = %info.writer,
            kind = ?info.kind,
            angle = self.angle,
            "keeping last rendered angle"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use steerbus_types::{SampleKind, WriterId};

    #[derive(Default)]
    struct Canvas {
        rotations: Vec<f32>,
    }

    impl Render for Canvas {
        fn render(&mut self, rotation_degrees: f32) {
            self.rotations.push(rotation_degrees);
        }
    }

    #[test]
    fn starts_at_rest() {
        let display = SteeringDisplay::new(Canvas::default());
        assert_eq!(display.angle(), 0.0);
        assert_eq!(display.frames(), 1);
        assert_eq!(display.renderer().rotations.len(), 1);
    }

    #[test]
    fn rotation_is_the_negated_position() {
        let mut display = SteeringDisplay::new(Canvas::default());
        display.on_sample(45.0, 0.0);
        assert_eq!(display.angle(), 45.0);
        assert_eq!(display.rotation(), -45.0);
        assert_eq!(display.renderer().rotations.last(), Some(&-45.0));
    }

    #[test]
    fn boundary_positions_render_unclamped() {
        let mut display = SteeringDisplay::new(Canvas::default());
        display.on_sample(-180.0, 0.0);
        assert_eq!(display.angle(), -180.0);
        display.on_sample(180.0, 0.0);
        assert_eq!(display.angle(), 180.0);
        assert_eq!(&display.renderer().rotations[1..], &[180.0, -180.0]);
    }

    #[test]
    fn metadata_keeps_the_last_angle() {
        let mut display = SteeringDisplay::new(Canvas::default());
        display.on_sample(30.0, 0.0);
        display.on_metadata(&SampleInfo {
            writer: WriterId(1),
            strength: 0,
            sequence: 0,
            source_timestamp: Utc::now(),
            valid: false,
            kind: SampleKind::WriterNotAlive,
        });
        assert_eq!(display.angle(), 30.0);
        assert_eq!(display.frames(), 2);
    }

    #[test]
    fn closures_can_render() {
        let mut seen = Vec::new();
        {
            let mut display = SteeringDisplay::new(|r: f32| seen.push(r));
            display.on_sample(90.0, 0.0);
        }
        assert_eq!(seen, vec![-0.0, -90.0]);
    }
}
