use crate::shared::frame::Frame;

/// Presents annotated frames to the user.
pub trait FrameDisplay: Send {
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Called once when the session ends. Default: no-op.
    fn finish(&mut self) {}
}

/// Discards frames; for headless runs and tests.
pub struct NullDisplay;

impl FrameDisplay for NullDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
