use crate::shared::frame::Frame;
use crate::shared::region_spec::RegionSpec;

/// Asks the user for the region of interest, given a preview frame.
///
/// `None` means "watch the whole frame". The returned region is only a
/// candidate; the driver validates it against the preview's bounds.
pub trait RegionInput {
    fn select(&mut self, preview: &Frame) -> Option<RegionSpec>;
}

/// A region chosen up front, e.g. from command-line flags.
#[derive(Clone, Debug, Default)]
pub struct FixedRegionInput {
    region: Option<RegionSpec>,
}

impl FixedRegionInput {
    pub fn new(region: Option<RegionSpec>) -> Self {
        Self { region }
    }
}

impl RegionInput for FixedRegionInput {
    fn select(&mut self, preview: &Frame) -> Option<RegionSpec> {
        match &self.region {
            Some(region) => log::info!(
                "Watching region {region} of {}x{} frame",
                preview.width(),
                preview.height()
            ),
            None => log::info!("No region selected, watching the full frame"),
        }
        self.region
    }
}
