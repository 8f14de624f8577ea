use ndarray::{s, ArrayView3, ArrayViewMut3};

use crate::shared::region_spec::RegionSpec;

/// A single video frame: contiguous RGB bytes in row-major order.
///
/// Pixel order is fixed at the I/O boundary (decoders emit RGB24); the
/// pipeline never reorders channels. `index` is the position of the frame
/// in its source's sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Solid-color RGB frame, mostly useful for synthetic sources.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `region` into a new frame.
    ///
    /// The region must already lie within this frame's bounds (see
    /// [`RegionSpec::clamp_to`]). The crop keeps the source frame's index.
    pub fn crop(&self, region: &RegionSpec) -> Frame {
        let (left, top) = (region.left() as usize, region.top() as usize);
        let (right, bottom) = (region.right() as usize, region.bottom() as usize);
        debug_assert!(right <= self.width as usize && bottom <= self.height as usize);

        let view = self.as_ndarray();
        let data: Vec<u8> = view
            .slice(s![top..bottom, left..right, ..])
            .iter()
            .copied()
            .collect();

        Frame::new(
            data,
            (right - left) as u32,
            (bottom - top) as u32,
            self.channels,
            self.index,
        )
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
