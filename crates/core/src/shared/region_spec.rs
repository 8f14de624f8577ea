use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons for a region of interest.
///
/// Raised at configuration time; a session with an invalid region never
/// starts running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("region {left},{top},{right},{bottom} is empty (right must exceed left, bottom must exceed top)")]
    Empty {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    #[error("region {region} exceeds frame bounds {width}x{height}")]
    OutOfBounds {
        region: RegionSpec,
        width: u32,
        height: u32,
    },
    #[error("cannot parse region '{input}': expected four comma-separated integers")]
    Parse { input: String },
}

/// The active detection zone, in full-frame pixel coordinates.
///
/// Bounds are half-open: columns `left..right`, rows `top..bottom`. The
/// rectangle is never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRegion", into = "RawRegion")]
pub struct RegionSpec {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl RegionSpec {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, RegionError> {
        if right <= left || bottom <= top {
            return Err(RegionError::Empty {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Builds a region from a drag rectangle (`x`, `y`, `width`, `height`).
    pub fn from_xywh(x: u32, y: u32, width: u32, height: u32) -> Result<Self, RegionError> {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Offset that maps region-local coordinates to full-frame coordinates.
    pub fn origin(&self) -> (f64, f64) {
        (self.left as f64, self.top as f64)
    }

    /// Ensures the region fits entirely inside a `width` x `height` frame.
    pub fn validate_within(&self, width: u32, height: u32) -> Result<(), RegionError> {
        if self.right > width || self.bottom > height {
            return Err(RegionError::OutOfBounds {
                region: *self,
                width,
                height,
            });
        }
        Ok(())
    }

    /// Intersects the region with a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the region remains visible, e.g. after
    /// the source switched to a smaller resolution mid-session.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<RegionSpec> {
        Self::new(
            self.left.min(width),
            self.top.min(height),
            self.right.min(width),
            self.bottom.min(height),
        )
        .ok()
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.left, self.top, self.right, self.bottom)
    }
}

/// Parses `left,top,right,bottom`.
impl FromStr for RegionSpec {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [left, top, right, bottom] = parse_quad(s)?;
        Self::new(left, top, right, bottom)
    }
}

/// Parses four comma-separated unsigned integers, as used by both the
/// `l,t,r,b` and `x,y,w,h` region notations.
pub fn parse_quad(s: &str) -> Result<[u32; 4], RegionError> {
    let parse_err = || RegionError::Parse {
        input: s.to_string(),
    };
    let values: Vec<u32> = s
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| parse_err())?;
    values.try_into().map_err(|_| parse_err())
}

#[derive(Serialize, Deserialize)]
struct RawRegion {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl TryFrom<RawRegion> for RegionSpec {
    type Error = RegionError;

    fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
        Self::new(raw.left, raw.top, raw.right, raw.bottom)
    }
}

impl From<RegionSpec> for RawRegion {
    fn from(r: RegionSpec) -> Self {
        Self {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}
