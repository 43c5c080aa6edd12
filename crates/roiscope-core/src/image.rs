//! The image a set of regions is drawn on.

use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Read access to the dimensions and current plane of an image.
pub trait ImageSource {
    /// Image width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Number of Z-planes.
    fn z_count(&self) -> u32;

    /// Number of timepoints.
    fn t_count(&self) -> u32;

    /// Currently displayed Z-plane.
    fn current_z(&self) -> u32;

    /// Currently displayed timepoint.
    fn current_t(&self) -> u32;

    /// Indices of the channels being displayed.
    fn active_channels(&self) -> Vec<u32>;

    /// Image extent in display space (Y grows upward, so the image lies below the X axis).
    fn extent(&self) -> Rect {
        let (width, height) = self.size();
        Rect::new(0.0, -f64::from(height), f64::from(width), 0.0)
    }

    /// Check whether a shape attached to `(z, t, c)` shows on the current plane.
    ///
    /// `-1` in any dimension matches everything.
    fn shows(&self, the_z: i32, the_t: i32, the_c: i32) -> bool {
        let matches = |dim: i32, current: u32| dim < 0 || dim as u32 == current;
        matches(the_z, self.current_z())
            && matches(the_t, self.current_t())
            && (the_c < 0 || self.active_channels().contains(&(the_c as u32)))
    }
}

/// Plain image description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub z_count: u32,
    pub t_count: u32,
    pub current_z: u32,
    pub current_t: u32,
    pub active_channels: Vec<u32>,
}

impl ImageInfo {
    /// A single-plane image with one active channel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            z_count: 1,
            t_count: 1,
            current_z: 0,
            current_t: 0,
            active_channels: vec![0],
        }
    }

    /// Set the number of Z-planes and timepoints.
    pub fn with_planes(mut self, z_count: u32, t_count: u32) -> Self {
        self.z_count = z_count.max(1);
        self.t_count = t_count.max(1);
        self
    }
}

impl ImageSource for ImageInfo {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn z_count(&self) -> u32 {
        self.z_count
    }

    fn t_count(&self) -> u32 {
        self.t_count
    }

    fn current_z(&self) -> u32 {
        self.current_z
    }

    fn current_t(&self) -> u32 {
        self.current_t
    }

    fn active_channels(&self) -> Vec<u32> {
        self.active_channels.clone()
    }
}
