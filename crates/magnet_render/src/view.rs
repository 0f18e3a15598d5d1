//! Camera and major light data shared by every pass of a frame.
//!
//! Update tasks write the write slot of a [`SharedView`]; the render loop
//! reads the other slot. The orchestrator swaps it together with the
//! submission groups.

use bytemuck::{Pod, Zeroable};
use magnet_core::DoubleBuffer;

/// Column-major 4x4 matrix.
pub type Mat4 = [[f32; 4]; 4];

/// Identity matrix.
pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Per-frame view constants, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewData {
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// Direction the major light travels, `w` unused.
    pub light_direction: [f32; 4],
    /// Major light colour, `w` is intensity.
    pub light_colour: [f32; 4],
}

impl ViewData {
    /// Sets the camera transforms.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    /// Sets the major directional light.
    pub fn set_major_light(&mut self, direction: [f32; 3], colour: [f32; 4]) {
        self.light_direction = [direction[0], direction[1], direction[2], 0.0];
        self.light_colour = colour;
    }

    /// Returns the raw bytes for constant-buffer upload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for ViewData {
    fn default() -> Self {
        Self {
            view: IDENTITY,
            projection: IDENTITY,
            light_direction: [0.0, -1.0, 0.0, 0.0],
            light_colour: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Double-buffered view data.
pub type SharedView = DoubleBuffer<ViewData>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_data_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ViewData>(), 160);
        assert_eq!(ViewData::default().as_bytes().len(), 160);
    }

    #[test]
    fn test_camera_write_visible_after_swap() {
        let shared = SharedView::default();
        let mut view = IDENTITY;
        view[3][2] = -5.0;

        shared.write_handle().set_camera(view, IDENTITY);
        shared.write_handle().set_major_light([1.0, 0.0, 0.0], [1.0, 0.5, 0.0, 2.0]);
        assert_eq!(shared.read_handle().view, IDENTITY);

        shared.swap_buffers();
        let read = shared.read_handle();
        assert_eq!(read.view[3][2], -5.0);
        assert_eq!(read.light_direction, [1.0, 0.0, 0.0, 0.0]);
    }
}
