//! # Scene
//!
//! The scene is the source of update work: every object in it gets one
//! update task per frame. Objects write draw submissions and view data
//! through the [`UpdateContext`] they are handed.
//!
//! Two stock objects are provided: [`SpinningObject`] (a mesh rotating in
//! place) and [`OrbitCamera`] (a camera circling the origin that also owns
//! the major light).

use std::sync::Arc;

use magnet_core::SlotWriteHandle;
use magnet_render::{
    GeometryHandle, GroupLayout, Mat4, ShaderKey, SharedView, SubmissionDraft, SubmissionRegistry, ViewData,
};

use crate::error::UpdateError;

/// What an update task can reach.
#[derive(Clone, Debug)]
pub struct UpdateContext {
    frame: u64,
    registry: Arc<SubmissionRegistry>,
    view: Arc<SharedView>,
}

impl UpdateContext {
    /// Creates a context for `frame`.
    #[must_use]
    pub fn new(frame: u64, registry: Arc<SubmissionRegistry>, view: Arc<SharedView>) -> Self {
        Self { frame, registry, view }
    }

    /// Frame this work builds. Submissions made now are drawn when the
    /// render counter reaches `frame + 1`.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Appends a draw submission to the group for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Submission`] if the group rejects it.
    pub fn submit(&self, key: &ShaderKey, layout: &GroupLayout, draft: SubmissionDraft<'_>) -> Result<usize, UpdateError> {
        Ok(self.registry.submit(key, layout, draft)?)
    }

    /// Locks the write slot of the view data.
    pub fn view(&self) -> SlotWriteHandle<'_, ViewData> {
        self.view.write_handle()
    }

    /// Returns the submission registry.
    #[must_use]
    pub fn registry(&self) -> &SubmissionRegistry {
        &self.registry
    }
}

/// An object updated once per frame on some worker thread.
pub trait Updatable: Send + Sync {
    /// Name used in task labels and logs.
    fn name(&self) -> &str;

    /// Produces this object's contribution to the frame.
    ///
    /// # Errors
    ///
    /// Any error is logged and counted; the frame continues without this
    /// object's output.
    fn update(&self, ctx: &UpdateContext) -> Result<(), UpdateError>;
}

/// Ordered list of updatable objects.
#[derive(Default, Clone)]
pub struct Scene {
    objects: Vec<Arc<dyn Updatable>>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    pub fn add(&mut self, object: impl Updatable + 'static) -> &mut Self {
        self.objects.push(Arc::new(object));
        self
    }

    /// Adds a shared object.
    pub fn add_shared(&mut self, object: Arc<dyn Updatable>) -> &mut Self {
        self.objects.push(object);
        self
    }

    /// Returns the objects in insertion order.
    #[must_use]
    pub fn objects(&self) -> &[Arc<dyn Updatable>] {
        &self.objects
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the scene is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.objects.iter().map(|o| o.name())).finish()
    }
}

// ============================================================================
// STOCK OBJECTS
// ============================================================================

/// A mesh spinning about its vertical axis.
///
/// Submits one world matrix (vertex stage) and one tint (pixel stage) per
/// frame.
#[derive(Debug, Clone)]
pub struct SpinningObject {
    name: String,
    key: ShaderKey,
    layout: GroupLayout,
    geometry: GeometryHandle,
    position: [f32; 3],
    radians_per_frame: f32,
    tint: [f32; 4],
}

impl SpinningObject {
    /// Creates a spinning object drawn with shader `key`.
    #[must_use]
    pub fn new(name: impl Into<String>, key: impl Into<ShaderKey>, geometry: GeometryHandle) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            layout: Self::layout(),
            geometry,
            position: [0.0; 3],
            radians_per_frame: 0.02,
            tint: [1.0; 4],
        }
    }

    /// Layout every spinning-object shader uses.
    #[must_use]
    pub fn layout() -> GroupLayout {
        GroupLayout::new(vec![std::mem::size_of::<Mat4>()], vec![std::mem::size_of::<[f32; 4]>()], 0)
    }

    /// Places the object.
    #[must_use]
    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    /// Sets the spin rate.
    #[must_use]
    pub fn spinning(mut self, radians_per_frame: f32) -> Self {
        self.radians_per_frame = radians_per_frame;
        self
    }

    /// Sets the tint colour.
    #[must_use]
    pub fn tinted(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    /// World matrix at `frame`.
    #[must_use]
    pub fn world_at(&self, frame: u64) -> Mat4 {
        rotation_y(frame as f32 * self.radians_per_frame, self.position)
    }
}

impl Updatable for SpinningObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&self, ctx: &UpdateContext) -> Result<(), UpdateError> {
        let world = self.world_at(ctx.frame());
        let draft = SubmissionDraft::new(self.name.as_str(), self.geometry)
            .vertex_constants(bytemuck::bytes_of(&world))
            .pixel_constants(bytemuck::bytes_of(&self.tint));
        ctx.submit(&self.key, &self.layout, draft)?;
        Ok(())
    }
}

/// Camera circling the origin; also aims the major light with it.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    radius: f32,
    radians_per_frame: f32,
    projection: Mat4,
    light_colour: [f32; 4],
}

impl OrbitCamera {
    /// Creates a camera `radius` units from the origin.
    #[must_use]
    pub fn new(radius: f32, aspect: f32) -> Self {
        Self {
            radius,
            radians_per_frame: 0.005,
            projection: perspective(std::f32::consts::FRAC_PI_3, aspect, 0.1, 500.0),
            light_colour: [1.0, 0.95, 0.9, 1.0],
        }
    }

    /// View matrix at `frame`.
    #[must_use]
    pub fn view_at(&self, frame: u64) -> Mat4 {
        let angle = frame as f32 * self.radians_per_frame;
        // Inverse of "rotate by angle, then move back by radius".
        let mut view = rotation_y(-angle, [0.0; 3]);
        view[3][2] = -self.radius;
        view
    }
}

impl Updatable for OrbitCamera {
    fn name(&self) -> &str {
        "orbit-camera"
    }

    fn update(&self, ctx: &UpdateContext) -> Result<(), UpdateError> {
        let frame = ctx.frame();
        let angle = frame as f32 * self.radians_per_frame;
        let mut view = ctx.view();
        view.set_camera(self.view_at(frame), self.projection);
        view.set_major_light([angle.sin(), -1.0, angle.cos()], self.light_colour);
        Ok(())
    }
}

/// Rotation about +Y followed by a translation, column-major.
#[must_use]
pub fn rotation_y(angle: f32, translation: [f32; 3]) -> Mat4 {
    let (sin, cos) = angle.sin_cos();
    [
        [cos, 0.0, -sin, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [sin, 0.0, cos, 0.0],
        [translation[0], translation[1], translation[2], 1.0],
    ]
}

/// Left-handed perspective projection with depth in `[0, 1]`, column-major.
#[must_use]
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let y_scale = 1.0 / (fov_y * 0.5).tan();
    let x_scale = y_scale / aspect;
    let depth = far / (far - near);
    [
        [x_scale, 0.0, 0.0, 0.0],
        [0.0, y_scale, 0.0, 0.0],
        [0.0, 0.0, depth, 1.0],
        [0.0, 0.0, -near * depth, 0.0],
    ]
}
