//! # Draw Submissions
//!
//! One object's renderable payload for one frame.
//!
//! ```text
//! update task                      submission group write slot
//! ┌────────────────────┐  append   ┌──────────────────────────────┐
//! │ SubmissionDraft<'a>│ ────────> │ DrawSubmission (BlobRanges)  │
//! │  borrows blobs     │   copy    │ Arena (constant bytes)       │
//! └────────────────────┘           └──────────────────────────────┘
//! ```
//!
//! Drafts borrow their constant data; appending copies it into the slot's
//! arena so the caller's buffers can be reused immediately.

use std::fmt;
use std::sync::Arc;

use magnet_core::{Arena, BlobRange};

/// Identity of a shader/material; the key of a submission group.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderKey(Arc<str>);

impl ShaderKey {
    /// Creates a key.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the key as a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderKey({:?})", &*self.0)
    }
}

impl From<&str> for ShaderKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ShaderKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Programmable stage a constant block is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage.
    Vertex,
    /// Pixel stage.
    Pixel,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Pixel => f.write_str("pixel"),
        }
    }
}

/// Opaque handle to device-resident geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GeometryHandle {
    /// Device-assigned geometry id.
    pub id: u64,
    /// Number of triangles.
    pub primitive_count: u32,
}

impl GeometryHandle {
    /// Creates a geometry handle.
    #[must_use]
    pub const fn new(id: u64, primitive_count: u32) -> Self {
        Self { id, primitive_count }
    }

    /// Returns the number of indices a triangle-list draw consumes.
    #[inline]
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.primitive_count.saturating_mul(3)
    }
}

/// A texture view and the sampler to read it with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    /// Device texture view id.
    pub texture: u64,
    /// Device sampler id.
    pub sampler: u64,
}

/// Rasterizer viewport override.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `width` x `height` from the origin.
    #[must_use]
    pub const fn sized(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Per-group capacity limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionLimits {
    /// Submissions a group accepts per frame.
    pub max_per_group: usize,
    /// Bytes of constant data per group slot.
    pub constant_arena_bytes: usize,
    /// Constant blocks per stage per submission.
    pub max_constant_buffers: usize,
    /// Texture bindings per submission.
    pub max_textures: usize,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            max_per_group: 1024,
            constant_arena_bytes: 256 * 1024,
            max_constant_buffers: 8,
            max_textures: 8,
        }
    }
}

/// A submission under construction. Borrows its constant data.
///
/// # Example
///
/// ```rust
/// use magnet_render::{GeometryHandle, SubmissionDraft};
///
/// let transform = [1.0f32; 16];
/// let draft = SubmissionDraft::new("crate", GeometryHandle::new(7, 12))
///     .vertex_constants(bytemuck::cast_slice(&transform));
/// assert_eq!(draft.name(), "crate");
/// ```
#[derive(Clone, Debug)]
pub struct SubmissionDraft<'a> {
    name: String,
    geometry: GeometryHandle,
    vertex_constants: Vec<&'a [u8]>,
    pixel_constants: Vec<&'a [u8]>,
    textures: Vec<TextureBinding>,
    viewport: Option<Viewport>,
}

impl<'a> SubmissionDraft<'a> {
    /// Starts a draft for `geometry`.
    #[must_use]
    pub fn new(name: impl Into<String>, geometry: GeometryHandle) -> Self {
        Self {
            name: name.into(),
            geometry,
            vertex_constants: Vec::new(),
            pixel_constants: Vec::new(),
            textures: Vec::new(),
            viewport: None,
        }
    }

    /// Adds a vertex-stage constant block.
    #[must_use]
    pub fn vertex_constants(mut self, bytes: &'a [u8]) -> Self {
        self.vertex_constants.push(bytes);
        self
    }

    /// Adds a pixel-stage constant block.
    #[must_use]
    pub fn pixel_constants(mut self, bytes: &'a [u8]) -> Self {
        self.pixel_constants.push(bytes);
        self
    }

    /// Binds a texture and sampler to the next slot.
    #[must_use]
    pub fn texture(mut self, binding: TextureBinding) -> Self {
        self.textures.push(binding);
        self
    }

    /// Overrides the viewport for this draw.
    #[must_use]
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Returns the submission name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn blocks(&self, stage: ShaderStage) -> &[&'a [u8]] {
        match stage {
            ShaderStage::Vertex => &self.vertex_constants,
            ShaderStage::Pixel => &self.pixel_constants,
        }
    }

    pub(crate) fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Copies the constant blocks into `arena` and produces the stored form.
    ///
    /// On failure the arena is rolled back to where it was.
    pub(crate) fn store(self, arena: &mut Arena) -> magnet_core::CoreResult<DrawSubmission> {
        let mark = arena.mark();
        let copy_all = |arena: &mut Arena, blocks: &[&[u8]]| {
            blocks
                .iter()
                .map(|bytes| arena.alloc_copy(bytes))
                .collect::<magnet_core::CoreResult<Vec<BlobRange>>>()
        };

        let stored = copy_all(arena, self.vertex_constants.as_slice()).and_then(|vertex| {
            copy_all(arena, self.pixel_constants.as_slice()).map(|pixel| (vertex, pixel))
        });

        match stored {
            Ok((vertex_constants, pixel_constants)) => Ok(DrawSubmission {
                name: self.name,
                geometry: self.geometry,
                vertex_constants,
                pixel_constants,
                textures: self.textures,
                viewport: self.viewport,
            }),
            Err(err) => {
                arena.rewind(mark);
                Err(err)
            }
        }
    }
}

/// A submission stored in a group slot. Its constant bytes live in the
/// slot's arena.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawSubmission {
    name: String,
    geometry: GeometryHandle,
    vertex_constants: Vec<BlobRange>,
    pixel_constants: Vec<BlobRange>,
    textures: Vec<TextureBinding>,
    viewport: Option<Viewport>,
}

impl DrawSubmission {
    /// Returns the submission name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the geometry handle.
    #[must_use]
    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    /// Returns the texture bindings in slot order.
    #[must_use]
    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    /// Returns the viewport override, if any.
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Returns the blob ranges for one stage.
    #[must_use]
    pub fn constants(&self, stage: ShaderStage) -> &[BlobRange] {
        match stage {
            ShaderStage::Vertex => &self.vertex_constants,
            ShaderStage::Pixel => &self.pixel_constants,
        }
    }
}

/// A stored submission resolved against its arena, as handed to a device.
#[derive(Clone, Copy, Debug)]
pub struct DrawPacket<'a> {
    submission: &'a DrawSubmission,
    arena: &'a Arena,
}

impl<'a> DrawPacket<'a> {
    pub(crate) fn new(submission: &'a DrawSubmission, arena: &'a Arena) -> Self {
        Self { submission, arena }
    }

    /// Returns the submission name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.submission.name
    }

    /// Returns the geometry handle.
    #[must_use]
    pub fn geometry(&self) -> GeometryHandle {
        self.submission.geometry
    }

    /// Returns the texture bindings in slot order.
    #[must_use]
    pub fn textures(&self) -> &'a [TextureBinding] {
        &self.submission.textures
    }

    /// Returns the viewport override, if any.
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.submission.viewport
    }

    /// Returns the constant block at `index` for `stage`.
    #[must_use]
    pub fn constant(&self, stage: ShaderStage, index: usize) -> Option<&'a [u8]> {
        let range = *self.submission.constants(stage).get(index)?;
        self.arena.get(range)
    }

    /// Iterates the constant blocks for `stage`.
    pub fn constants(&self, stage: ShaderStage) -> impl Iterator<Item = &'a [u8]> + 'a {
        let arena = self.arena;
        self.submission
            .constants(stage)
            .iter()
            .filter_map(move |range| arena.get(*range))
    }
}
