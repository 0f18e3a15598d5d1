//! # Submission Groups
//!
//! One group per shader key. A group owns the GPU-facing resources for its
//! shader (created once, never swapped) and a double buffer of submission
//! slots.
//!
//! ```text
//!             SubmissionGroup("lit")
//! ┌───────────────────────────────────────────────┐
//! │ resources: pipeline + constant buffers        │
//! │                                               │
//! │ slots: DoubleBuffer<SubmissionSlot>           │
//! │   write slot <── append (workers, per-append) │
//! │   read slot  ──> draw, clear (render thread)  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Appends hold the write slot's lock only for the copy. The read slot is
//! touched by the render thread alone, between a swap and the next swap.

use magnet_core::{Arena, DoubleBuffer, SlotReadHandle};

use crate::device::{GpuDevice, GroupResources};
use crate::error::{RenderError, RenderResult};
use crate::submission::{DrawPacket, DrawSubmission, ShaderKey, ShaderStage, SubmissionDraft, SubmissionLimits};

/// Constant-buffer sizes per stage and texture slot count of a shader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupLayout {
    vertex_constant_sizes: Vec<usize>,
    pixel_constant_sizes: Vec<usize>,
    texture_slots: usize,
}

impl GroupLayout {
    /// Creates a layout.
    #[must_use]
    pub fn new(vertex_constant_sizes: Vec<usize>, pixel_constant_sizes: Vec<usize>, texture_slots: usize) -> Self {
        Self {
            vertex_constant_sizes,
            pixel_constant_sizes,
            texture_slots,
        }
    }

    /// Returns the expected block sizes for `stage`.
    #[must_use]
    pub fn constant_sizes(&self, stage: ShaderStage) -> &[usize] {
        match stage {
            ShaderStage::Vertex => &self.vertex_constant_sizes,
            ShaderStage::Pixel => &self.pixel_constant_sizes,
        }
    }

    /// Returns the number of texture slots the shader samples.
    #[must_use]
    pub fn texture_slots(&self) -> usize {
        self.texture_slots
    }

    /// Checks a stored submission against this layout.
    fn accepts(&self, submission: &DrawSubmission) -> bool {
        [ShaderStage::Vertex, ShaderStage::Pixel].into_iter().all(|stage| {
            let expected = self.constant_sizes(stage);
            let actual = submission.constants(stage);
            expected.len() == actual.len()
                && expected.iter().zip(actual).all(|(size, range)| range.len() == *size)
        }) && submission.textures().len() <= self.texture_slots
    }
}

/// One frame's worth of submissions for a group.
#[derive(Debug)]
pub struct SubmissionSlot {
    submissions: Vec<DrawSubmission>,
    constants: Arena,
}

impl SubmissionSlot {
    fn new(limits: &SubmissionLimits) -> Self {
        Self {
            submissions: Vec::with_capacity(limits.max_per_group.min(64)),
            constants: Arena::new(limits.constant_arena_bytes),
        }
    }

    /// Returns the submissions in append order.
    #[must_use]
    pub fn submissions(&self) -> &[DrawSubmission] {
        &self.submissions
    }

    /// Returns the number of submissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    /// Returns true if the slot holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    /// Resolves a submission against this slot's arena.
    #[must_use]
    pub fn packet(&self, index: usize) -> Option<DrawPacket<'_>> {
        self.submissions
            .get(index)
            .map(|submission| DrawPacket::new(submission, &self.constants))
    }

    /// Iterates resolved draw packets in append order.
    pub fn packets(&self) -> impl Iterator<Item = DrawPacket<'_>> {
        self.submissions
            .iter()
            .map(|submission| DrawPacket::new(submission, &self.constants))
    }

    fn clear(&mut self) {
        self.submissions.clear();
        self.constants.reset();
    }
}

/// Outcome of drawing one group's read slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupDrawStats {
    /// Submissions drawn.
    pub drawn: u32,
    /// Submissions skipped for bad data or a failed draw.
    pub skipped: u32,
}

/// Double-buffered submission lists plus the resources of one shader.
#[derive(Debug)]
pub struct SubmissionGroup {
    key: ShaderKey,
    layout: GroupLayout,
    /// `None` when resource creation failed.
    resources: Option<GroupResources>,
    limits: SubmissionLimits,
    slots: DoubleBuffer<SubmissionSlot>,
}

impl SubmissionGroup {
    /// Creates the group, asking `device` for its resources exactly once.
    ///
    /// A creation failure is logged and leaves the group unavailable
    /// rather than failing the caller.
    pub fn create(key: ShaderKey, layout: GroupLayout, limits: SubmissionLimits, device: &dyn GpuDevice) -> Self {
        let resources = match device.create_group_resources(&key, &layout) {
            Ok(resources) => Some(resources),
            Err(err) => {
                tracing::error!(shader = %key, error = %err, "group resources unavailable; draws will be skipped");
                None
            }
        };

        Self {
            key,
            layout,
            resources,
            slots: DoubleBuffer::new(SubmissionSlot::new(&limits), SubmissionSlot::new(&limits)),
            limits,
        }
    }

    /// Returns the shader key.
    #[must_use]
    pub fn key(&self) -> &ShaderKey {
        &self.key
    }

    /// Returns the layout the group was created with.
    #[must_use]
    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    /// Returns the GPU resources, or `None` if creation failed.
    #[must_use]
    pub fn resources(&self) -> Option<&GroupResources> {
        self.resources.as_ref()
    }

    /// Returns true if the group can take draws.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.resources.is_some()
    }

    /// Appends a submission to the write slot.
    ///
    /// Safe to call from many threads at once. Returns the submission's
    /// index within the slot.
    ///
    /// # Errors
    ///
    /// - [`RenderError::GroupUnavailable`] if resource creation failed
    /// - [`RenderError::TooManyConstantBuffers`] / [`RenderError::TooManyTextures`]
    ///   if the draft exceeds the configured bounds
    /// - [`RenderError::CapacityExceeded`] if the slot is full
    /// - [`RenderError::Core`] if the constant data does not fit the arena
    pub fn append(&self, draft: SubmissionDraft<'_>) -> RenderResult<usize> {
        if self.resources.is_none() {
            return Err(RenderError::GroupUnavailable { key: self.key.clone() });
        }
        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            let got = draft.blocks(stage).len();
            if got > self.limits.max_constant_buffers {
                return Err(RenderError::TooManyConstantBuffers {
                    stage,
                    max: self.limits.max_constant_buffers,
                    got,
                });
            }
        }
        if draft.texture_count() > self.limits.max_textures {
            return Err(RenderError::TooManyTextures {
                max: self.limits.max_textures,
                got: draft.texture_count(),
            });
        }

        let mut slot = self.slots.write_handle();
        if slot.submissions.len() >= self.limits.max_per_group {
            return Err(RenderError::CapacityExceeded {
                key: self.key.clone(),
                capacity: self.limits.max_per_group,
            });
        }
        let stored = draft.store(&mut slot.constants)?;
        slot.submissions.push(stored);
        Ok(slot.submissions.len() - 1)
    }

    /// Returns the number of submissions in the write slot.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.write_handle().len()
    }

    /// Flips the write and read slots. Orchestrator only, renderer idle.
    pub fn swap(&self) -> usize {
        self.slots.swap_buffers()
    }

    /// Returns the read slot for rendering.
    pub fn drain_for_render(&self) -> SlotReadHandle<'_, SubmissionSlot> {
        self.slots.read_handle()
    }

    /// Draws every submission in the read slot through `device`.
    ///
    /// Submissions whose constant blocks do not match the layout, or whose
    /// draw the device rejects, are skipped.
    pub fn draw(&self, device: &dyn GpuDevice) -> GroupDrawStats {
        let mut stats = GroupDrawStats::default();
        let Some(resources) = self.resources.as_ref() else {
            return stats;
        };

        let slot = self.drain_for_render();
        for (submission, packet) in slot.submissions().iter().zip(slot.packets()) {
            let _span = tracing::trace_span!("draw", name = packet.name()).entered();
            if !self.layout.accepts(submission) {
                tracing::warn!(shader = %self.key, name = packet.name(), "submission does not match layout; skipped");
                stats.skipped += 1;
                continue;
            }
            match device.draw(resources, &packet) {
                Ok(()) => stats.drawn += 1,
                Err(err) => {
                    tracing::warn!(shader = %self.key, error = %err, "draw failed; skipped");
                    stats.skipped += 1;
                }
            }
        }
        stats
    }

    /// Releases what the renderer consumed: clears the read slot and resets
    /// its constant arena so the slot is empty when it next becomes the
    /// write slot.
    pub fn clear_after_consume(&self) {
        self.slots.read_handle_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;
    use crate::submission::GeometryHandle;

    fn lit_layout() -> GroupLayout {
        GroupLayout::new(vec![64], vec![16], 1)
    }

    fn group(device: &HeadlessDevice, limits: SubmissionLimits) -> SubmissionGroup {
        SubmissionGroup::create("lit".into(), lit_layout(), limits, device)
    }

    fn lit_draft<'a>(name: &str, world: &'a [f32; 16], tint: &'a [f32; 4]) -> SubmissionDraft<'a> {
        SubmissionDraft::new(name, GeometryHandle::new(1, 2))
            .vertex_constants(bytemuck::cast_slice(world))
            .pixel_constants(bytemuck::cast_slice(tint))
    }

    #[test]
    fn test_append_is_invisible_until_swap() {
        let device = HeadlessDevice::new();
        let group = group(&device, SubmissionLimits::default());
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        group.append(lit_draft("a", &world, &tint)).unwrap();
        assert_eq!(group.pending(), 1);
        assert!(group.drain_for_render().is_empty());

        group.swap();
        assert_eq!(group.drain_for_render().len(), 1);
        assert_eq!(group.pending(), 0);
    }

    #[test]
    fn test_draw_then_clear() {
        let device = HeadlessDevice::new();
        let group = group(&device, SubmissionLimits::default());
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        group.append(lit_draft("a", &world, &tint)).unwrap();
        group.append(lit_draft("b", &world, &tint)).unwrap();
        group.swap();

        let stats = group.draw(&device);
        assert_eq!(stats, GroupDrawStats { drawn: 2, skipped: 0 });
        let names: Vec<_> = device.draws().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["a", "b"]);

        group.clear_after_consume();
        assert!(group.drain_for_render().is_empty());
    }

    #[test]
    fn test_layout_mismatch_is_skipped() {
        let device = HeadlessDevice::new();
        let group = group(&device, SubmissionLimits::default());
        let (world, tint) = ([0.0; 16], [1.0; 4]);
        let short = [0.0f32; 4];

        group.append(lit_draft("good", &world, &tint)).unwrap();
        group
            .append(
                SubmissionDraft::new("bad", GeometryHandle::new(1, 2))
                    .vertex_constants(bytemuck::cast_slice(&short))
                    .pixel_constants(bytemuck::cast_slice(&tint)),
            )
            .unwrap();
        group.swap();

        assert_eq!(group.draw(&device), GroupDrawStats { drawn: 1, skipped: 1 });
    }

    #[test]
    fn test_failed_draw_is_skipped() {
        let device = HeadlessDevice::new();
        device.fail_draws_named("cursed");
        let group = group(&device, SubmissionLimits::default());
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        group.append(lit_draft("cursed", &world, &tint)).unwrap();
        group.append(lit_draft("fine", &world, &tint)).unwrap();
        group.swap();

        assert_eq!(group.draw(&device), GroupDrawStats { drawn: 1, skipped: 1 });
    }

    #[test]
    fn test_capacity_exceeded() {
        let device = HeadlessDevice::new();
        let limits = SubmissionLimits {
            max_per_group: 2,
            ..SubmissionLimits::default()
        };
        let group = group(&device, limits);
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        group.append(lit_draft("a", &world, &tint)).unwrap();
        group.append(lit_draft("b", &world, &tint)).unwrap();
        let err = group.append(lit_draft("c", &world, &tint)).unwrap_err();
        assert!(matches!(err, RenderError::CapacityExceeded { capacity: 2, .. }));
    }

    #[test]
    fn test_too_many_constant_blocks() {
        let device = HeadlessDevice::new();
        let limits = SubmissionLimits {
            max_constant_buffers: 1,
            ..SubmissionLimits::default()
        };
        let group = group(&device, limits);
        let block = [0u8; 16];

        let draft = SubmissionDraft::new("x", GeometryHandle::new(1, 1))
            .vertex_constants(&block)
            .vertex_constants(&block);
        let err = group.append(draft).unwrap_err();
        assert!(matches!(
            err,
            RenderError::TooManyConstantBuffers { stage: ShaderStage::Vertex, max: 1, got: 2 }
        ));
    }

    #[test]
    fn test_unavailable_group_rejects_appends() {
        let device = HeadlessDevice::new();
        device.fail_resources_for("lit");
        let group = group(&device, SubmissionLimits::default());
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        assert!(!group.is_available());
        let err = group.append(lit_draft("a", &world, &tint)).unwrap_err();
        assert!(matches!(err, RenderError::GroupUnavailable { .. }));
        assert_eq!(group.draw(&device), GroupDrawStats::default());
    }

    #[test]
    fn test_arena_exhaustion_surfaces_as_error() {
        let device = HeadlessDevice::new();
        let limits = SubmissionLimits {
            constant_arena_bytes: 64,
            ..SubmissionLimits::default()
        };
        let group = group(&device, limits);
        let (world, tint) = ([0.0; 16], [1.0; 4]);

        let err = group.append(lit_draft("a", &world, &tint)).unwrap_err();
        assert!(matches!(err, RenderError::Core(_)));
        assert_eq!(group.pending(), 0);
    }
}
