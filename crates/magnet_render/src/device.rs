//! # Device Seam
//!
//! The render side talks to the graphics API only through [`GpuDevice`].
//! Resource creation may be called from any worker thread (groups are
//! created lazily by update tasks); drawing and presenting happen on the
//! render thread.
//!
//! [`HeadlessDevice`] implements the seam without a GPU. It hands out
//! handles, records every draw and present, and can be told to fail.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::DeviceError;
use crate::group::GroupLayout;
use crate::pass::RenderPass;
use crate::submission::{DrawPacket, ShaderKey, ShaderStage, Viewport};
use crate::view::ViewData;

/// Device pipeline state handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// Device constant buffer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// GPU-facing resources owned by a submission group.
///
/// Created once per shader key; never touched by a swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupResources {
    /// Compiled shaders and input layout.
    pub pipeline: PipelineHandle,
    /// One buffer per vertex-stage constant block in the layout.
    pub vertex_buffers: Vec<BufferHandle>,
    /// One buffer per pixel-stage constant block in the layout.
    pub pixel_buffers: Vec<BufferHandle>,
}

/// Graphics device operations the pipeline needs.
pub trait GpuDevice: Send + Sync {
    /// Creates pipeline state and constant buffers for a shader key.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::ResourceCreation`] on failure; the group is
    /// then unusable.
    fn create_group_resources(
        &self,
        key: &ShaderKey,
        layout: &GroupLayout,
    ) -> Result<GroupResources, DeviceError>;

    /// Begins a pass with this frame's view data.
    ///
    /// # Errors
    ///
    /// Device-specific.
    fn begin_pass(&self, pass: RenderPass, view: &ViewData) -> Result<(), DeviceError>;

    /// Uploads a packet's constants into the group buffers and draws it.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Draw`]; the caller skips the submission.
    fn draw(&self, resources: &GroupResources, packet: &DrawPacket<'_>) -> Result<(), DeviceError>;

    /// Presents the finished frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Present`].
    fn present(&self, frame: u64) -> Result<(), DeviceError>;
}

/// One draw recorded by [`HeadlessDevice`].
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    /// Pipeline the draw used.
    pub pipeline: PipelineHandle,
    /// Submission name.
    pub name: String,
    /// Indices drawn.
    pub index_count: u32,
    /// Bytes uploaded to constant buffers.
    pub constant_bytes: usize,
    /// Texture bindings.
    pub textures: usize,
    /// Viewport override, if any.
    pub viewport: Option<Viewport>,
}

/// A device that renders nothing and remembers everything.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: AtomicU64,
    resources_created: AtomicU64,
    passes_begun: AtomicU64,
    presents: AtomicU64,
    last_presented: AtomicU64,
    draws: Mutex<Vec<DrawRecord>>,
    last_view: Mutex<Option<ViewData>>,
    failing_keys: Mutex<HashSet<ShaderKey>>,
    failing_draws: Mutex<HashSet<String>>,
}

impl HeadlessDevice {
    /// Creates a device with no failures configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes resource creation fail for `key`.
    pub fn fail_resources_for(&self, key: impl Into<ShaderKey>) {
        self.failing_keys.lock().insert(key.into());
    }

    /// Makes every draw of a submission called `name` fail.
    pub fn fail_draws_named(&self, name: impl Into<String>) {
        self.failing_draws.lock().insert(name.into());
    }

    /// Returns how many times group resources were created.
    #[must_use]
    pub fn resources_created(&self) -> u64 {
        self.resources_created.load(Ordering::Acquire)
    }

    /// Returns how many passes were begun.
    #[must_use]
    pub fn passes_begun(&self) -> u64 {
        self.passes_begun.load(Ordering::Acquire)
    }

    /// Returns how many frames were presented.
    #[must_use]
    pub fn present_count(&self) -> u64 {
        self.presents.load(Ordering::Acquire)
    }

    /// Returns the last presented frame number.
    #[must_use]
    pub fn last_presented(&self) -> u64 {
        self.last_presented.load(Ordering::Acquire)
    }

    /// Returns the view data of the most recent pass.
    #[must_use]
    pub fn last_view(&self) -> Option<ViewData> {
        *self.last_view.lock()
    }

    /// Returns a copy of every recorded draw.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.draws.lock().clone()
    }

    /// Removes and returns every recorded draw.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut *self.draws.lock())
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_group_resources(
        &self,
        key: &ShaderKey,
        layout: &GroupLayout,
    ) -> Result<GroupResources, DeviceError> {
        if self.failing_keys.lock().contains(key) {
            return Err(DeviceError::ResourceCreation {
                key: key.clone(),
                reason: "shader failed to compile".to_string(),
            });
        }

        let resources = GroupResources {
            pipeline: PipelineHandle(self.handle()),
            vertex_buffers: (0..layout.constant_sizes(ShaderStage::Vertex).len())
                .map(|_| BufferHandle(self.handle()))
                .collect(),
            pixel_buffers: (0..layout.constant_sizes(ShaderStage::Pixel).len())
                .map(|_| BufferHandle(self.handle()))
                .collect(),
        };
        self.resources_created.fetch_add(1, Ordering::AcqRel);
        Ok(resources)
    }

    fn begin_pass(&self, _pass: RenderPass, view: &ViewData) -> Result<(), DeviceError> {
        *self.last_view.lock() = Some(*view);
        self.passes_begun.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn draw(&self, resources: &GroupResources, packet: &DrawPacket<'_>) -> Result<(), DeviceError> {
        if self.failing_draws.lock().contains(packet.name()) {
            return Err(DeviceError::Draw {
                name: packet.name().to_string(),
                reason: "device lost".to_string(),
            });
        }

        let constant_bytes = packet
            .constants(ShaderStage::Vertex)
            .chain(packet.constants(ShaderStage::Pixel))
            .map(<[u8]>::len)
            .sum();

        self.draws.lock().push(DrawRecord {
            pipeline: resources.pipeline,
            name: packet.name().to_string(),
            index_count: packet.geometry().index_count(),
            constant_bytes,
            textures: packet.textures().len(),
            viewport: packet.viewport(),
        });
        Ok(())
    }

    fn present(&self, frame: u64) -> Result<(), DeviceError> {
        self.presents.fetch_add(1, Ordering::AcqRel);
        self.last_presented.store(frame, Ordering::Release);
        Ok(())
    }
}
