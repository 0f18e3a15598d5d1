//! # Submission Registry
//!
//! Shader key to [`SubmissionGroup`] map. Groups are created lazily on the
//! first submission for a key and live until the registry is dropped.
//!
//! The map lock is held only for lookup or creation; appends go through
//! the group's own slot lock. Creation happens under the write lock, so
//! two workers racing on a new key cause exactly one resource creation.
//! Iteration order is key order, which fixes the draw order across frames.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::GpuDevice;
use crate::error::{RenderError, RenderResult};
use crate::group::{GroupLayout, SubmissionGroup};
use crate::submission::{ShaderKey, SubmissionDraft, SubmissionLimits};

/// Registry of submission groups sharing one device.
pub struct SubmissionRegistry {
    groups: RwLock<BTreeMap<ShaderKey, Arc<SubmissionGroup>>>,
    device: Arc<dyn GpuDevice>,
    limits: SubmissionLimits,
}

impl SubmissionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(device: Arc<dyn GpuDevice>, limits: SubmissionLimits) -> Self {
        Self {
            groups: RwLock::new(BTreeMap::new()),
            device,
            limits,
        }
    }

    /// Returns the device groups are created on.
    #[must_use]
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// Returns the limits every group is created with.
    #[must_use]
    pub fn limits(&self) -> SubmissionLimits {
        self.limits
    }

    /// Returns the group for `key`, creating it with `layout` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::LayoutMismatch`] if the key exists with a
    /// different layout. A group whose resource creation failed is still
    /// returned; it reports itself unavailable.
    pub fn get_or_create(&self, key: &ShaderKey, layout: &GroupLayout) -> RenderResult<Arc<SubmissionGroup>> {
        if let Some(group) = self.groups.read().get(key) {
            return Self::check_layout(group, layout);
        }

        let mut groups = self.groups.write();
        if let Some(group) = groups.get(key) {
            return Self::check_layout(group, layout);
        }

        let group = Arc::new(SubmissionGroup::create(
            key.clone(),
            layout.clone(),
            self.limits,
            self.device.as_ref(),
        ));
        groups.insert(key.clone(), Arc::clone(&group));
        tracing::debug!(shader = %key, available = group.is_available(), "submission group created");
        Ok(group)
    }

    /// Looks up an existing group.
    #[must_use]
    pub fn get(&self, key: &ShaderKey) -> Option<Arc<SubmissionGroup>> {
        self.groups.read().get(key).cloned()
    }

    /// Finds or creates the group for `key` and appends `draft` to it.
    ///
    /// # Errors
    ///
    /// See [`SubmissionRegistry::get_or_create`] and [`SubmissionGroup::append`].
    pub fn submit(&self, key: &ShaderKey, layout: &GroupLayout, draft: SubmissionDraft<'_>) -> RenderResult<usize> {
        self.get_or_create(key, layout)?.append(draft)
    }

    /// Returns every group in key order.
    #[must_use]
    pub fn groups_in_order(&self) -> Vec<Arc<SubmissionGroup>> {
        self.groups.read().values().cloned().collect()
    }

    /// Swaps every group. Orchestrator only, renderer idle.
    pub fn swap_all(&self) {
        for group in self.groups.read().values() {
            group.swap();
        }
    }

    /// Returns the number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Returns true if no group exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    fn check_layout(group: &Arc<SubmissionGroup>, layout: &GroupLayout) -> RenderResult<Arc<SubmissionGroup>> {
        if group.layout() == layout {
            Ok(Arc::clone(group))
        } else {
            Err(RenderError::LayoutMismatch {
                key: group.key().clone(),
            })
        }
    }
}

impl std::fmt::Debug for SubmissionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionRegistry")
            .field("groups", &self.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;
    use crate::submission::GeometryHandle;

    fn registry() -> (Arc<HeadlessDevice>, SubmissionRegistry) {
        let device = Arc::new(HeadlessDevice::new());
        let registry = SubmissionRegistry::new(device.clone(), SubmissionLimits::default());
        (device, registry)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (device, registry) = registry();
        let key = ShaderKey::from("lit");
        let layout = GroupLayout::new(vec![64], vec![], 0);

        let first = registry.get_or_create(&key, &layout).unwrap();
        let second = registry.get_or_create(&key, &layout).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.resources_created(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_creation_creates_once() {
        let (device, registry) = registry();
        let registry = Arc::new(registry);
        let layout = GroupLayout::new(vec![64], vec![], 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let layout = layout.clone();
                std::thread::spawn(move || registry.get_or_create(&"shared".into(), &layout).unwrap())
            })
            .collect();
        let groups: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(groups.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(device.resources_created(), 1);
    }

    #[test]
    fn test_layout_mismatch() {
        let (_device, registry) = registry();
        let key = ShaderKey::from("lit");
        registry.get_or_create(&key, &GroupLayout::new(vec![64], vec![], 0)).unwrap();

        let err = registry.get_or_create(&key, &GroupLayout::new(vec![16], vec![], 0)).unwrap_err();
        assert!(matches!(err, RenderError::LayoutMismatch { .. }));
    }

    #[test]
    fn test_groups_in_key_order() {
        let (_device, registry) = registry();
        let layout = GroupLayout::default();
        for name in ["water", "opaque", "glass"] {
            registry.get_or_create(&name.into(), &layout).unwrap();
        }

        let keys: Vec<_> = registry
            .groups_in_order()
            .iter()
            .map(|group| group.key().as_str().to_string())
            .collect();
        assert_eq!(keys, ["glass", "opaque", "water"]);
    }

    #[test]
    fn test_submit_and_swap_all() {
        let (_device, registry) = registry();
        let layout = GroupLayout::default();
        for name in ["a", "b"] {
            registry
                .submit(&name.into(), &layout, SubmissionDraft::new(name, GeometryHandle::new(1, 1)))
                .unwrap();
        }

        registry.swap_all();
        for group in registry.groups_in_order() {
            assert_eq!(group.drain_for_render().len(), 1);
        }
    }
}
