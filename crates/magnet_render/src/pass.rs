//! # Render Passes
//!
//! A closed set of pass variants. The render loop runs them in a fixed
//! order each frame.

use std::fmt;

use crate::device::GpuDevice;
use crate::registry::SubmissionRegistry;
use crate::stats::PassStats;
use crate::view::ViewData;

/// A render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    /// Every submission group in key order, depth-tested, no blending.
    Opaque,
}

impl RenderPass {
    /// Passes in execution order.
    pub const ALL: [Self; 1] = [Self::Opaque];

    /// Returns the pass name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
        }
    }

    /// Runs the pass over the registry's read slots.
    pub fn execute(self, device: &dyn GpuDevice, registry: &SubmissionRegistry, view: &ViewData) -> PassStats {
        let _span = tracing::debug_span!("pass", pass = self.name()).entered();
        let mut stats = PassStats::default();

        if let Err(err) = device.begin_pass(self, view) {
            tracing::error!(pass = self.name(), error = %err, "pass could not begin; frame dropped");
            stats.failed = true;
            // Consumed slots still have to be released for the next swap.
            for group in registry.groups_in_order() {
                group.clear_after_consume();
            }
            return stats;
        }

        match self {
            Self::Opaque => {
                for group in registry.groups_in_order() {
                    let _group_span = tracing::trace_span!("group", shader = %group.key()).entered();
                    stats.groups_visited += 1;
                    if !group.is_available() {
                        stats.groups_unavailable += 1;
                    }
                    let drawn = group.draw(device);
                    stats.draw_calls += drawn.drawn;
                    stats.skipped += drawn.skipped;
                    group.clear_after_consume();
                }
            }
        }

        stats
    }
}

impl fmt::Display for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
