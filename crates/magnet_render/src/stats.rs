//! Rendering statistics.

use std::time::Duration;

/// Counters from running one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Submissions skipped.
    pub skipped: u32,
    /// Groups iterated.
    pub groups_visited: u32,
    /// Groups without resources.
    pub groups_unavailable: u32,
    /// The device refused to begin the pass.
    pub failed: bool,
}

/// Published by the render loop after each presented frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Render frame number.
    pub frame: u64,
    /// Draw calls issued across all passes.
    pub draw_calls: u32,
    /// Submissions skipped across all passes.
    pub skipped: u32,
    /// Groups visited across all passes.
    pub groups_visited: u32,
    /// Wall time from the start of the first pass to the end of present.
    pub duration: Duration,
    /// Present succeeded.
    pub presented: bool,
}

impl FrameReport {
    pub(crate) fn absorb(&mut self, pass: PassStats) {
        self.draw_calls += pass.draw_calls;
        self.skipped += pass.skipped;
        self.groups_visited += pass.groups_visited;
    }
}

/// Totals kept by the render thread over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames rendered.
    pub frames: u64,
    /// Draw calls issued.
    pub draw_calls: u64,
    /// Submissions skipped.
    pub skipped: u64,
    /// Frames whose present failed.
    pub failed_presents: u64,
    /// Reports dropped because the channel was full.
    pub reports_dropped: u64,
    /// Slowest frame.
    pub worst_frame: Duration,
}

impl RenderStats {
    /// Average draw calls per frame.
    #[must_use]
    pub fn draw_calls_per_frame(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.draw_calls as f64 / self.frames as f64
        }
    }

    pub(crate) fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.draw_calls += u64::from(report.draw_calls);
        self.skipped += u64::from(report.skipped);
        if !report.presented {
            self.failed_presents += 1;
        }
        self.worst_frame = self.worst_frame.max(report.duration);
    }
}
