// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Performance statistics for the graphics device.

/// Counters collected over one frame, returned by `end_frame`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// Number of draw calls issued to the driver.
    pub draw_calls: u32,
    /// Number of compute dispatches issued to the driver.
    pub dispatches: u32,
    /// Commands skipped because they were not legal in the current state.
    pub skipped_commands: u32,
    /// Native bind calls issued by the state cache.
    pub binds_issued: u32,
    /// Native bind calls the state cache suppressed as redundant.
    pub binds_suppressed: u32,
    /// Native memory-barrier calls.
    pub barriers_issued: u32,
    /// Programs linked this frame (cache misses).
    pub programs_linked: u32,
    /// Framebuffer cache entries built this frame.
    pub framebuffers_created: u32,
    /// Framebuffer cache entries evicted this frame.
    pub framebuffers_evicted: u32,
}
