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

//! Global settings for the graphics device.

use serde::{Deserialize, Serialize};

/// Settings that shape how the backend buffers frames and validates input.
///
/// Loaded by the embedding application (usually from JSON) and handed to the
/// device at creation. Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Number of frames that may be in flight. Ring-buffered dynamic
    /// buffers keep one copy per frame, and frame fences rotate over this
    /// many slots.
    pub buffering_count: u32,
    /// Extra frames a framebuffer cache entry survives unused beyond
    /// `buffering_count` before it is evicted.
    pub framebuffer_eviction_margin: u32,
    /// If `true`, descriptor-set data is checked against the pipeline layout
    /// and mismatches are logged.
    pub validation: bool,
    /// Upper bound of texture units a single program may use.
    pub max_texture_units: u32,
    /// Alignment of each ring-buffer slot, matching the driver's uniform
    /// buffer offset alignment.
    pub uniform_buffer_offset_alignment: u32,
    /// Maximum time to wait on a frame fence before giving up, in nanoseconds.
    pub fence_timeout_ns: u64,
    /// If `true`, passes rendering to the window backbuffer flip the
    /// vertical axis so that the engine's top-left origin is preserved.
    pub flip_default_framebuffer: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            buffering_count: 3,
            framebuffer_eviction_margin: 2,
            validation: cfg!(debug_assertions),
            max_texture_units: 32,
            uniform_buffer_offset_alignment: 256,
            fence_timeout_ns: 1_000_000_000,
            flip_default_framebuffer: true,
        }
    }
}

impl DeviceSettings {
    /// Number of frames a framebuffer may stay unused before eviction.
    pub fn framebuffer_max_age(&self) -> u64 {
        u64::from(self.buffering_count) + u64::from(self.framebuffer_eviction_margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: DeviceSettings =
            serde_json::from_str(r#"{ "buffering_count": 2, "validation": true }"#)
                .expect("valid settings json");
        assert_eq!(settings.buffering_count, 2);
        assert!(settings.validation);
        assert_eq!(settings.framebuffer_eviction_margin, 2);
        assert_eq!(settings.framebuffer_max_age(), 4);
        assert!(settings.flip_default_framebuffer);
    }
}
