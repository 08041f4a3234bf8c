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

//! GPU resource handles and their creation descriptors.

mod buffer;
mod image;
mod sampler;
mod swapchain;

pub use self::buffer::*;
pub use self::image::*;
pub use self::sampler::*;
pub use self::swapchain::*;

use bitflags::bitflags;

bitflags! {
    /// Memory properties requested for a resource.
    ///
    /// The legacy API does not expose memory heaps; these flags only select
    /// usage hints and whether the resource may be written from the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryPropertyFlags: u32 {
        /// Memory local to the device.
        const DEVICE_LOCAL = 1 << 0;
        /// Memory the host can write or read.
        const HOST_VISIBLE = 1 << 1;
        /// Host writes are visible without explicit flushes.
        const HOST_COHERENT = 1 << 2;
        /// Host reads are cached.
        const HOST_CACHED = 1 << 3;
        /// Memory may be lazily allocated (transient attachments).
        const LAZILY_ALLOCATED = 1 << 4;
    }
}

/// An opaque handle to a semaphore, used to order submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemaphoreId(pub usize);
