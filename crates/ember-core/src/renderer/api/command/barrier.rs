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

//! Synchronization declarations carried by `BarrierPoint` commands.

use crate::renderer::api::resource::{BufferId, ImageId};
use bitflags::bitflags;

bitflags! {
    /// Kinds of memory access performed by a pipeline stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// Indirect draw/dispatch argument reads.
        const INDIRECT_COMMAND_READ = 1 << 0;
        /// Index buffer reads.
        const INDEX_READ = 1 << 1;
        /// Vertex buffer reads.
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        /// Uniform buffer reads.
        const UNIFORM_READ = 1 << 3;
        /// Subpass input reads.
        const INPUT_ATTACHMENT_READ = 1 << 4;
        /// Sampled image or storage reads from shaders.
        const SHADER_READ = 1 << 5;
        /// Storage buffer or image writes from shaders.
        const SHADER_WRITE = 1 << 6;
        /// Color attachment reads (blending).
        const COLOR_ATTACHMENT_READ = 1 << 7;
        /// Color attachment writes.
        const COLOR_ATTACHMENT_WRITE = 1 << 8;
        /// Depth/stencil attachment reads.
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 9;
        /// Depth/stencil attachment writes.
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 10;
        /// Copy source reads.
        const TRANSFER_READ = 1 << 11;
        /// Copy destination writes.
        const TRANSFER_WRITE = 1 << 12;
        /// Host reads of mapped memory.
        const HOST_READ = 1 << 13;
        /// Host writes of mapped memory.
        const HOST_WRITE = 1 << 14;
        /// Any read.
        const MEMORY_READ = 1 << 15;
        /// Any write.
        const MEMORY_WRITE = 1 << 16;
    }
}

bitflags! {
    /// Pipeline stages on either side of a barrier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStageFlags: u32 {
        /// Start of the pipeline.
        const TOP_OF_PIPE = 1 << 0;
        /// Indirect argument consumption.
        const DRAW_INDIRECT = 1 << 1;
        /// Vertex and index fetch.
        const VERTEX_INPUT = 1 << 2;
        /// Vertex shading.
        const VERTEX_SHADER = 1 << 3;
        /// Fragment shading.
        const FRAGMENT_SHADER = 1 << 4;
        /// Early depth/stencil tests.
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        /// Late depth/stencil tests.
        const LATE_FRAGMENT_TESTS = 1 << 6;
        /// Blending and color output.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        /// Compute shading.
        const COMPUTE_SHADER = 1 << 8;
        /// Copies, blits and clears.
        const TRANSFER = 1 << 9;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 10;
        /// Host access.
        const HOST = 1 << 11;
        /// Every graphics stage.
        const ALL_GRAPHICS = 1 << 12;
        /// Every stage.
        const ALL_COMMANDS = 1 << 13;
    }
}

impl PipelineStageFlags {
    /// The stages that run per fragment and can be synchronized by region.
    pub const FRAGMENT_ONLY: Self = Self::FRAGMENT_SHADER
        .union(Self::EARLY_FRAGMENT_TESTS)
        .union(Self::LATE_FRAGMENT_TESTS)
        .union(Self::COLOR_ATTACHMENT_OUTPUT);
}

/// A global memory dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryBarrier {
    /// Accesses that must complete.
    pub src_access: AccessFlags,
    /// Accesses that must see the results.
    pub dst_access: AccessFlags,
}

/// A dependency on one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBarrier {
    /// The buffer.
    pub buffer: BufferId,
    /// Accesses that must complete.
    pub src_access: AccessFlags,
    /// Accesses that must see the results.
    pub dst_access: AccessFlags,
}

/// A dependency on one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBarrier {
    /// The image.
    pub image: ImageId,
    /// Accesses that must complete.
    pub src_access: AccessFlags,
    /// Accesses that must see the results.
    pub dst_access: AccessFlags,
}

/// A synchronization point between earlier and later commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BarrierPoint {
    /// Stages producing the data.
    pub src_stage: PipelineStageFlags,
    /// Stages consuming the data.
    pub dst_stage: PipelineStageFlags,
    /// Global dependencies.
    pub memory_barriers: Vec<MemoryBarrier>,
    /// Buffer dependencies.
    pub buffer_barriers: Vec<BufferBarrier>,
    /// Image dependencies.
    pub image_barriers: Vec<ImageBarrier>,
}
