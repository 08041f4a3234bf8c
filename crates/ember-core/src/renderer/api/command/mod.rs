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

//! The recorded command stream.
//!
//! A [`CommandList`] is a flat, ordered sequence of [`Command`] records. The
//! backend executes them strictly in order; a command that is not legal in
//! the current state (a draw without a render pipeline, a dispatch inside a
//! pass whose framebuffer could not be built) is skipped, never fatal.

mod barrier;
mod copy;

pub use self::barrier::*;
pub use self::copy::*;

use crate::math::{LinearRgba, Rect2D};
use crate::renderer::api::descriptor::DescriptorSetData;
use crate::renderer::api::format::IndexFormat;
use crate::renderer::api::pipeline::PipelineBinding;
use crate::renderer::api::render_pass::RenderPassDescriptor;
use crate::renderer::api::resource::{
    BufferId, FilterMode, ImageId, ImageSubresourceRange, SemaphoreId,
};
use bitflags::bitflags;

/// A viewport transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering the given rectangle with the full depth range.
    pub fn from_rect(rect: Rect2D) -> Self {
        Self {
            x: rect.offset.x as f32,
            y: rect.offset.y as f32,
            width: rect.extent.width as f32,
            height: rect.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

bitflags! {
    /// The faces a dynamic stencil command applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StencilFaceFlags: u8 {
        /// Front faces.
        const FRONT = 1 << 0;
        /// Back faces.
        const BACK = 1 << 1;
        /// Both faces.
        const FRONT_AND_BACK = Self::FRONT.bits() | Self::BACK.bits();
    }
}

/// A vertex buffer bound to one binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferBinding {
    /// The buffer.
    pub buffer: BufferId,
    /// Byte offset of the first vertex.
    pub offset: u64,
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Opens a render pass and enters subpass 0.
    BeginRenderPass(RenderPassDescriptor),
    /// Ends the current subpass and enters the next one.
    NextSubpass,
    /// Ends the current subpass and the render pass.
    EndRenderPass,
    /// Selects the pipeline used by following draws or dispatches.
    BindPipeline(PipelineBinding),
    /// Binds vertex buffers starting at `first_binding`.
    BindVertexBuffers {
        /// The first binding slot.
        first_binding: u32,
        /// The buffers, in slot order.
        buffers: Vec<VertexBufferBinding>,
    },
    /// Binds the index buffer.
    BindIndexBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Byte offset of the first index.
        offset: u64,
        /// The index type.
        format: IndexFormat,
    },
    /// Records the resources of consecutive descriptor sets.
    BindDescriptorSets {
        /// The index of the first set.
        first_set: u32,
        /// The sets, starting at `first_set`.
        sets: Vec<DescriptorSetData>,
        /// Offsets for dynamic buffers, in set then binding order.
        dynamic_offsets: Vec<u32>,
    },
    /// Updates a byte range of the push-constant block.
    PushConstants {
        /// Byte offset in the block.
        offset: u32,
        /// The bytes to write.
        data: Vec<u8>,
    },
    /// Draws non-indexed primitives.
    Draw {
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// Index of the first vertex.
        first_vertex: u32,
        /// Index of the first instance.
        first_instance: u32,
    },
    /// Draws indexed primitives.
    DrawIndexed {
        /// Number of indices.
        index_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// Index of the first index.
        first_index: u32,
        /// Value added to each index.
        vertex_offset: i32,
        /// Index of the first instance.
        first_instance: u32,
    },
    /// Draws with arguments read from a buffer.
    DrawIndirect {
        /// The argument buffer.
        buffer: BufferId,
        /// Byte offset of the first argument record.
        offset: u64,
        /// Number of draws.
        draw_count: u32,
        /// Byte distance between argument records.
        stride: u32,
        /// If `true`, arguments are indexed draw records.
        indexed: bool,
    },
    /// Dispatches compute work groups.
    Dispatch {
        /// Work groups in X.
        x: u32,
        /// Work groups in Y.
        y: u32,
        /// Work groups in Z.
        z: u32,
    },
    /// Dispatches with group counts read from a buffer.
    DispatchIndirect {
        /// The argument buffer.
        buffer: BufferId,
        /// Byte offset of the arguments.
        offset: u64,
    },
    /// Copies regions between buffers.
    CopyBuffer {
        /// Source buffer.
        src: BufferId,
        /// Destination buffer.
        dst: BufferId,
        /// Regions to copy.
        regions: Vec<BufferCopy>,
    },
    /// Copies buffer data into an image.
    CopyBufferToImage {
        /// Source buffer.
        src: BufferId,
        /// Destination image.
        dst: ImageId,
        /// Regions to copy.
        regions: Vec<BufferImageCopy>,
    },
    /// Copies image data into a buffer.
    CopyImageToBuffer {
        /// Source image.
        src: ImageId,
        /// Destination buffer.
        dst: BufferId,
        /// Regions to copy.
        regions: Vec<BufferImageCopy>,
    },
    /// Copies regions between images of matching formats.
    CopyImage {
        /// Source image.
        src: ImageId,
        /// Destination image.
        dst: ImageId,
        /// Regions to copy.
        regions: Vec<ImageCopy>,
    },
    /// Copies scaled regions between images.
    BlitImage {
        /// Source image.
        src: ImageId,
        /// Destination image.
        dst: ImageId,
        /// Regions to copy.
        regions: Vec<ImageBlit>,
        /// Filter used when scaling.
        filter: FilterMode,
    },
    /// Makes earlier writes visible to later accesses.
    BarrierPoint(BarrierPoint),
    /// Clears color images outside of a render pass.
    ClearColorImage {
        /// The image.
        image: ImageId,
        /// The clear color.
        color: LinearRgba,
        /// The subresources to clear.
        range: ImageSubresourceRange,
    },
    /// Clears depth/stencil images outside of a render pass.
    ClearDepthStencilImage {
        /// The image.
        image: ImageId,
        /// The depth value.
        depth: f32,
        /// The stencil value.
        stencil: u32,
        /// The subresources to clear.
        range: ImageSubresourceRange,
    },
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets the scissor rectangle.
    SetScissor(Rect2D),
    /// Sets the line width.
    SetLineWidth(f32),
    /// Sets the stencil compare mask.
    SetStencilCompareMask {
        /// Faces affected.
        faces: StencilFaceFlags,
        /// The mask.
        mask: u32,
    },
    /// Sets the stencil write mask.
    SetStencilWriteMask {
        /// Faces affected.
        faces: StencilFaceFlags,
        /// The mask.
        mask: u32,
    },
    /// Sets the stencil reference value.
    SetStencilReference {
        /// Faces affected.
        faces: StencilFaceFlags,
        /// The reference.
        reference: u32,
    },
    /// Sets the blend constant color.
    SetBlendConstants(LinearRgba),
}

/// A submission: commands plus the semaphores ordering it against others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    /// The commands, executed in order.
    pub commands: Vec<Command>,
    /// Semaphores that must be signaled before execution starts.
    pub wait_semaphores: Vec<SemaphoreId>,
    /// Semaphores signaled once all commands are submitted.
    pub signal_semaphores: Vec<SemaphoreId>,
}

impl CommandList {
    /// Creates a list from commands with no semaphores.
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            commands,
            ..Default::default()
        }
    }
}
