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

//! Render passes: a fixed attachment list shared by ordered subpasses.

use crate::math::{LinearRgba, Rect2D};
use crate::renderer::api::format::TextureFormat;
use crate::renderer::api::resource::ImageId;

/// What happens to an attachment's content when a render pass first uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve the existing content.
    #[default]
    Load,
    /// Clear to the attachment's clear value.
    Clear,
    /// Content is undefined; the backend may discard it.
    DontCare,
}

/// What happens to an attachment's content after its last use in the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write the content back to memory.
    #[default]
    Store,
    /// Content is not needed after the pass.
    DontCare,
}

/// The clear value of an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A color clear value.
    Color(LinearRgba),
    /// A depth and stencil clear value.
    DepthStencil {
        /// The depth value.
        depth: f32,
        /// The stencil value.
        stencil: u32,
    },
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::Color(LinearRgba::TRANSPARENT)
    }
}

/// The image an attachment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentTarget {
    /// An engine image.
    Image(ImageId),
    /// The window-system backbuffer of the current swapchain.
    Backbuffer,
}

/// One attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDescriptor {
    /// The image rendered to.
    pub target: AttachmentTarget,
    /// The format of the attachment.
    pub format: TextureFormat,
    /// The array layer rendered to.
    pub layer: u32,
    /// The mip level rendered to.
    pub mip_level: u32,
    /// Load operation for color and depth.
    pub load_op: LoadOp,
    /// Store operation for color and depth.
    pub store_op: StoreOp,
    /// Load operation for stencil.
    pub stencil_load_op: LoadOp,
    /// Store operation for stencil.
    pub stencil_store_op: StoreOp,
    /// The clear value used by `LoadOp::Clear`.
    pub clear_value: ClearValue,
}

impl AttachmentDescriptor {
    /// An attachment of the given image that is loaded and stored.
    pub fn new(target: AttachmentTarget, format: TextureFormat) -> Self {
        Self {
            target,
            format,
            layer: 0,
            mip_level: 0,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            clear_value: ClearValue::default(),
        }
    }

    /// Sets the load operation and clear value.
    pub fn with_clear(mut self, clear_value: ClearValue) -> Self {
        self.load_op = LoadOp::Clear;
        self.stencil_load_op = LoadOp::Clear;
        self.clear_value = clear_value;
        self
    }

    /// Sets the store operation for all aspects.
    pub fn with_store(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self.stencil_store_op = store_op;
        self
    }
}

/// One subpass: which attachments it reads, renders to and resolves into.
///
/// All values are indices into [`RenderPassDescriptor::attachments`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubpassDescriptor {
    /// Attachments read as subpass inputs.
    pub input_attachments: Vec<u32>,
    /// Color attachments, in draw-buffer order.
    pub color_attachments: Vec<u32>,
    /// Resolve targets, parallel to `color_attachments`; empty for none.
    pub resolve_attachments: Vec<Option<u32>>,
    /// The depth/stencil attachment.
    pub depth_attachment: Option<u32>,
    /// The depth/stencil resolve target.
    pub depth_resolve_attachment: Option<u32>,
}

/// A complete render pass recorded by `BeginRenderPass`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDescriptor {
    /// The attachments of the pass.
    pub attachments: Vec<AttachmentDescriptor>,
    /// The subpasses, executed in order.
    pub subpasses: Vec<SubpassDescriptor>,
    /// The area rendered to, in attachment coordinates.
    pub render_area: Rect2D,
}

impl RenderPassDescriptor {
    /// Iterates over every attachment index a subpass references.
    pub fn subpass_references(subpass: &SubpassDescriptor) -> impl Iterator<Item = u32> + '_ {
        subpass
            .input_attachments
            .iter()
            .copied()
            .chain(subpass.color_attachments.iter().copied())
            .chain(subpass.resolve_attachments.iter().flatten().copied())
            .chain(subpass.depth_attachment)
            .chain(subpass.depth_resolve_attachment)
    }
}
