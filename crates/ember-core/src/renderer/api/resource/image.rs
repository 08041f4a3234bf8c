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

use super::MemoryPropertyFlags;
use crate::math::Extent3D;
use crate::renderer::api::format::{SampleCount, TextureFormat};
use bitflags::bitflags;

/// The kind of an image, which decides the native texture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// A two-dimensional image (multisampled when `sample_count > 1`).
    D2,
    /// An array of two-dimensional images.
    D2Array,
    /// A three-dimensional (volumetric) image.
    D3,
    /// A cubemap (six faces).
    Cube,
    /// An array of cubemaps.
    CubeArray,
    /// A platform-provided image (camera, video decoder) sampled through an
    /// external sampler type. Its storage is owned by the platform.
    External,
}

bitflags! {
    /// A set of flags describing the allowed usages of an [`ImageId`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        /// The image can be the source of a copy operation.
        const TRANSFER_SRC = 1 << 0;
        /// The image can be the destination of a copy operation.
        const TRANSFER_DST = 1 << 1;
        /// The image can be sampled in a shader.
        const SAMPLED = 1 << 2;
        /// The image can be bound as a storage image.
        const STORAGE = 1 << 3;
        /// The image can be a color or resolve attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// The image can be a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        /// The image content only lives during a render pass.
        const TRANSIENT_ATTACHMENT = 1 << 6;
        /// The image can be read as a subpass input.
        const INPUT_ATTACHMENT = 1 << 7;
    }
}

/// A descriptor used to create an [`ImageId`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The kind of the image.
    pub kind: ImageKind,
    /// The format of the texels.
    pub format: TextureFormat,
    /// The dimensions of mip level 0.
    pub size: Extent3D,
    /// The number of mipmap levels.
    pub mip_level_count: u32,
    /// The number of array layers (6 per cube for cube kinds).
    pub array_layer_count: u32,
    /// The number of samples per texel.
    pub sample_count: SampleCount,
    /// A bitmask of [`ImageUsage`] flags.
    pub usage: ImageUsage,
    /// Requested memory properties.
    pub memory: MemoryPropertyFlags,
}

impl ImageDescriptor {
    /// Convenience constructor for a single-sampled 2D image with one mip and layer.
    pub fn new_2d(format: TextureFormat, width: u32, height: u32, usage: ImageUsage) -> Self {
        Self {
            label: None,
            kind: ImageKind::D2,
            format,
            size: Extent3D::new_2d(width, height),
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: SampleCount::X1,
            usage,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }

    /// Returns `true` if attachments of this image must address a layer.
    pub fn is_layered(&self) -> bool {
        matches!(
            self.kind,
            ImageKind::D2Array | ImageKind::D3 | ImageKind::CubeArray
        )
    }
}

/// An opaque handle to a GPU image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub usize);

/// A range of mip levels and array layers inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    /// The first mip level.
    pub base_mip_level: u32,
    /// The number of mip levels.
    pub mip_level_count: u32,
    /// The first array layer.
    pub base_array_layer: u32,
    /// The number of array layers.
    pub array_layer_count: u32,
}

impl Default for ImageSubresourceRange {
    fn default() -> Self {
        Self {
            base_mip_level: 0,
            mip_level_count: 1,
            base_array_layer: 0,
            array_layer_count: 1,
        }
    }
}

/// A single mip level of a range of array layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageSubresourceLayers {
    /// The mip level.
    pub mip_level: u32,
    /// The first array layer.
    pub base_array_layer: u32,
    /// The number of array layers.
    pub array_layer_count: u32,
}
