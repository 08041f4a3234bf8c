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

//! Copy and blit regions.

use crate::math::{Extent3D, Origin3D};
use crate::renderer::api::resource::ImageSubresourceLayers;

/// A region copied between two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCopy {
    /// Byte offset in the source.
    pub src_offset: u64,
    /// Byte offset in the destination.
    pub dst_offset: u64,
    /// Number of bytes.
    pub size: u64,
}

/// A region copied between a buffer and an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferImageCopy {
    /// Byte offset in the buffer.
    pub buffer_offset: u64,
    /// Row length of the buffer data in texels; `0` means tightly packed.
    pub buffer_row_length: u32,
    /// Image height of the buffer data in texels; `0` means tightly packed.
    pub buffer_image_height: u32,
    /// The image subresource.
    pub image_subresource: ImageSubresourceLayers,
    /// Texel offset in the image.
    pub image_offset: Origin3D,
    /// Size of the region in texels.
    pub image_extent: Extent3D,
}

/// A region copied between two images of the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageCopy {
    /// The source subresource.
    pub src_subresource: ImageSubresourceLayers,
    /// Texel offset in the source.
    pub src_offset: Origin3D,
    /// The destination subresource.
    pub dst_subresource: ImageSubresourceLayers,
    /// Texel offset in the destination.
    pub dst_offset: Origin3D,
    /// Size of the region in texels.
    pub extent: Extent3D,
}

/// A scaled region copied between two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBlit {
    /// The source subresource.
    pub src_subresource: ImageSubresourceLayers,
    /// Corners of the source region.
    pub src_offsets: [Origin3D; 2],
    /// The destination subresource.
    pub dst_subresource: ImageSubresourceLayers,
    /// Corners of the destination region.
    pub dst_offsets: [Origin3D; 2],
}
