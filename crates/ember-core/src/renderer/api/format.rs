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

//! Texel, index and multisample formats.

use serde::{Deserialize, Serialize};

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    Uint32,
}

impl IndexFormat {
    /// Returns the size of one index in bytes.
    pub fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// The number of samples per pixel for Multisample Anti-Aliasing (MSAA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleCount {
    /// 1 sample per pixel (MSAA disabled).
    #[default]
    X1,
    /// 2 samples per pixel.
    X2,
    /// 4 samples per pixel.
    X4,
    /// 8 samples per pixel.
    X8,
    /// 16 samples per pixel.
    X16,
}

impl SampleCount {
    /// Returns the sample count as an integer.
    pub fn count(&self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
        }
    }
}

/// Defines the memory format of texels in an image.
///
/// The declaration order is the lookup key of the backend format tables and
/// must not be reordered casually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureFormat {
    // 8-bit formats
    /// One 8-bit unsigned normalized component.
    R8Unorm,
    /// Two 8-bit unsigned normalized components.
    Rg8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA).
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized components (RGBA) in the sRGB color space.
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned normalized components (BGRA).
    Bgra8Unorm,
    /// Four 8-bit unsigned integer components.
    Rgba8Uint,
    // 16-bit formats
    /// One 16-bit float component.
    R16Float,
    /// Two 16-bit float components.
    Rg16Float,
    /// Four 16-bit float components.
    Rgba16Float,
    // 32-bit formats
    /// One 32-bit unsigned integer component.
    R32Uint,
    /// One 32-bit float component.
    R32Float,
    /// Two 32-bit float components.
    Rg32Float,
    /// Four 32-bit float components.
    Rgba32Float,
    // Packed formats
    /// 10-bit RGB with 2-bit alpha, unsigned normalized.
    Rgb10a2Unorm,
    /// Packed 11/11/10-bit unsigned floats.
    Rg11b10Float,
    // Depth/stencil formats
    /// A 16-bit unsigned normalized depth format.
    Depth16Unorm,
    /// A 24-bit unsigned normalized depth format.
    Depth24Plus,
    /// A 24-bit unsigned normalized depth format with an 8-bit stencil component.
    Depth24PlusStencil8,
    /// A 32-bit float depth format.
    Depth32Float,
    /// A 32-bit float depth format with an 8-bit stencil component.
    Depth32FloatStencil8,
    // Compressed formats
    /// ETC2 RGB, 4x4 blocks.
    Etc2Rgb8Unorm,
    /// ETC2 RGBA with EAC alpha, 4x4 blocks.
    Etc2Rgba8Unorm,
    /// ASTC LDR, 4x4 blocks.
    Astc4x4Unorm,
    /// BC1 (DXT1) RGBA, 4x4 blocks.
    Bc1RgbaUnorm,
    /// BC3 (DXT5) RGBA, 4x4 blocks.
    Bc3RgbaUnorm,
}

impl TextureFormat {
    /// Returns the size in bytes of a single texel, or of a single block for
    /// compressed formats.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Rgba8Uint => 4,
            TextureFormat::R16Float => 2,
            TextureFormat::Rg16Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::R32Uint | TextureFormat::R32Float => 4,
            TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Rgb10a2Unorm | TextureFormat::Rg11b10Float => 4,
            TextureFormat::Depth16Unorm => 2,
            TextureFormat::Depth24Plus => 4,
            TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Depth32Float => 4,
            TextureFormat::Depth32FloatStencil8 => 8,
            TextureFormat::Etc2Rgb8Unorm | TextureFormat::Bc1RgbaUnorm => 8,
            TextureFormat::Etc2Rgba8Unorm
            | TextureFormat::Astc4x4Unorm
            | TextureFormat::Bc3RgbaUnorm => 16,
        }
    }

    /// Returns `true` if the format has a depth aspect.
    pub fn has_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32Float
                | TextureFormat::Depth32FloatStencil8
        )
    }

    /// Returns `true` if the format has a stencil aspect.
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32FloatStencil8
        )
    }

    /// Returns `true` for block-compressed formats.
    pub fn is_compressed(&self) -> bool {
        matches!(
            self,
            TextureFormat::Etc2Rgb8Unorm
                | TextureFormat::Etc2Rgba8Unorm
                | TextureFormat::Astc4x4Unorm
                | TextureFormat::Bc1RgbaUnorm
                | TextureFormat::Bc3RgbaUnorm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_stencil_aspects() {
        assert!(TextureFormat::Depth24PlusStencil8.has_depth());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(TextureFormat::Depth32Float.has_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.has_depth());
    }

    #[test]
    fn compressed_formats_report_block_size() {
        assert!(TextureFormat::Astc4x4Unorm.is_compressed());
        assert_eq!(TextureFormat::Bc1RgbaUnorm.bytes_per_pixel(), 8);
        assert!(!TextureFormat::Rg11b10Float.is_compressed());
    }
}
