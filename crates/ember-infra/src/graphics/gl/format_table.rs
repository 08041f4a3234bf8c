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

//! Static capability table of texture formats.
//!
//! One row per [`TextureFormat`], sorted by the enum discriminant so lookups
//! are a binary search.

use super::native::{GlExtensions, GlVersion};
use ember_core::renderer::TextureFormat;

const COMPRESSED_RGB8_ETC2: u32 = 0x9274;
const COMPRESSED_RGBA8_ETC2_EAC: u32 = 0x9278;
const COMPRESSED_RGBA_ASTC_4X4: u32 = 0x93B0;
const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;

/// What a context needs to support a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRequirement {
    /// Core in OpenGL 4.3 and OpenGL ES 3.1.
    Core,
    /// `GL_EXT_texture_format_BGRA8888` on OpenGL ES.
    Bgra8888,
    /// `GL_EXT_texture_compression_s3tc`.
    S3tc,
    /// `GL_KHR_texture_compression_astc_ldr`.
    AstcLdr,
}

/// How the clear value of a color attachment must be specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearKind {
    /// Normalized or float color.
    Float,
    /// Signed integer color.
    Int,
    /// Unsigned integer color.
    UInt,
    /// Depth and/or stencil.
    DepthStencil,
}

/// Native description of one texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// The engine format.
    pub format: TextureFormat,
    /// The sized internal format used for storage.
    pub internal_format: u32,
    /// The pixel transfer format.
    pub external_format: u32,
    /// The pixel transfer type.
    pub data_type: u32,
    /// Support requirement.
    pub requirement: FormatRequirement,
}

const fn row(
    format: TextureFormat,
    internal_format: u32,
    external_format: u32,
    data_type: u32,
    requirement: FormatRequirement,
) -> FormatInfo {
    FormatInfo {
        format,
        internal_format,
        external_format,
        data_type,
        requirement,
    }
}

use FormatRequirement::{AstcLdr, Bgra8888, Core, S3tc};

static FORMATS: [FormatInfo; 25] = [
    row(TextureFormat::R8Unorm, glow::R8, glow::RED, glow::UNSIGNED_BYTE, Core),
    row(TextureFormat::Rg8Unorm, glow::RG8, glow::RG, glow::UNSIGNED_BYTE, Core),
    row(TextureFormat::Rgba8Unorm, glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE, Core),
    row(TextureFormat::Rgba8UnormSrgb, glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE, Core),
    row(TextureFormat::Bgra8Unorm, glow::RGBA8, glow::BGRA, glow::UNSIGNED_BYTE, Bgra8888),
    row(TextureFormat::Rgba8Uint, glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE, Core),
    row(TextureFormat::R16Float, glow::R16F, glow::RED, glow::HALF_FLOAT, Core),
    row(TextureFormat::Rg16Float, glow::RG16F, glow::RG, glow::HALF_FLOAT, Core),
    row(TextureFormat::Rgba16Float, glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT, Core),
    row(TextureFormat::R32Uint, glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT, Core),
    row(TextureFormat::R32Float, glow::R32F, glow::RED, glow::FLOAT, Core),
    row(TextureFormat::Rg32Float, glow::RG32F, glow::RG, glow::FLOAT, Core),
    row(TextureFormat::Rgba32Float, glow::RGBA32F, glow::RGBA, glow::FLOAT, Core),
    row(TextureFormat::Rgb10a2Unorm, glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV, Core),
    row(TextureFormat::Rg11b10Float, glow::R11F_G11F_B10F, glow::RGB, glow::UNSIGNED_INT_10F_11F_11F_REV, Core),
    row(TextureFormat::Depth16Unorm, glow::DEPTH_COMPONENT16, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT, Core),
    row(TextureFormat::Depth24Plus, glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT, glow::UNSIGNED_INT, Core),
    row(TextureFormat::Depth24PlusStencil8, glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8, Core),
    row(TextureFormat::Depth32Float, glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT, Core),
    row(TextureFormat::Depth32FloatStencil8, glow::DEPTH32F_STENCIL8, glow::DEPTH_STENCIL, glow::FLOAT_32_UNSIGNED_INT_24_8_REV, Core),
    row(TextureFormat::Etc2Rgb8Unorm, COMPRESSED_RGB8_ETC2, COMPRESSED_RGB8_ETC2, 0, Core),
    row(TextureFormat::Etc2Rgba8Unorm, COMPRESSED_RGBA8_ETC2_EAC, COMPRESSED_RGBA8_ETC2_EAC, 0, Core),
    row(TextureFormat::Astc4x4Unorm, COMPRESSED_RGBA_ASTC_4X4, COMPRESSED_RGBA_ASTC_4X4, 0, AstcLdr),
    row(TextureFormat::Bc1RgbaUnorm, COMPRESSED_RGBA_S3TC_DXT1, COMPRESSED_RGBA_S3TC_DXT1, 0, S3tc),
    row(TextureFormat::Bc3RgbaUnorm, COMPRESSED_RGBA_S3TC_DXT5, COMPRESSED_RGBA_S3TC_DXT5, 0, S3tc),
];

/// Looks up the native description of `format`.
pub fn lookup(format: TextureFormat) -> Option<&'static FormatInfo> {
    FORMATS
        .binary_search_by_key(&(format as u32), |row| row.format as u32)
        .ok()
        .map(|index| &FORMATS[index])
}

impl FormatInfo {
    /// Returns `true` if a context with `version` and `extensions` can
    /// create textures of this format.
    pub fn is_supported(&self, version: GlVersion, extensions: &GlExtensions) -> bool {
        match self.requirement {
            FormatRequirement::Core => true,
            FormatRequirement::Bgra8888 => {
                !version.is_embedded || extensions.ext_texture_format_bgra8888
            }
            FormatRequirement::S3tc => extensions.ext_texture_compression_s3tc,
            FormatRequirement::AstcLdr => extensions.khr_texture_compression_astc_ldr,
        }
    }

    /// The framebuffer attachment point for this format.
    ///
    /// ## Arguments
    /// * `color_index` - The draw-buffer index used for color formats.
    pub fn attachment_point(&self, color_index: u32) -> u32 {
        if self.format.has_stencil() {
            glow::DEPTH_STENCIL_ATTACHMENT
        } else if self.format.has_depth() {
            glow::DEPTH_ATTACHMENT
        } else {
            glow::COLOR_ATTACHMENT0 + color_index
        }
    }

    /// The buffer bits covering this format in blits and clears.
    pub fn buffer_mask(&self) -> u32 {
        let mut mask = 0;
        if self.format.has_depth() {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if self.format.has_stencil() {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        if mask == 0 {
            mask = glow::COLOR_BUFFER_BIT;
        }
        mask
    }

    /// How color clears of this format are specified.
    pub fn clear_kind(&self) -> ClearKind {
        if self.format.has_depth() {
            return ClearKind::DepthStencil;
        }
        match self.external_format {
            glow::RED_INTEGER | glow::RG_INTEGER | glow::RGBA_INTEGER => ClearKind::UInt,
            _ => ClearKind::Float,
        }
    }

    /// Returns `true` if pixel data can be transferred with
    /// `external_format` and `data_type`.
    pub fn is_transferable(&self) -> bool {
        !self.format.is_compressed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_complete() {
        for (index, row) in FORMATS.iter().enumerate() {
            assert_eq!(
                row.format as usize, index,
                "row {index} is out of order: {:?}",
                row.format
            );
        }
        assert_eq!(
            lookup(TextureFormat::Depth24PlusStencil8).map(|f| f.internal_format),
            Some(glow::DEPTH24_STENCIL8)
        );
    }

    #[test]
    fn extension_gated_formats() {
        let es = GlVersion {
            major: 3,
            minor: 1,
            is_embedded: true,
        };
        let none = GlExtensions::default();
        let astc = lookup(TextureFormat::Astc4x4Unorm).unwrap();
        let bgra = lookup(TextureFormat::Bgra8Unorm).unwrap();
        let rgba = lookup(TextureFormat::Rgba8Unorm).unwrap();
        assert!(!astc.is_supported(es, &none));
        assert!(!bgra.is_supported(es, &none));
        assert!(rgba.is_supported(es, &none));
        assert!(astc.is_supported(es, &GlExtensions::all()));
    }

    #[test]
    fn attachment_points_by_aspect() {
        let depth_stencil = lookup(TextureFormat::Depth32FloatStencil8).unwrap();
        let depth = lookup(TextureFormat::Depth16Unorm).unwrap();
        let color = lookup(TextureFormat::Rgba16Float).unwrap();
        assert_eq!(depth_stencil.attachment_point(0), glow::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(depth.attachment_point(0), glow::DEPTH_ATTACHMENT);
        assert_eq!(color.attachment_point(2), glow::COLOR_ATTACHMENT0 + 2);
        assert_eq!(
            depth_stencil.buffer_mask(),
            glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT
        );
    }
}
