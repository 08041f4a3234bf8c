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

use super::native::TEXTURE_EXTERNAL_OES;
use ember_core::math::Rect2D;
use ember_core::renderer::{
    AddressMode, BlendFactor, BlendOperation, ColorWrites, CompareFunction, CullMode,
    DescriptorType, FilterMode, FrontFace, ImageKind, IndexFormat, PrimitiveTopology,
    SampleCount, StencilOperation, StorageAccess, VertexFormat,
};

/// A local extension trait to convert the engine's types into OpenGL enums.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_gl()` syntax.
pub trait IntoGl<T> {
    /// Consumes self and converts it into its OpenGL representation.
    fn into_gl(self) -> T;
}

// --- Pipeline state ---

impl IntoGl<u32> for CompareFunction {
    fn into_gl(self) -> u32 {
        match self {
            CompareFunction::Never => glow::NEVER,
            CompareFunction::Less => glow::LESS,
            CompareFunction::Equal => glow::EQUAL,
            CompareFunction::LessEqual => glow::LEQUAL,
            CompareFunction::Greater => glow::GREATER,
            CompareFunction::NotEqual => glow::NOTEQUAL,
            CompareFunction::GreaterEqual => glow::GEQUAL,
            CompareFunction::Always => glow::ALWAYS,
        }
    }
}

impl IntoGl<u32> for StencilOperation {
    fn into_gl(self) -> u32 {
        match self {
            StencilOperation::Keep => glow::KEEP,
            StencilOperation::Zero => glow::ZERO,
            StencilOperation::Replace => glow::REPLACE,
            StencilOperation::Invert => glow::INVERT,
            StencilOperation::IncrementClamp => glow::INCR,
            StencilOperation::DecrementClamp => glow::DECR,
            StencilOperation::IncrementWrap => glow::INCR_WRAP,
            StencilOperation::DecrementWrap => glow::DECR_WRAP,
        }
    }
}

impl IntoGl<u32> for BlendFactor {
    fn into_gl(self) -> u32 {
        match self {
            BlendFactor::Zero => glow::ZERO,
            BlendFactor::One => glow::ONE,
            BlendFactor::SrcColor => glow::SRC_COLOR,
            BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
            BlendFactor::SrcAlpha => glow::SRC_ALPHA,
            BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DstColor => glow::DST_COLOR,
            BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
            BlendFactor::DstAlpha => glow::DST_ALPHA,
            BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
            BlendFactor::Constant => glow::CONSTANT_COLOR,
            BlendFactor::OneMinusConstant => glow::ONE_MINUS_CONSTANT_COLOR,
            BlendFactor::SrcAlphaSaturated => glow::SRC_ALPHA_SATURATE,
        }
    }
}

impl IntoGl<u32> for BlendOperation {
    fn into_gl(self) -> u32 {
        match self {
            BlendOperation::Add => glow::FUNC_ADD,
            BlendOperation::Subtract => glow::FUNC_SUBTRACT,
            BlendOperation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
            BlendOperation::Min => glow::MIN,
            BlendOperation::Max => glow::MAX,
        }
    }
}

impl IntoGl<u32> for PrimitiveTopology {
    fn into_gl(self) -> u32 {
        match self {
            PrimitiveTopology::PointList => glow::POINTS,
            PrimitiveTopology::LineList => glow::LINES,
            PrimitiveTopology::LineStrip => glow::LINE_STRIP,
            PrimitiveTopology::TriangleList => glow::TRIANGLES,
            PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
            PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
        }
    }
}

impl IntoGl<u32> for FrontFace {
    fn into_gl(self) -> u32 {
        match self {
            FrontFace::Ccw => glow::CCW,
            FrontFace::Cw => glow::CW,
        }
    }
}

impl IntoGl<Option<u32>> for CullMode {
    fn into_gl(self) -> Option<u32> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(glow::FRONT),
            CullMode::Back => Some(glow::BACK),
            CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
        }
    }
}

impl IntoGl<[bool; 4]> for ColorWrites {
    fn into_gl(self) -> [bool; 4] {
        [
            self.contains(ColorWrites::R),
            self.contains(ColorWrites::G),
            self.contains(ColorWrites::B),
            self.contains(ColorWrites::A),
        ]
    }
}

impl IntoGl<u32> for IndexFormat {
    fn into_gl(self) -> u32 {
        match self {
            IndexFormat::Uint16 => glow::UNSIGNED_SHORT,
            IndexFormat::Uint32 => glow::UNSIGNED_INT,
        }
    }
}

/// The arguments of `glVertexAttrib{I}Format` for one vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribFormat {
    /// Component count.
    pub size: i32,
    /// Component type.
    pub data_type: u32,
    /// Fixed-point data is normalized to `[0, 1]` or `[-1, 1]`.
    pub normalized: bool,
    /// The shader reads integers, so `glVertexAttribIFormat` applies.
    pub integer: bool,
}

impl IntoGl<VertexAttribFormat> for VertexFormat {
    fn into_gl(self) -> VertexAttribFormat {
        let (data_type, normalized, integer) = match self {
            VertexFormat::Uint8x4 => (glow::UNSIGNED_BYTE, false, true),
            VertexFormat::Unorm8x4 => (glow::UNSIGNED_BYTE, true, false),
            VertexFormat::Snorm8x4 => (glow::BYTE, true, false),
            VertexFormat::Uint16x2 => (glow::UNSIGNED_SHORT, false, true),
            VertexFormat::Sint16x2 => (glow::SHORT, false, true),
            VertexFormat::Unorm16x2 => (glow::UNSIGNED_SHORT, true, false),
            VertexFormat::Snorm16x2 => (glow::SHORT, true, false),
            VertexFormat::Float16x2 | VertexFormat::Float16x4 => (glow::HALF_FLOAT, false, false),
            VertexFormat::Float32
            | VertexFormat::Float32x2
            | VertexFormat::Float32x3
            | VertexFormat::Float32x4 => (glow::FLOAT, false, false),
            VertexFormat::Uint32 | VertexFormat::Uint32x4 => (glow::UNSIGNED_INT, false, true),
            VertexFormat::Sint32 | VertexFormat::Sint32x4 => (glow::INT, false, true),
        };
        VertexAttribFormat {
            size: self.components() as i32,
            data_type,
            normalized,
            integer,
        }
    }
}

// --- Resources ---

impl IntoGl<i32> for AddressMode {
    fn into_gl(self) -> i32 {
        (match self {
            AddressMode::Repeat => glow::REPEAT,
            AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            AddressMode::MirrorRepeat => glow::MIRRORED_REPEAT,
            AddressMode::ClampToBorder => glow::CLAMP_TO_BORDER,
        }) as i32
    }
}

impl IntoGl<u32> for StorageAccess {
    fn into_gl(self) -> u32 {
        match self {
            StorageAccess::ReadOnly => glow::READ_ONLY,
            StorageAccess::WriteOnly => glow::WRITE_ONLY,
            StorageAccess::ReadWrite => glow::READ_WRITE,
        }
    }
}

/// The `GL_TEXTURE_MIN_FILTER` value for a minification and mipmap filter.
pub fn min_filter(min: FilterMode, mipmap: FilterMode) -> i32 {
    (match (min, mipmap) {
        (FilterMode::Nearest, FilterMode::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Nearest, FilterMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, FilterMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Linear, FilterMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

impl IntoGl<u32> for FilterMode {
    fn into_gl(self) -> u32 {
        match self {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        }
    }
}

/// The texture target of an image of `kind` with `samples` samples.
pub fn texture_target(kind: ImageKind, samples: SampleCount) -> u32 {
    let multisampled = samples.count() > 1;
    match kind {
        ImageKind::D2 if multisampled => glow::TEXTURE_2D_MULTISAMPLE,
        ImageKind::D2 => glow::TEXTURE_2D,
        ImageKind::D2Array if multisampled => glow::TEXTURE_2D_MULTISAMPLE_ARRAY,
        ImageKind::D2Array => glow::TEXTURE_2D_ARRAY,
        ImageKind::D3 => glow::TEXTURE_3D,
        ImageKind::Cube => glow::TEXTURE_CUBE_MAP,
        ImageKind::CubeArray => glow::TEXTURE_CUBE_MAP_ARRAY,
        ImageKind::External => TEXTURE_EXTERNAL_OES,
    }
}

/// The indexed binding target used by a buffer descriptor type.
pub fn buffer_binding_target(ty: DescriptorType) -> Option<u32> {
    match ty {
        DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic => {
            Some(glow::UNIFORM_BUFFER)
        }
        DescriptorType::StorageBuffer | DescriptorType::StorageBufferDynamic => {
            Some(glow::SHADER_STORAGE_BUFFER)
        }
        _ => None,
    }
}

// --- Geometry ---

impl IntoGl<[i32; 4]> for Rect2D {
    fn into_gl(self) -> [i32; 4] {
        [
            self.offset.x,
            self.offset.y,
            self.extent.width as i32,
            self.extent.height as i32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_vertex_formats_use_integer_path() {
        let format: VertexAttribFormat = VertexFormat::Uint32x4.into_gl();
        assert!(format.integer);
        assert_eq!(format.size, 4);
        let format: VertexAttribFormat = VertexFormat::Unorm8x4.into_gl();
        assert!(format.normalized && !format.integer);
    }

    #[test]
    fn multisampled_targets() {
        assert_eq!(
            texture_target(ImageKind::D2, SampleCount::X4),
            glow::TEXTURE_2D_MULTISAMPLE
        );
        assert_eq!(texture_target(ImageKind::D2, SampleCount::X1), glow::TEXTURE_2D);
        assert_eq!(
            texture_target(ImageKind::External, SampleCount::X1),
            TEXTURE_EXTERNAL_OES
        );
    }

    #[test]
    fn color_writes_to_mask() {
        let mask: [bool; 4] = (ColorWrites::R | ColorWrites::A).into_gl();
        assert_eq!(mask, [true, false, false, true]);
    }
}
