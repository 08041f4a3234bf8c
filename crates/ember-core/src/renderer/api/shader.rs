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

//! Shader module inputs.
//!
//! A shader module is textual source produced by an external
//! cross-compilation step, together with a reflection table describing
//! every resource the source declares and the `(set, binding)` it came from.

use std::fmt;

/// Defines the programmable stage a shader module is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The fragment (or pixel) shader stage.
    Fragment,
    /// The compute shader stage.
    Compute,
}

impl ShaderStage {
    /// Every stage, in cache slot order.
    pub const ALL: [ShaderStage; 3] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// Returns the stage's slot index (vertex 0, fragment 1, compute 2).
    pub fn index(&self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
            ShaderStage::Compute => 2,
        }
    }
}

/// A resource declared by the shader source, bound through `(set, binding)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderResource {
    /// The identifier used in the source (block name for buffers).
    pub name: String,
    /// The descriptor set index.
    pub set: u32,
    /// The binding index inside the set.
    pub binding: u32,
    /// Number of array elements; `1` for non-arrays.
    pub array_size: u32,
}

impl ShaderResource {
    /// Convenience constructor for a non-array resource.
    pub fn new(name: impl Into<String>, set: u32, binding: u32) -> Self {
        Self {
            name: name.into(),
            set,
            binding,
            array_size: 1,
        }
    }

    /// Sets the array size.
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }
}

/// A subpass input, emulated as a sampled texture read with `texelFetch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubpassInputResource {
    /// The declared resource.
    pub resource: ShaderResource,
    /// The `input_attachment_index` of the declaration.
    pub input_attachment_index: u32,
}

/// A combined sampler synthesized from a separate image and a separate
/// sampler that the source uses together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinedSamplerPair {
    /// Name of the synthesized combined sampler uniform in the source.
    pub name: String,
    /// `(set, binding)` of the image.
    pub image: (u32, u32),
    /// `(set, binding)` of the sampler.
    pub sampler: (u32, u32),
    /// Number of array elements of the image binding.
    pub array_size: u32,
}

/// The GLSL type of a push constant member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushConstantType {
    /// `float`
    Float,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `int`
    Int,
    /// `ivec2`
    IVec2,
    /// `ivec3`
    IVec3,
    /// `ivec4`
    IVec4,
    /// `uint`
    UInt,
    /// `uvec4`
    UVec4,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
}

impl PushConstantType {
    /// Returns the number of 32-bit scalar components of one element.
    pub fn components(&self) -> u32 {
        match self {
            PushConstantType::Float | PushConstantType::Int | PushConstantType::UInt => 1,
            PushConstantType::Vec2 | PushConstantType::IVec2 => 2,
            PushConstantType::Vec3 | PushConstantType::IVec3 => 3,
            PushConstantType::Vec4 | PushConstantType::IVec4 | PushConstantType::UVec4 => 4,
            PushConstantType::Mat3 => 9,
            PushConstantType::Mat4 => 16,
        }
    }
}

/// A push constant member, emulated as a plain uniform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushConstantReflection {
    /// Name of the uniform in the source.
    pub name: String,
    /// Byte offset inside the push-constant block.
    pub offset: u32,
    /// Size in bytes (all array elements).
    pub size: u32,
    /// Element type.
    pub ty: PushConstantType,
}

/// Reflection metadata for one shader module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Uniform blocks.
    pub uniform_blocks: Vec<ShaderResource>,
    /// Shader-storage blocks.
    pub storage_blocks: Vec<ShaderResource>,
    /// Storage images.
    pub storage_images: Vec<ShaderResource>,
    /// Subpass inputs.
    pub subpass_inputs: Vec<SubpassInputResource>,
    /// Combined image/sampler declarations.
    pub combined_samplers: Vec<ShaderResource>,
    /// Separate image declarations awaiting pairing.
    pub separate_images: Vec<ShaderResource>,
    /// Separate sampler declarations awaiting pairing.
    pub separate_samplers: Vec<ShaderResource>,
    /// Combined samplers synthesized from separate images and samplers.
    pub combined_pairs: Vec<CombinedSamplerPair>,
    /// Push-constant members.
    pub push_constants: Vec<PushConstantReflection>,
}

impl ShaderReflection {
    /// Appends `other` to this table, skipping entries already present.
    ///
    /// Used to build the table of a linked program from its stages.
    pub fn merge(&mut self, other: &ShaderReflection) {
        fn extend<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
            for item in src {
                if !dst.contains(item) {
                    dst.push(item.clone());
                }
            }
        }
        extend(&mut self.uniform_blocks, &other.uniform_blocks);
        extend(&mut self.storage_blocks, &other.storage_blocks);
        extend(&mut self.storage_images, &other.storage_images);
        extend(&mut self.subpass_inputs, &other.subpass_inputs);
        extend(&mut self.combined_samplers, &other.combined_samplers);
        extend(&mut self.separate_images, &other.separate_images);
        extend(&mut self.separate_samplers, &other.separate_samplers);
        extend(&mut self.combined_pairs, &other.combined_pairs);
        extend(&mut self.push_constants, &other.push_constants);
    }
}

/// The value of a specialization constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecializationValue {
    /// A boolean constant.
    Bool(bool),
    /// A signed integer constant.
    Int(i32),
    /// An unsigned integer constant.
    UInt(u32),
    /// A float constant.
    Float(f32),
}

impl fmt::Display for SpecializationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecializationValue::Bool(v) => write!(f, "{v}"),
            SpecializationValue::Int(v) => write!(f, "{v}"),
            SpecializationValue::UInt(v) => write!(f, "{v}u"),
            SpecializationValue::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// A specialization constant baked into the source before compilation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecializationConstant {
    /// The `constant_id` of the declaration.
    pub id: u32,
    /// The value to inject.
    pub value: SpecializationValue,
}

/// A descriptor used to create a [`ShaderModuleId`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderModuleDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The stage this module is written for.
    pub stage: ShaderStage,
    /// The textual source, starting with a `#version` directive.
    pub source: String,
    /// The reflection table for `source`.
    pub reflection: ShaderReflection,
}

/// An opaque handle to a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderModuleId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialization_values_format_as_glsl_literals() {
        assert_eq!(SpecializationValue::Bool(true).to_string(), "true");
        assert_eq!(SpecializationValue::Int(-3).to_string(), "-3");
        assert_eq!(SpecializationValue::UInt(7).to_string(), "7u");
        assert_eq!(SpecializationValue::Float(1.0).to_string(), "1.0");
    }

    #[test]
    fn merge_skips_duplicates() {
        let mut vertex = ShaderReflection {
            uniform_blocks: vec![ShaderResource::new("Globals", 0, 0)],
            ..Default::default()
        };
        let fragment = ShaderReflection {
            uniform_blocks: vec![ShaderResource::new("Globals", 0, 0)],
            combined_samplers: vec![ShaderResource::new("albedo", 1, 0)],
            ..Default::default()
        };
        vertex.merge(&fragment);
        assert_eq!(vertex.uniform_blocks.len(), 1);
        assert_eq!(vertex.combined_samplers.len(), 1);
    }
}
