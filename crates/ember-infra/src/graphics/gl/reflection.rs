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

//! Link-time resolution of `(set, binding)` declarations.
//!
//! After a program links, [`ProgramBindings::build`] walks its reflection
//! table, assigns every resource a native unit or binding point, programs
//! that assignment into the program and records the flat list of live
//! resources that [`DescriptorState::bind_resources`] walks per draw.
//!
//! [`DescriptorState::bind_resources`]: super::descriptor::DescriptorState::bind_resources

use super::native::{GlApi, GlName, UniformKind};
use super::state_cache::{StateCache, MAX_IMAGE_UNITS, MAX_INDEXED_BUFFERS};
use ember_core::renderer::{
    PipelineError, PushConstantType, ResourceError, ShaderReflection, ShaderResource,
};

/// Descriptor sets addressable by a program.
pub const MAX_SETS: usize = 4;
/// Bindings addressable inside one set.
pub const MAX_BINDINGS: usize = 32;

const SLOT_COUNT: usize = MAX_SETS * MAX_BINDINGS;

/// The native resource class a binding maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// An indexed `UNIFORM_BUFFER` binding point.
    UniformBuffer,
    /// An indexed `SHADER_STORAGE_BUFFER` binding point.
    StorageBuffer,
    /// An image unit.
    StorageImage,
    /// A texture unit, with or without a sampler object.
    Texture,
}

/// The native range assigned to one `(set, binding)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSlot {
    /// Resource class.
    pub kind: SlotKind,
    /// The first unit or binding point.
    pub first: u32,
    /// The number of consecutive units or binding points.
    pub count: u32,
}

/// One live array element of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedResource {
    /// Resource class.
    pub kind: SlotKind,
    /// Descriptor set.
    pub set: u32,
    /// Binding inside the set.
    pub binding: u32,
    /// Array element.
    pub element: u32,
    /// The native unit or binding point.
    pub unit: u32,
    /// For textures synthesized from a separate image and sampler, the
    /// `(set, binding)` holding the sampler.
    pub sampler: Option<(u32, u32)>,
}

/// A push-constant member uploaded as a plain uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantSlot {
    /// The uniform location.
    pub location: u32,
    /// Byte offset inside the push-constant block.
    pub offset: u32,
    /// Byte size.
    pub size: u32,
    /// Element type.
    pub ty: PushConstantType,
}

impl PushConstantSlot {
    /// The upload entry point for this member.
    pub fn uniform_kind(&self) -> UniformKind {
        match self.ty {
            PushConstantType::Float
            | PushConstantType::Vec2
            | PushConstantType::Vec3
            | PushConstantType::Vec4 => UniformKind::Float,
            PushConstantType::Int
            | PushConstantType::IVec2
            | PushConstantType::IVec3
            | PushConstantType::IVec4 => UniformKind::Int,
            PushConstantType::UInt | PushConstantType::UVec4 => UniformKind::UInt,
            PushConstantType::Mat3 => UniformKind::Mat3,
            PushConstantType::Mat4 => UniformKind::Mat4,
        }
    }
}

/// A sampler uniform of the source that reads `(set, binding)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledDeclaration {
    /// Set and binding of the image read.
    pub image: (u32, u32),
    /// The sampler uniform name in the source.
    pub name: String,
}

/// The native binding layout of one linked program.
#[derive(Debug, Clone)]
pub struct ProgramBindings {
    table: [Option<NativeSlot>; SLOT_COUNT],
    resolved: Vec<ResolvedResource>,
    push_constants: Vec<PushConstantSlot>,
    sampled: Vec<SampledDeclaration>,
    texture_units: u32,
}

fn slot_index(set: u32, binding: u32) -> Result<usize, ResourceError> {
    if (set as usize) < MAX_SETS && (binding as usize) < MAX_BINDINGS {
        Ok(set as usize * MAX_BINDINGS + binding as usize)
    } else {
        Err(ResourceError::BindingOutOfRange { set, binding })
    }
}

fn element_name(name: &str, array_size: u32, element: u32) -> String {
    if array_size > 1 {
        format!("{name}[{element}]")
    } else {
        name.to_string()
    }
}

/// Hands out consecutive units of one class up to a limit.
struct UnitAllocator {
    next: u32,
    limit: u32,
    what: &'static str,
}

impl UnitAllocator {
    fn new(limit: u32, what: &'static str) -> Self {
        Self {
            next: 0,
            limit,
            what,
        }
    }

    fn take(&mut self, count: u32) -> Result<u32, ResourceError> {
        let first = self.next;
        let Some(next) = first.checked_add(count).filter(|end| *end <= self.limit) else {
            return Err(PipelineError::FeatureNotSupported(format!(
                "program needs more than {} {}",
                self.limit, self.what
            ))
            .into());
        };
        self.next = next;
        Ok(first)
    }
}

impl ProgramBindings {
    /// Resolves and programs the bindings of a linked program.
    ///
    /// ## Arguments
    /// * `program` - A successfully linked program; it is made current.
    /// * `reflection` - The merged reflection of the program's stages.
    /// * `max_texture_units` - Texture units available to one program.
    ///
    /// ## Returns
    /// [`ResourceError::BindingOutOfRange`] if a declaration lies outside the
    /// fixed table, or a [`PipelineError::FeatureNotSupported`] if the
    /// program needs more units than the context offers.
    pub fn build<G: GlApi + ?Sized>(
        gl: &G,
        state: &mut StateCache,
        program: GlName,
        reflection: &ShaderReflection,
        max_texture_units: u32,
    ) -> Result<Self, ResourceError> {
        let mut bindings = Self {
            table: [None; SLOT_COUNT],
            resolved: Vec::new(),
            push_constants: Vec::new(),
            sampled: Vec::new(),
            texture_units: 0,
        };
        state.use_program(gl, program);

        let buffer_points = MAX_INDEXED_BUFFERS as u32;
        let mut uniform_points = UnitAllocator::new(buffer_points, "uniform buffer bindings");
        let mut storage_points = UnitAllocator::new(buffer_points, "storage buffer bindings");
        let mut image_units = UnitAllocator::new(MAX_IMAGE_UNITS as u32, "image units");
        let mut texture_units = UnitAllocator::new(max_texture_units, "texture units");

        for block in &reflection.uniform_blocks {
            let first = bindings.claim(block, SlotKind::UniformBuffer, &mut uniform_points)?;
            for element in 0..block.array_size {
                let name = element_name(&block.name, block.array_size, element);
                if let Some(index) = gl.get_uniform_block_index(program, &name) {
                    gl.uniform_block_binding(program, index, first + element);
                    bindings.push_resolved(SlotKind::UniformBuffer, block, element, first, None);
                }
            }
        }

        for block in &reflection.storage_blocks {
            let first = bindings.claim(block, SlotKind::StorageBuffer, &mut storage_points)?;
            for element in 0..block.array_size {
                let name = element_name(&block.name, block.array_size, element);
                if let Some(index) = gl.get_shader_storage_block_index(program, &name) {
                    gl.shader_storage_block_binding(program, index, first + element);
                    bindings.push_resolved(SlotKind::StorageBuffer, block, element, first, None);
                }
            }
        }

        for image in &reflection.storage_images {
            let first = bindings.claim(image, SlotKind::StorageImage, &mut image_units)?;
            bindings.assign_uniform_units(gl, program, image, SlotKind::StorageImage, first, None);
        }

        let textures = reflection
            .subpass_inputs
            .iter()
            .map(|input| &input.resource)
            .chain(reflection.combined_samplers.iter());
        for texture in textures {
            let first = bindings.claim(texture, SlotKind::Texture, &mut texture_units)?;
            bindings.assign_uniform_units(gl, program, texture, SlotKind::Texture, first, None);
            bindings.sampled.push(SampledDeclaration {
                image: (texture.set, texture.binding),
                name: texture.name.clone(),
            });
        }

        // Separate declarations only reserve their slot; units come from pairs.
        for separate in reflection
            .separate_images
            .iter()
            .chain(reflection.separate_samplers.iter())
        {
            slot_index(separate.set, separate.binding)?;
        }

        let mut pair_units = Vec::new();
        for pair in &reflection.combined_pairs {
            let image_slot = slot_index(pair.image.0, pair.image.1)?;
            let sampler_slot = slot_index(pair.sampler.0, pair.sampler.1)?;
            if pair_units.is_empty() {
                pair_units = vec![None; SLOT_COUNT * SLOT_COUNT];
            }
            let memo = image_slot * SLOT_COUNT + sampler_slot;
            let first = if let Some(first) = pair_units[memo] {
                if bindings.sampled.iter().any(|s| s.name == pair.name) {
                    continue;
                }
                first
            } else {
                let first = texture_units.take(pair.array_size.max(1))?;
                pair_units[memo] = Some(first);
                if bindings.table[image_slot].is_none() {
                    bindings.table[image_slot] = Some(NativeSlot {
                        kind: SlotKind::Texture,
                        first,
                        count: pair.array_size.max(1),
                    });
                }
                first
            };
            let resource = ShaderResource {
                name: pair.name.clone(),
                set: pair.image.0,
                binding: pair.image.1,
                array_size: pair.array_size.max(1),
            };
            bindings.assign_uniform_units(
                gl,
                program,
                &resource,
                SlotKind::Texture,
                first,
                Some(pair.sampler),
            );
            bindings.sampled.push(SampledDeclaration {
                image: pair.image,
                name: pair.name.clone(),
            });
        }
        bindings.texture_units = texture_units.next;

        for member in &reflection.push_constants {
            match gl.get_uniform_location(program, &member.name) {
                Some(location) => bindings.push_constants.push(PushConstantSlot {
                    location,
                    offset: member.offset,
                    size: member.size,
                    ty: member.ty,
                }),
                None => log::trace!(
                    "ProgramBindings: Push constant '{}' is inactive in program {program}",
                    member.name
                ),
            }
        }

        log::debug!(
            "ProgramBindings: Program {program} resolved {} resources, {} texture units, \
             {} push constants",
            bindings.resolved.len(),
            bindings.texture_units,
            bindings.push_constants.len()
        );
        Ok(bindings)
    }

    fn claim(
        &mut self,
        resource: &ShaderResource,
        kind: SlotKind,
        units: &mut UnitAllocator,
    ) -> Result<u32, ResourceError> {
        let index = slot_index(resource.set, resource.binding)?;
        let count = resource.array_size.max(1);
        if let Some(slot) = self.table[index] {
            if slot.kind == kind && slot.count == count {
                return Ok(slot.first);
            }
            log::warn!(
                "ProgramBindings: (set {}, binding {}) is declared twice with different shapes",
                resource.set,
                resource.binding
            );
        }
        let first = units.take(count)?;
        self.table[index] = Some(NativeSlot { kind, first, count });
        Ok(first)
    }

    /// Points every live element's sampler or image uniform at its unit.
    fn assign_uniform_units<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        program: GlName,
        resource: &ShaderResource,
        kind: SlotKind,
        first: u32,
        sampler: Option<(u32, u32)>,
    ) {
        let count = resource.array_size.max(1);
        for element in 0..count {
            let name = element_name(&resource.name, count, element);
            let Some(location) = gl.get_uniform_location(program, &name) else {
                log::trace!("ProgramBindings: '{name}' is inactive in program {program}");
                continue;
            };
            gl.uniform_1_i32(location, (first + element) as i32);
            self.push_resolved(kind, resource, element, first, sampler);
        }
    }

    fn push_resolved(
        &mut self,
        kind: SlotKind,
        resource: &ShaderResource,
        element: u32,
        first: u32,
        sampler: Option<(u32, u32)>,
    ) {
        self.resolved.push(ResolvedResource {
            kind,
            set: resource.set,
            binding: resource.binding,
            element,
            unit: first + element,
            sampler,
        });
    }

    /// The native slot assigned to `(set, binding)`.
    pub fn slot(&self, set: u32, binding: u32) -> Result<Option<NativeSlot>, ResourceError> {
        Ok(self.table[slot_index(set, binding)?])
    }

    /// Every live resource, in assignment order.
    pub fn resolved(&self) -> &[ResolvedResource] {
        &self.resolved
    }

    /// Live push-constant members.
    pub fn push_constants(&self) -> &[PushConstantSlot] {
        &self.push_constants
    }

    /// Sampler uniforms, keyed by the image binding they read.
    pub fn sampled(&self) -> &[SampledDeclaration] {
        &self.sampled
    }

    /// Number of texture units the program uses.
    pub fn texture_units(&self) -> u32 {
        self.texture_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use crate::graphics::gl::shader_cache::ShaderCache;
    use ember_core::renderer::CombinedSamplerPair;

    const VERTEX: &str = "#version 310 es\nvoid main() { gl_Position = vec4(0.0); }\n";

    fn link(gl: &HeadlessGl, fragment: &str) -> GlName {
        let mut cache = ShaderCache::new();
        let program = cache.cache_program(gl, [Some(VERTEX), Some(fragment), None]);
        assert_ne!(program, 0, "test program links");
        program
    }

    #[test]
    fn sampler_arrays_take_consecutive_units() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform sampler2D textures[4]; uniform Globals {};");
        let reflection = ShaderReflection {
            uniform_blocks: vec![ShaderResource::new("Globals", 0, 0)],
            combined_samplers: vec![ShaderResource::new("textures", 1, 2).with_array_size(4)],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        let bindings =
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16).expect("bindings");

        let slot = bindings.slot(1, 2).expect("in range").expect("assigned");
        assert_eq!(slot.count, 4);
        let units: Vec<u32> = bindings
            .resolved()
            .iter()
            .filter(|r| r.kind == SlotKind::Texture)
            .map(|r| r.unit)
            .collect();
        assert_eq!(units, vec![0, 1, 2, 3]);
        assert_eq!(gl.count(|c| matches!(c, GlCall::Uniform1i { .. })), 4);
    }

    #[test]
    fn inactive_elements_are_dropped() {
        let gl = HeadlessGl::new();
        gl.set_inactive_uniform("textures[3]");
        let program = link(&gl, "uniform sampler2D textures[4];");
        let reflection = ShaderReflection {
            combined_samplers: vec![ShaderResource::new("textures", 0, 0).with_array_size(4)],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        let bindings =
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16).expect("bindings");
        assert_eq!(bindings.resolved().len(), 3);
        assert_eq!(bindings.texture_units(), 4, "units stay reserved");
    }

    #[test]
    fn out_of_range_bindings_are_errors() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform Big {};");
        let reflection = ShaderReflection {
            uniform_blocks: vec![ShaderResource::new("Big", 4, 0)],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        assert!(matches!(
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16),
            Err(ResourceError::BindingOutOfRange { set: 4, binding: 0 })
        ));
    }

    #[test]
    fn identical_pairs_share_one_unit() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform sampler2D SPIRV_Cross_Combinedalbedosmp;");
        let pair = CombinedSamplerPair {
            name: "SPIRV_Cross_Combinedalbedosmp".to_string(),
            image: (0, 1),
            sampler: (0, 2),
            array_size: 1,
        };
        let reflection = ShaderReflection {
            separate_images: vec![ShaderResource::new("albedo", 0, 1)],
            separate_samplers: vec![ShaderResource::new("smp", 0, 2)],
            combined_pairs: vec![pair.clone(), pair],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        let bindings =
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16).expect("bindings");
        assert_eq!(bindings.texture_units(), 1);
        assert!(bindings
            .resolved()
            .iter()
            .all(|r| r.unit == 0 && r.sampler == Some((0, 2))));
    }

    #[test]
    fn too_many_texture_units_fail() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform sampler2D many[8];");
        let reflection = ShaderReflection {
            combined_samplers: vec![ShaderResource::new("many", 0, 0).with_array_size(8)],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        assert!(matches!(
            ProgramBindings::build(&gl, &mut state, program, &reflection, 4),
            Err(ResourceError::Pipeline(PipelineError::FeatureNotSupported(_)))
        ));
    }

    #[test]
    fn oversized_arrays_fail_without_overflow() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform Globals {}; uniform Huge {};");
        let reflection = ShaderReflection {
            uniform_blocks: vec![
                ShaderResource::new("Globals", 0, 0),
                ShaderResource::new("Huge", 0, 1).with_array_size(u32::MAX),
            ],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        assert!(matches!(
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16),
            Err(ResourceError::Pipeline(PipelineError::FeatureNotSupported(_)))
        ));
    }

    #[test]
    fn shared_pairs_keep_units_past_255() {
        let gl = HeadlessGl::new();
        let program = link(&gl, "uniform sampler2D many[300], first_pair, second_pair;");
        let pair = |name: &str| CombinedSamplerPair {
            name: name.to_string(),
            image: (0, 1),
            sampler: (0, 2),
            array_size: 1,
        };
        let reflection = ShaderReflection {
            combined_samplers: vec![ShaderResource::new("many", 0, 0).with_array_size(300)],
            separate_images: vec![ShaderResource::new("albedo", 0, 1)],
            separate_samplers: vec![ShaderResource::new("smp", 0, 2)],
            combined_pairs: vec![pair("first_pair"), pair("second_pair")],
            ..Default::default()
        };
        let mut state = StateCache::new(16);
        let bindings =
            ProgramBindings::build(&gl, &mut state, program, &reflection, 512).expect("bindings");

        assert_eq!(bindings.texture_units(), 301);
        let paired: Vec<u32> = bindings
            .resolved()
            .iter()
            .filter(|r| r.sampler == Some((0, 2)))
            .map(|r| r.unit)
            .collect();
        assert_eq!(paired, vec![300, 300]);
    }
}
