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

//! Runtime half of the descriptor-set emulation.
//!
//! `BindDescriptorSets` only records handles here. Native binds happen in
//! [`DescriptorState::bind_resources`], once per draw or dispatch, by
//! walking the current program's [`ProgramBindings`].

use super::conversions::IntoGl;
use super::reflection::{ProgramBindings, ResolvedResource, SlotKind, MAX_SETS};
use super::resources::ResourceRegistry;
use super::state_cache::{ImageUnitBinding, StateCache};
use super::native::GlApi;
use ember_core::renderer::{
    DescriptorResource, DescriptorSetData, DescriptorSetLayout, ImageKind, PipelineLayoutDescriptor,
    PipelineLayoutId, ResourceError,
};

#[derive(Debug, Clone)]
struct BoundSet {
    data: DescriptorSetData,
    /// `(binding, element, offset)` for every dynamic buffer element.
    dynamic_offsets: Vec<(u32, u32, u32)>,
}

impl BoundSet {
    fn dynamic_offset(&self, binding: u32, element: u32) -> u32 {
        self.dynamic_offsets
            .iter()
            .find(|(b, e, _)| *b == binding && *e == element)
            .map_or(0, |(_, _, offset)| *offset)
    }
}

/// Describes why a bound set does not match its layout, if it does not.
fn layout_mismatch(data: &DescriptorSetData, layout: &DescriptorSetLayout) -> Option<String> {
    for expected in &layout.bindings {
        let Some(bound) = data.binding(expected.binding) else {
            return Some(format!("binding {} is missing", expected.binding));
        };
        if bound.ty != expected.ty {
            return Some(format!(
                "binding {} holds {:?}, layout declares {:?}",
                expected.binding, bound.ty, expected.ty
            ));
        }
        if bound.resources.len() != expected.count as usize {
            return Some(format!(
                "binding {} has {} elements, layout declares {}",
                expected.binding,
                bound.resources.len(),
                expected.count
            ));
        }
    }
    data.bindings
        .iter()
        .find(|b| !layout.bindings.iter().any(|l| l.binding == b.binding))
        .map(|b| format!("binding {} is not in the layout", b.binding))
}

/// The descriptor sets recorded by the command stream.
#[derive(Debug, Default)]
pub struct DescriptorState {
    sets: [Option<BoundSet>; MAX_SETS],
    valid: [bool; MAX_SETS],
    dirty: u8,
    validated_layout: Option<PipelineLayoutId>,
}

impl DescriptorState {
    /// Creates a state with no sets bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every bound set.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bitmask of sets changed since they were last validated.
    pub fn dirty_mask(&self) -> u8 {
        self.dirty
    }

    /// Records `sets` starting at `first_set` and marks them dirty.
    ///
    /// Dynamic offsets are consumed in set order, then binding order, one
    /// per element of every dynamic buffer binding.
    pub fn bind_sets(
        &mut self,
        first_set: u32,
        sets: &[DescriptorSetData],
        dynamic_offsets: &[u32],
    ) -> Result<(), ResourceError> {
        let end = first_set as usize + sets.len();
        if end > MAX_SETS {
            return Err(ResourceError::BindingOutOfRange {
                set: end as u32 - 1,
                binding: 0,
            });
        }
        let mut offsets = dynamic_offsets.iter().copied();
        for (index, data) in sets.iter().enumerate() {
            let set = first_set as usize + index;
            let mut order: Vec<_> = data.bindings.iter().filter(|b| b.ty.is_dynamic()).collect();
            order.sort_by_key(|b| b.binding);
            let mut dynamic = Vec::new();
            for binding in order {
                for element in 0..binding.resources.len() as u32 {
                    let offset = offsets.next().unwrap_or_else(|| {
                        log::warn!(
                            "DescriptorState: Missing dynamic offset for (set {set}, binding {})",
                            binding.binding
                        );
                        0
                    });
                    dynamic.push((binding.binding, element, offset));
                }
            }
            self.sets[set] = Some(BoundSet {
                data: data.clone(),
                dynamic_offsets: dynamic,
            });
            self.dirty |= 1 << set;
        }
        if offsets.next().is_some() {
            log::warn!("DescriptorState: More dynamic offsets than dynamic bindings");
        }
        Ok(())
    }

    /// Checks dirty sets, or every set when the layout changed, against
    /// `layout`. A mismatching set is invalidated as a whole.
    fn validate(
        &mut self,
        layout_id: PipelineLayoutId,
        layout: &PipelineLayoutDescriptor,
        log_errors: bool,
    ) {
        let mask = if self.validated_layout == Some(layout_id) {
            self.dirty
        } else {
            u8::MAX
        };
        for set in 0..MAX_SETS {
            if mask & (1 << set) == 0 {
                continue;
            }
            self.valid[set] = match (&self.sets[set], layout.set_layouts.get(set)) {
                (Some(bound), Some(expected)) => match layout_mismatch(&bound.data, expected) {
                    Some(reason) => {
                        if log_errors {
                            log::error!(
                                "DescriptorState: Set {set} does not match {layout_id:?}: {reason}"
                            );
                        }
                        false
                    }
                    None => true,
                },
                (Some(_), None) => {
                    if log_errors {
                        log::error!(
                            "DescriptorState: Set {set} is bound but {layout_id:?} has no such set"
                        );
                    }
                    false
                }
                (None, _) => true,
            };
        }
        self.dirty = 0;
        self.validated_layout = Some(layout_id);
    }

    fn lookup(&self, set: u32, binding: u32, element: u32) -> Option<(&DescriptorResource, u32)> {
        let set_index = set as usize;
        if !self.valid.get(set_index).copied().unwrap_or(false) {
            return None;
        }
        let bound = self.sets.get(set_index)?.as_ref()?;
        let resources = &bound.data.binding(binding)?.resources;
        let resource = resources.get(element as usize).or_else(|| resources.first())?;
        Some((resource, bound.dynamic_offset(binding, element)))
    }

    /// Issues the native binds of every live resource of `bindings`.
    ///
    /// Missing or mismatching resources degrade to object `0`.
    #[allow(clippy::too_many_arguments)]
    pub fn bind_resources<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        bindings: &ProgramBindings,
        layout_id: PipelineLayoutId,
        layout: &PipelineLayoutDescriptor,
        registry: &ResourceRegistry,
        frame_slot: u32,
        validation: bool,
    ) {
        self.validate(layout_id, layout, validation);
        for resource in bindings.resolved() {
            match resource.kind {
                SlotKind::UniformBuffer | SlotKind::StorageBuffer => {
                    self.bind_buffer(gl, state, resource, registry, frame_slot)
                }
                SlotKind::StorageImage => self.bind_storage_image(gl, state, resource, registry),
                SlotKind::Texture => self.bind_texture(gl, state, resource, registry),
            }
        }
    }

    fn bind_buffer<G: GlApi + ?Sized>(
        &self,
        gl: &G,
        state: &mut StateCache,
        resource: &ResolvedResource,
        registry: &ResourceRegistry,
        frame_slot: u32,
    ) {
        let target = if resource.kind == SlotKind::UniformBuffer {
            glow::UNIFORM_BUFFER
        } else {
            glow::SHADER_STORAGE_BUFFER
        };
        let bound = self
            .lookup(resource.set, resource.binding, resource.element)
            .and_then(|(descriptor, dynamic)| match *descriptor {
                DescriptorResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => registry.buffer(buffer).map(|b| (b, offset, size, dynamic)),
                _ => None,
            });
        match bound {
            Some((buffer, offset, size, dynamic)) => {
                let size = if size == 0 {
                    buffer.descriptor.size.saturating_sub(offset)
                } else {
                    size
                };
                let native_offset = buffer
                    .ring_offset(frame_slot)
                    .checked_add(offset)
                    .and_then(|o| o.checked_add(u64::from(dynamic)));
                let range = native_offset
                    .and_then(|o| i32::try_from(o).ok())
                    .zip(i32::try_from(size).ok());
                match range {
                    Some((native_offset, size)) => state.bind_buffer_range(
                        gl,
                        target,
                        resource.unit,
                        buffer.name,
                        native_offset,
                        size,
                    ),
                    None => {
                        log::error!(
                            "DescriptorState: Range {offset}+{dynamic} ({size} bytes) \
                             of set {} binding {} exceeds native limits",
                            resource.set,
                            resource.binding
                        );
                        state.bind_buffer_range(gl, target, resource.unit, 0, 0, 0);
                    }
                }
            }
            None => state.bind_buffer_range(gl, target, resource.unit, 0, 0, 0),
        }
    }

    fn bind_storage_image<G: GlApi + ?Sized>(
        &self,
        gl: &G,
        state: &mut StateCache,
        resource: &ResolvedResource,
        registry: &ResourceRegistry,
    ) {
        let binding = self
            .lookup(resource.set, resource.binding, resource.element)
            .and_then(|(descriptor, _)| match *descriptor {
                DescriptorResource::Image {
                    image,
                    mip_level,
                    access,
                    ..
                } => registry.image(image).map(|image| ImageUnitBinding {
                    texture: image.name,
                    level: mip_level as i32,
                    layered: image.descriptor.is_layered()
                        || image.descriptor.kind == ImageKind::Cube,
                    layer: 0,
                    access: access.into_gl(),
                    format: image.format.internal_format,
                }),
                _ => None,
            })
            .unwrap_or(ImageUnitBinding {
                texture: 0,
                level: 0,
                layered: false,
                layer: 0,
                access: glow::READ_ONLY,
                format: glow::R32F,
            });
        state.bind_image(gl, resource.unit, binding);
    }

    fn bind_texture<G: GlApi + ?Sized>(
        &self,
        gl: &G,
        state: &mut StateCache,
        resource: &ResolvedResource,
        registry: &ResourceRegistry,
    ) {
        let element = self.lookup(resource.set, resource.binding, resource.element);
        let (texture, own_sampler) = match element {
            Some((DescriptorResource::Image { image, sampler, .. }, _)) => {
                (registry.image(*image), *sampler)
            }
            _ => (None, None),
        };
        match texture {
            Some(image) => state.bind_texture(gl, resource.unit, image.target, image.name),
            None => state.bind_texture(gl, resource.unit, glow::TEXTURE_2D, 0),
        }

        let sampler = match resource.sampler {
            Some((set, binding)) => match self.lookup(set, binding, resource.element) {
                Some((DescriptorResource::Sampler(id), _)) => Some(*id),
                _ => None,
            },
            None => own_sampler,
        };
        let name = sampler
            .and_then(|id| registry.sampler(id))
            .map_or(0, |s| s.name);
        state.bind_sampler(gl, resource.unit, name);
    }

    /// The sorted `(set, binding)` pairs of sampled resources currently
    /// bound to external images.
    pub fn external_bindings(
        &self,
        bindings: &ProgramBindings,
        registry: &ResourceRegistry,
    ) -> Vec<(u32, u32)> {
        let mut external: Vec<(u32, u32)> = bindings
            .resolved()
            .iter()
            .filter(|r| r.kind == SlotKind::Texture)
            .filter(|r| {
                let set = r.set as usize;
                let bound = self.sets.get(set).and_then(|s| s.as_ref());
                bound
                    .and_then(|s| s.data.binding(r.binding))
                    .and_then(|b| b.resources.get(r.element as usize))
                    .is_some_and(|res| match res {
                        DescriptorResource::Image { image, .. } => {
                            registry.image(*image).is_some_and(|i| i.is_external())
                        }
                        _ => false,
                    })
            })
            .map(|r| (r.set, r.binding))
            .collect();
        external.sort_unstable();
        external.dedup();
        external
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use crate::graphics::gl::shader_cache::ShaderCache;
    use ember_core::renderer::{
        BufferDescriptor, BufferId, BufferUsage, DescriptorBinding, DescriptorSetLayoutBinding,
        DescriptorType, ShaderReflection, ShaderResource,
    };

    struct Fixture {
        gl: HeadlessGl,
        state: StateCache,
        registry: ResourceRegistry,
        bindings: ProgramBindings,
        layout: PipelineLayoutDescriptor,
    }

    fn fixture() -> Fixture {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut cache = ShaderCache::new();
        let program = cache.cache_program(
            &gl,
            [Some("void main() {}"), Some("uniform Frame {}; buffer Lights {};"), None],
        );
        let reflection = ShaderReflection {
            uniform_blocks: vec![ShaderResource::new("Frame", 0, 0)],
            storage_blocks: vec![ShaderResource::new("Lights", 0, 1)],
            ..Default::default()
        };
        let bindings =
            ProgramBindings::build(&gl, &mut state, program, &reflection, 16).expect("bindings");
        let layout = PipelineLayoutDescriptor {
            label: None,
            set_layouts: vec![DescriptorSetLayout {
                bindings: vec![
                    DescriptorSetLayoutBinding {
                        binding: 0,
                        ty: DescriptorType::UniformBufferDynamic,
                        count: 1,
                    },
                    DescriptorSetLayoutBinding {
                        binding: 1,
                        ty: DescriptorType::StorageBuffer,
                        count: 1,
                    },
                ],
            }],
            push_constant_size: 0,
        };
        Fixture {
            gl,
            state,
            registry: ResourceRegistry::new(),
            bindings,
            layout,
        }
    }

    impl Fixture {
        fn uniform_buffer(&mut self, size: u64) -> BufferId {
            self.registry
                .create_buffer(
                    &self.gl,
                    &mut self.state,
                    &BufferDescriptor::new(size, BufferUsage::UNIFORM),
                    3,
                    256,
                )
                .expect("buffer")
        }

        fn bind(&mut self, descriptors: &mut DescriptorState) {
            descriptors.bind_resources(
                &self.gl,
                &mut self.state,
                &self.bindings,
                PipelineLayoutId(0),
                &self.layout,
                &self.registry,
                0,
                true,
            );
        }
    }

    fn buffer_binding(binding: u32, ty: DescriptorType, buffer: BufferId) -> DescriptorBinding {
        buffer_range(binding, ty, buffer, 0)
    }

    fn buffer_range(
        binding: u32,
        ty: DescriptorType,
        buffer: BufferId,
        offset: u64,
    ) -> DescriptorBinding {
        DescriptorBinding {
            binding,
            ty,
            resources: vec![DescriptorResource::Buffer {
                buffer,
                offset,
                size: 64,
            }],
        }
    }

    #[test]
    fn dynamic_offsets_are_added_to_the_range() {
        let mut f = fixture();
        let buffer = f.uniform_buffer(1024);
        let set = DescriptorSetData {
            bindings: vec![
                buffer_binding(0, DescriptorType::UniformBufferDynamic, buffer),
                buffer_binding(1, DescriptorType::StorageBuffer, buffer),
            ],
        };
        let mut descriptors = DescriptorState::new();
        descriptors.bind_sets(0, &[set], &[512]).expect("bind");
        assert_eq!(descriptors.dirty_mask(), 1);
        f.gl.clear_calls();
        f.bind(&mut descriptors);

        let name = f.registry.buffer(buffer).expect("buffer").name;
        let calls = f.gl.calls();
        assert!(calls.contains(&GlCall::BindBufferRange {
            target: glow::UNIFORM_BUFFER,
            index: 0,
            buffer: name,
            offset: 512,
            size: 64
        }));
        assert_eq!(descriptors.dirty_mask(), 0);

        // Nothing changed: the second walk is fully suppressed.
        f.gl.clear_calls();
        f.bind(&mut descriptors);
        assert_eq!(f.gl.count(GlCall::is_bind), 0);
    }

    #[test]
    fn ranges_past_native_offsets_bind_nothing() {
        let mut f = fixture();
        let buffer = f.uniform_buffer(1024);
        let set = DescriptorSetData {
            bindings: vec![
                buffer_binding(0, DescriptorType::UniformBufferDynamic, buffer),
                buffer_range(1, DescriptorType::StorageBuffer, buffer, 1 << 40),
            ],
        };
        let mut descriptors = DescriptorState::new();
        descriptors.bind_sets(0, &[set], &[0]).expect("bind");
        f.gl.clear_calls();
        f.bind(&mut descriptors);

        let storage_ranges = f.gl.count(|c| {
            matches!(c, GlCall::BindBufferRange { target: glow::SHADER_STORAGE_BUFFER, .. })
        });
        assert_eq!(storage_ranges, 0);
        assert_eq!(
            f.gl.count(|c| matches!(
                c,
                GlCall::BindBufferBase {
                    target: glow::SHADER_STORAGE_BUFFER,
                    buffer: 0,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn mismatching_sets_bind_nothing() {
        let mut f = fixture();
        let buffer = f.uniform_buffer(256);
        // Binding 1 is missing, so the whole set is rejected.
        let set = DescriptorSetData {
            bindings: vec![buffer_binding(0, DescriptorType::UniformBufferDynamic, buffer)],
        };
        let mut descriptors = DescriptorState::new();
        descriptors.bind_sets(0, &[set], &[0]).expect("bind");
        f.gl.clear_calls();
        f.bind(&mut descriptors);
        assert!(f
            .gl
            .calls()
            .iter()
            .all(|c| !matches!(c, GlCall::BindBufferRange { .. })));
        assert_eq!(
            f.gl.count(|c| matches!(c, GlCall::BindBufferBase { buffer: 0, .. })),
            2
        );
    }

    #[test]
    fn sets_beyond_the_table_are_rejected() {
        let mut descriptors = DescriptorState::new();
        let sets = vec![DescriptorSetData::default(); 2];
        assert!(matches!(
            descriptors.bind_sets(3, &sets, &[]),
            Err(ResourceError::BindingOutOfRange { set: 4, binding: 0 })
        ));
    }
}
