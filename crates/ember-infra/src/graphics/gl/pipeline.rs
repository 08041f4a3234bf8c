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

//! Pipeline state objects on top of programs and vertex arrays.
//!
//! A pipeline owns a specialized program (plus on-demand variants for
//! external textures), the vertex array describing its vertex input and the
//! fixed-function state applied before each draw.

use super::conversions::{IntoGl, VertexAttribFormat};
use super::native::{GlApi, GlName};
use super::reflection::{ProgramBindings, MAX_BINDINGS, MAX_SETS};
use super::shader_cache::{find_version_line_end, specialize_source, ShaderCache};
use super::state_cache::{
    BlendState, DepthState, RasterState, RenderState, StateCache, StencilFace, StencilState,
    MAX_VERTEX_BINDINGS,
};
use ember_core::renderer::{
    ComputePipelineDescriptor, ComputePipelineId, PipelineError, PipelineLayoutDescriptor,
    PipelineLayoutId, PolygonMode, RenderPipelineDescriptor, RenderPipelineId, ResourceError,
    ShaderError, ShaderModuleDescriptor, ShaderModuleId, ShaderReflection, ShaderStage,
    SpecializationConstant, StencilFaceState, VertexStepMode,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

const EXTERNAL_EXTENSION: &str = "#extension GL_OES_EGL_image_external_essl3 : require\n";

fn declares_sampler(line: &str, name: &str) -> bool {
    let mut tokens = line
        .split(|c: char| c.is_whitespace() || c == ';' || c == '[')
        .filter(|t| !t.is_empty());
    tokens.any(|t| t == "sampler2D") && tokens.any(|t| t == name)
}

/// Rewrites the `sampler2D` declarations of `names` to `samplerExternalOES`
/// and enables the extension they need.
pub fn patch_external_samplers(source: &str, names: &[&str]) -> String {
    let mut out = String::with_capacity(source.len() + EXTERNAL_EXTENSION.len());
    let mut patched = false;
    for line in source.split_inclusive('\n') {
        if names.iter().any(|name| declares_sampler(line, name)) {
            out.push_str(&line.replacen("sampler2D", "samplerExternalOES", 1));
            patched = true;
        } else {
            out.push_str(line);
        }
    }
    if !patched {
        return out;
    }
    match find_version_line_end(&out) {
        Some(end) => {
            let mut head = out[..end].to_string();
            if !head.ends_with('\n') {
                head.push('\n');
            }
            format!("{head}{EXTERNAL_EXTENSION}{}", &out[end..])
        }
        None => format!("{EXTERNAL_EXTENSION}{out}"),
    }
}

/// A linked program and its resolved bindings.
#[derive(Debug)]
pub struct ProgramVariant {
    /// The native program.
    pub program: GlName,
    /// The native binding layout.
    pub bindings: ProgramBindings,
}

/// The programs of one pipeline: the base program and its external-texture
/// variants, keyed by the sorted `(set, binding)` pairs they patch.
#[derive(Debug)]
pub struct ProgramSet {
    label: Option<String>,
    sources: [Option<String>; 3],
    reflection: ShaderReflection,
    max_texture_units: u32,
    base: ProgramVariant,
    variants: HashMap<Vec<(u32, u32)>, ProgramVariant>,
    failed_variants: HashSet<Vec<(u32, u32)>>,
}

fn link_variant<G: GlApi + ?Sized>(
    gl: &G,
    state: &mut StateCache,
    cache: &mut ShaderCache,
    sources: &[Option<String>; 3],
    reflection: &ShaderReflection,
    max_texture_units: u32,
    label: &Option<String>,
) -> Result<ProgramVariant, ResourceError> {
    let program = cache.cache_program(gl, [0, 1, 2].map(|i| sources[i].as_deref()));
    if program == 0 {
        let details = cache
            .take_last_error()
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(PipelineError::CompilationFailed {
            label: label.clone(),
            details,
        }
        .into());
    }
    match ProgramBindings::build(gl, state, program, reflection, max_texture_units) {
        Ok(bindings) => Ok(ProgramVariant { program, bindings }),
        Err(err) => {
            cache.release_program(gl, state, program);
            Err(err)
        }
    }
}

impl ProgramSet {
    /// Specializes the stage sources and links the base program.
    pub fn link<G: GlApi + ?Sized>(
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        label: Option<String>,
        stages: &[(&ShaderModuleDescriptor, &[SpecializationConstant])],
        max_texture_units: u32,
    ) -> Result<Self, ResourceError> {
        let mut sources: [Option<String>; 3] = Default::default();
        let mut reflection = ShaderReflection::default();
        for (module, constants) in stages {
            sources[module.stage.index()] = Some(specialize_source(&module.source, constants));
            reflection.merge(&module.reflection);
        }
        let base = link_variant(gl, state, cache, &sources, &reflection, max_texture_units, &label)?;
        Ok(Self {
            label,
            sources,
            reflection,
            max_texture_units,
            base,
            variants: HashMap::new(),
            failed_variants: HashSet::new(),
        })
    }

    /// The base program.
    pub fn base(&self) -> &ProgramVariant {
        &self.base
    }

    /// The specialized source of `stage`.
    pub fn source(&self, stage: ShaderStage) -> Option<&str> {
        self.sources[stage.index()].as_deref()
    }

    /// The program to use when the sampled bindings in `external` hold
    /// external images. Variants are compiled on first use.
    ///
    /// ## Returns
    /// `None` if the variant failed to build; the failure is remembered so
    /// it is not retried every draw.
    pub fn variant<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        external: &[(u32, u32)],
    ) -> Option<&ProgramVariant> {
        if external.is_empty() {
            return Some(&self.base);
        }
        if self.failed_variants.contains(external) {
            return None;
        }
        if !self.variants.contains_key(external) {
            let names: Vec<&str> = self
                .base
                .bindings
                .sampled()
                .iter()
                .filter(|s| external.contains(&s.image))
                .map(|s| s.name.as_str())
                .collect();
            let patched = self
                .sources
                .clone()
                .map(|s| s.map(|source| patch_external_samplers(&source, &names)));
            match link_variant(
                gl,
                state,
                cache,
                &patched,
                &self.reflection,
                self.max_texture_units,
                &self.label,
            ) {
                Ok(variant) => {
                    log::debug!(
                        "GlPipeline: Built external-texture variant {} of '{}' for {external:?}",
                        variant.program,
                        self.label.as_deref().unwrap_or_default()
                    );
                    self.variants.insert(external.to_vec(), variant);
                }
                Err(err) => {
                    log::error!("GlPipeline: External-texture variant failed: {err}");
                    self.failed_variants.insert(external.to_vec());
                    return None;
                }
            }
        }
        self.variants.get(external)
    }

    /// Releases every program.
    pub fn release<G: GlApi + ?Sized>(self, gl: &G, state: &mut StateCache, cache: &mut ShaderCache) {
        cache.release_program(gl, state, self.base.program);
        for variant in self.variants.into_values() {
            cache.release_program(gl, state, variant.program);
        }
    }
}

/// Stride and rate of one vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferSlot {
    /// Byte stride.
    pub stride: i32,
    /// `true` if the binding advances per instance.
    pub per_instance: bool,
}

/// An emulated graphics pipeline.
#[derive(Debug)]
pub struct GraphicsPipeline {
    /// The programs.
    pub programs: ProgramSet,
    /// The layout resources are validated against.
    pub layout: PipelineLayoutId,
    /// The vertex array holding the attribute formats.
    pub vertex_array: GlName,
    /// Vertex buffer bindings, by slot.
    pub vertex_buffers: Vec<VertexBufferSlot>,
    /// Native primitive mode.
    pub topology: u32,
    /// Fixed-function state.
    pub render_state: RenderState,
    /// Blend constant color.
    pub blend_constant: [f32; 4],
}

fn stencil_face(face: &StencilFaceState) -> StencilFace {
    StencilFace {
        func: face.compare.into_gl(),
        reference: face.reference as i32,
        compare_mask: face.compare_mask,
        fail: face.fail_op.into_gl(),
        depth_fail: face.depth_fail_op.into_gl(),
        pass: face.depth_pass_op.into_gl(),
        write_mask: face.write_mask,
    }
}

/// Translates the fixed-function part of a pipeline descriptor.
pub fn render_state(descriptor: &RenderPipelineDescriptor) -> RenderState {
    let primitive = &descriptor.primitive_state;
    let depth_stencil = descriptor.depth_stencil_state.as_ref();
    let depth = match depth_stencil {
        Some(ds) => DepthState {
            test_enabled: ds.depth_test_enabled,
            write_enabled: ds.depth_write_enabled,
            func: ds.depth_compare.into_gl(),
        },
        None => DepthState {
            test_enabled: false,
            write_enabled: false,
            ..Default::default()
        },
    };
    let stencil = match depth_stencil {
        Some(ds) if ds.stencil_test_enabled => StencilState {
            enabled: true,
            front: stencil_face(&ds.stencil_front),
            back: stencil_face(&ds.stencil_back),
        },
        _ => StencilState::default(),
    };

    let first_target = descriptor.color_target_states.first();
    let blend = match first_target.and_then(|t| t.blend) {
        Some(blend) => BlendState {
            enabled: true,
            equation: [blend.color.operation.into_gl(), blend.alpha.operation.into_gl()],
            func: [
                blend.color.src_factor.into_gl(),
                blend.color.dst_factor.into_gl(),
                blend.alpha.src_factor.into_gl(),
                blend.alpha.dst_factor.into_gl(),
            ],
        },
        None => BlendState::default(),
    };
    let color_mask = first_target.map_or([true; 4], |t| t.write_mask.into_gl());

    RenderState {
        depth,
        stencil,
        blend,
        color_mask,
        raster: RasterState {
            cull_face: primitive.cull_mode.into_gl(),
            front_face: primitive.front_face.into_gl(),
            polygon_offset: depth_stencil
                .and_then(|ds| ds.bias)
                .map(|bias| (bias.slope_scale, bias.constant)),
            rasterizer_discard: primitive.rasterizer_discard,
            primitive_restart: primitive.primitive_restart,
            alpha_to_coverage: descriptor.multisample_state.alpha_to_coverage_enabled,
            line_width: primitive.line_width,
        },
    }
}

impl GraphicsPipeline {
    /// Links the program and builds the vertex array of a render pipeline.
    ///
    /// ## Arguments
    /// * `vertex` - The vertex module, already checked to be a vertex shader.
    /// * `fragment` - The fragment module, if any.
    #[allow(clippy::too_many_arguments)]
    pub fn create<G: GlApi + ?Sized>(
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        descriptor: &RenderPipelineDescriptor,
        vertex: &ShaderModuleDescriptor,
        fragment: Option<&ShaderModuleDescriptor>,
        max_texture_units: u32,
    ) -> Result<Self, ResourceError> {
        if descriptor.vertex_buffers_layout.len() > MAX_VERTEX_BINDINGS {
            return Err(PipelineError::FeatureNotSupported(format!(
                "{} vertex buffers (at most {MAX_VERTEX_BINDINGS})",
                descriptor.vertex_buffers_layout.len()
            ))
            .into());
        }
        if descriptor.primitive_state.polygon_mode != PolygonMode::Fill {
            log::warn!(
                "GlPipeline: Polygon mode {:?} is not available, '{}' renders filled",
                descriptor.primitive_state.polygon_mode,
                descriptor.label.as_deref().unwrap_or_default()
            );
        }
        let targets = &descriptor.color_target_states;
        if targets.iter().skip(1).any(|t| t != &targets[0]) {
            log::warn!(
                "GlPipeline: Per-target blend state differs in '{}', using target 0",
                descriptor.label.as_deref().unwrap_or_default()
            );
        }

        let mut stages = vec![(vertex, descriptor.vertex.specialization.as_slice())];
        if let (Some(module), Some(stage)) = (fragment, descriptor.fragment.as_ref()) {
            stages.push((module, stage.specialization.as_slice()));
        }
        let programs = ProgramSet::link(
            gl,
            state,
            cache,
            descriptor.label.clone(),
            &stages,
            max_texture_units,
        )?;

        let vertex_array = gl.create_vertex_array();
        if vertex_array == 0 {
            programs.release(gl, state, cache);
            return Err(ResourceError::BackendError(
                "glGenVertexArrays returned no name".to_string(),
            ));
        }
        state.bind_vertex_array(gl, vertex_array);
        let mut vertex_buffers = Vec::with_capacity(descriptor.vertex_buffers_layout.len());
        for (binding, layout) in descriptor.vertex_buffers_layout.iter().enumerate() {
            let binding = binding as u32;
            for attribute in &layout.attributes {
                let location = attribute.shader_location;
                let format: VertexAttribFormat = attribute.format.into_gl();
                gl.enable_vertex_attrib_array(location);
                if format.integer {
                    gl.vertex_attrib_format_i32(
                        location,
                        format.size,
                        format.data_type,
                        attribute.offset as u32,
                    );
                } else {
                    gl.vertex_attrib_format_f32(
                        location,
                        format.size,
                        format.data_type,
                        format.normalized,
                        attribute.offset as u32,
                    );
                }
                gl.vertex_attrib_binding(location, binding);
            }
            let per_instance = layout.step_mode == VertexStepMode::Instance;
            gl.vertex_binding_divisor(binding, u32::from(per_instance));
            vertex_buffers.push(VertexBufferSlot {
                stride: layout.array_stride as i32,
                per_instance,
            });
        }

        let c = descriptor.blend_constant;
        log::debug!(
            "GlPipeline: Created render pipeline '{}' (program {}, vao {vertex_array})",
            descriptor.label.as_deref().unwrap_or_default(),
            programs.base().program
        );
        Ok(Self {
            programs,
            layout: descriptor.layout,
            vertex_array,
            vertex_buffers,
            topology: descriptor.primitive_state.topology.into_gl(),
            render_state: render_state(descriptor),
            blend_constant: [c.r, c.g, c.b, c.a],
        })
    }

    /// Releases the programs and the vertex array.
    pub fn destroy<G: GlApi + ?Sized>(self, gl: &G, state: &mut StateCache, cache: &mut ShaderCache) {
        self.programs.release(gl, state, cache);
        state.forget_vertex_array(self.vertex_array);
        gl.delete_vertex_array(self.vertex_array);
    }
}

/// An emulated compute pipeline.
#[derive(Debug)]
pub struct ComputePipeline {
    /// The programs.
    pub programs: ProgramSet,
    /// The layout resources are validated against.
    pub layout: PipelineLayoutId,
}

impl ComputePipeline {
    /// Links the program of a compute pipeline.
    pub fn create<G: GlApi + ?Sized>(
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        descriptor: &ComputePipelineDescriptor,
        module: &ShaderModuleDescriptor,
        max_texture_units: u32,
    ) -> Result<Self, ResourceError> {
        let programs = ProgramSet::link(
            gl,
            state,
            cache,
            descriptor.label.clone(),
            &[(module, descriptor.compute.specialization.as_slice())],
            max_texture_units,
        )?;
        log::debug!(
            "GlPipeline: Created compute pipeline '{}' (program {})",
            descriptor.label.as_deref().unwrap_or_default(),
            programs.base().program
        );
        Ok(Self {
            programs,
            layout: descriptor.layout,
        })
    }

    /// Releases the programs.
    pub fn destroy<G: GlApi + ?Sized>(self, gl: &G, state: &mut StateCache, cache: &mut ShaderCache) {
        self.programs.release(gl, state, cache);
    }
}

/// Shader modules, pipeline layouts and pipelines created by the device.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    modules: HashMap<ShaderModuleId, ShaderModuleDescriptor>,
    /// Layouts by id.
    pub layouts: HashMap<PipelineLayoutId, PipelineLayoutDescriptor>,
    /// Render pipelines by id.
    pub render: HashMap<RenderPipelineId, GraphicsPipeline>,
    /// Compute pipelines by id.
    pub compute: HashMap<ComputePipelineId, ComputePipeline>,
    next_module_id: AtomicUsize,
    next_layout_id: AtomicUsize,
    next_render_id: AtomicUsize,
    next_compute_id: AtomicUsize,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_module_id(&self) -> ShaderModuleId {
        ShaderModuleId(self.next_module_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_layout_id(&self) -> PipelineLayoutId {
        PipelineLayoutId(self.next_layout_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_render_id(&self) -> RenderPipelineId {
        RenderPipelineId(self.next_render_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_compute_id(&self) -> ComputePipelineId {
        ComputePipelineId(self.next_compute_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Stores a shader module; it is compiled when a pipeline uses it.
    pub fn create_shader_module(&mut self, descriptor: &ShaderModuleDescriptor) -> ShaderModuleId {
        let id = self.generate_module_id();
        self.modules.insert(id, descriptor.clone());
        log::debug!(
            "GlPipeline: Registered {:?} shader module '{}' with ID: {:?}",
            descriptor.stage,
            descriptor.label.as_deref().unwrap_or_default(),
            id
        );
        id
    }

    /// Forgets a shader module.
    pub fn destroy_shader_module(&mut self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.modules
            .remove(&id)
            .map(|_| ())
            .ok_or(ShaderError::NotFound { id }.into())
    }

    fn module(&self, id: ShaderModuleId, expected: ShaderStage) -> Result<&ShaderModuleDescriptor, ResourceError> {
        let module = self.modules.get(&id).ok_or(ShaderError::NotFound { id })?;
        if module.stage != expected {
            return Err(ShaderError::StageMismatch {
                id,
                expected,
                found: module.stage,
            }
            .into());
        }
        Ok(module)
    }

    /// Stores a pipeline layout after checking it fits the binding table.
    pub fn create_layout(&mut self, descriptor: &PipelineLayoutDescriptor) -> Result<PipelineLayoutId, ResourceError> {
        if descriptor.set_layouts.len() > MAX_SETS {
            return Err(ResourceError::BindingOutOfRange {
                set: descriptor.set_layouts.len() as u32 - 1,
                binding: 0,
            });
        }
        for (set, layout) in descriptor.set_layouts.iter().enumerate() {
            if let Some(b) = layout.bindings.iter().find(|b| b.binding as usize >= MAX_BINDINGS) {
                return Err(ResourceError::BindingOutOfRange {
                    set: set as u32,
                    binding: b.binding,
                });
            }
        }
        let id = self.generate_layout_id();
        self.layouts.insert(id, descriptor.clone());
        Ok(id)
    }

    /// Forgets a pipeline layout.
    pub fn destroy_layout(&mut self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.layouts
            .remove(&id)
            .map(|_| ())
            .ok_or(PipelineError::InvalidPipelineLayout { id }.into())
    }

    /// Builds a render pipeline from registered modules.
    pub fn create_render<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        descriptor: &RenderPipelineDescriptor,
        max_texture_units: u32,
    ) -> Result<RenderPipelineId, ResourceError> {
        if !self.layouts.contains_key(&descriptor.layout) {
            return Err(PipelineError::InvalidPipelineLayout {
                id: descriptor.layout,
            }
            .into());
        }
        let vertex = self.module(descriptor.vertex.module, ShaderStage::Vertex)?;
        let fragment = match &descriptor.fragment {
            Some(stage) => Some(self.module(stage.module, ShaderStage::Fragment)?),
            None => None,
        };
        let pipeline =
            GraphicsPipeline::create(gl, state, cache, descriptor, vertex, fragment, max_texture_units)?;
        let id = self.generate_render_id();
        self.render.insert(id, pipeline);
        Ok(id)
    }

    /// Destroys a render pipeline.
    pub fn destroy_render<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        id: RenderPipelineId,
    ) -> Result<(), ResourceError> {
        let pipeline = self
            .render
            .remove(&id)
            .ok_or(PipelineError::InvalidRenderPipeline { id })?;
        pipeline.destroy(gl, state, cache);
        Ok(())
    }

    /// Builds a compute pipeline from a registered module.
    pub fn create_compute<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        descriptor: &ComputePipelineDescriptor,
        max_texture_units: u32,
    ) -> Result<ComputePipelineId, ResourceError> {
        if !gl.version().supports_compute() {
            return Err(PipelineError::FeatureNotSupported(
                "compute shaders need OpenGL 4.3 or OpenGL ES 3.1".to_string(),
            )
            .into());
        }
        if !self.layouts.contains_key(&descriptor.layout) {
            return Err(PipelineError::InvalidPipelineLayout {
                id: descriptor.layout,
            }
            .into());
        }
        let module = self.module(descriptor.compute.module, ShaderStage::Compute)?;
        let pipeline = ComputePipeline::create(gl, state, cache, descriptor, module, max_texture_units)?;
        let id = self.generate_compute_id();
        self.compute.insert(id, pipeline);
        Ok(id)
    }

    /// Destroys a compute pipeline.
    pub fn destroy_compute<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        cache: &mut ShaderCache,
        id: ComputePipelineId,
    ) -> Result<(), ResourceError> {
        let pipeline = self
            .compute
            .remove(&id)
            .ok_or(PipelineError::InvalidComputePipeline { id })?;
        pipeline.destroy(gl, state, cache);
        Ok(())
    }

    /// Destroys every pipeline and forgets every module and layout.
    pub fn destroy_all<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache, cache: &mut ShaderCache) {
        for (_, pipeline) in self.render.drain() {
            pipeline.destroy(gl, state, cache);
        }
        for (_, pipeline) in self.compute.drain() {
            pipeline.destroy(gl, state, cache);
        }
        self.modules.clear();
        self.layouts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use ember_core::renderer::{
        DepthStencilStateDescriptor, PipelineLayoutId, RenderPipelineDescriptor,
        ShaderModuleId, ShaderResource, ShaderStageDescriptor, SpecializationValue, VertexAttributeDescriptor, VertexBufferLayoutDescriptor,
        VertexFormat,
    };

    const VERTEX: &str = "#version 310 es\nlayout(location = 0) in vec3 position;\nvoid main() {}\n";
    const FRAGMENT: &str =
        "#version 310 es\nprecision mediump float;\nuniform sampler2D albedo;\nvoid main() {}\n";

    fn module(stage: ShaderStage, source: &str) -> ShaderModuleDescriptor {
        ShaderModuleDescriptor {
            label: None,
            stage,
            source: source.to_string(),
            reflection: ShaderReflection {
                combined_samplers: if stage == ShaderStage::Fragment {
                    vec![ShaderResource::new("albedo", 0, 0)]
                } else {
                    Vec::new()
                },
                ..Default::default()
            },
        }
    }

    fn descriptor(constants: Vec<SpecializationConstant>) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some("test".to_string()),
            vertex: ShaderStageDescriptor::new(ShaderModuleId(0)),
            fragment: Some(ShaderStageDescriptor {
                module: ShaderModuleId(1),
                specialization: constants,
            }),
            vertex_buffers_layout: vec![VertexBufferLayoutDescriptor {
                array_stride: 12,
                step_mode: VertexStepMode::Instance,
                attributes: vec![VertexAttributeDescriptor {
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                }],
            }],
            layout: PipelineLayoutId(0),
            primitive_state: Default::default(),
            depth_stencil_state: Some(DepthStencilStateDescriptor::default()),
            color_target_states: vec![Default::default()],
            multisample_state: Default::default(),
            blend_constant: Default::default(),
        }
    }

    #[test]
    fn external_patch_rewrites_only_named_samplers() {
        let source = "#version 310 es\nuniform sampler2D albedo;\nuniform sampler2D normal;\n";
        let patched = patch_external_samplers(source, &["albedo"]);
        assert_eq!(
            patched,
            "#version 310 es\n#extension GL_OES_EGL_image_external_essl3 : require\n\
             uniform samplerExternalOES albedo;\nuniform sampler2D normal;\n"
        );
        assert_eq!(patch_external_samplers(source, &["missing"]), source);
    }

    #[test]
    fn specialization_selects_the_program() {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut cache = ShaderCache::new();
        let vs = module(ShaderStage::Vertex, VERTEX);
        let fs = module(ShaderStage::Fragment, FRAGMENT);
        let d1 = vec![SpecializationConstant {
            id: 0,
            value: SpecializationValue::Int(1),
        }];
        let d2 = vec![SpecializationConstant {
            id: 0,
            value: SpecializationValue::Int(2),
        }];

        let p1 = GraphicsPipeline::create(&gl, &mut state, &mut cache, &descriptor(d1.clone()), &vs, Some(&fs), 16)
            .expect("p1");
        let p2 = GraphicsPipeline::create(&gl, &mut state, &mut cache, &descriptor(d2), &vs, Some(&fs), 16)
            .expect("p2");
        let p3 = GraphicsPipeline::create(&gl, &mut state, &mut cache, &descriptor(d1), &vs, Some(&fs), 16)
            .expect("p3");
        assert_ne!(p1.programs.base().program, p2.programs.base().program);
        assert_eq!(p1.programs.base().program, p3.programs.base().program);
        assert_eq!(cache.program_ref_count(p1.programs.base().program), Some(2));
        assert_eq!(
            gl.count(|c| matches!(c, GlCall::VertexBindingDivisor { binding: 0, divisor: 1 })),
            3
        );
        assert!(p1.render_state.depth.test_enabled);

        p1.destroy(&gl, &mut state, &mut cache);
        p3.destroy(&gl, &mut state, &mut cache);
        p2.destroy(&gl, &mut state, &mut cache);
        assert_eq!(cache.program_count(), 0);
    }

    #[test]
    fn compile_failures_become_pipeline_errors() {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut cache = ShaderCache::new();
        let vs = module(ShaderStage::Vertex, VERTEX);
        let fs = module(ShaderStage::Fragment, "#version 310 es\n#error broken\n");
        let result =
            GraphicsPipeline::create(&gl, &mut state, &mut cache, &descriptor(Vec::new()), &vs, Some(&fs), 16);
        assert!(matches!(
            result,
            Err(ResourceError::Pipeline(PipelineError::CompilationFailed { .. }))
        ));
        assert_eq!(cache.program_count(), 0);
    }

    #[test]
    fn external_variants_are_cached() {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut cache = ShaderCache::new();
        let vs = module(ShaderStage::Vertex, VERTEX);
        let fs = module(ShaderStage::Fragment, FRAGMENT);
        let mut pipeline =
            GraphicsPipeline::create(&gl, &mut state, &mut cache, &descriptor(Vec::new()), &vs, Some(&fs), 16)
                .expect("pipeline");
        let base = pipeline.programs.base().program;
        let variant = pipeline
            .programs
            .variant(&gl, &mut state, &mut cache, &[(0, 0)])
            .expect("variant")
            .program;
        assert_ne!(variant, base);
        let again = pipeline
            .programs
            .variant(&gl, &mut state, &mut cache, &[(0, 0)])
            .expect("variant")
            .program;
        assert_eq!(variant, again);
        assert_eq!(cache.program_count(), 2);
    }
}
