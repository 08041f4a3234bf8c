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

//! Mirror of the native binding points and fixed-function state.
//!
//! Every bind goes through [`StateCache`], which issues the native call only
//! when the cached value differs. A slot holding `None` is unknown, so the
//! next bind to it is always issued. Before a native object is deleted its
//! `forget_*` method clears every slot that refers to it.

use super::native::{GlApi, GlName, TEXTURE_EXTERNAL_OES};
use std::collections::HashMap;

const TEXTURE_TARGETS: [u32; 8] = [
    glow::TEXTURE_2D,
    glow::TEXTURE_2D_ARRAY,
    glow::TEXTURE_3D,
    glow::TEXTURE_CUBE_MAP,
    glow::TEXTURE_CUBE_MAP_ARRAY,
    glow::TEXTURE_2D_MULTISAMPLE,
    glow::TEXTURE_2D_MULTISAMPLE_ARRAY,
    TEXTURE_EXTERNAL_OES,
];

const BUFFER_TARGETS: [u32; 9] = [
    glow::ARRAY_BUFFER,
    glow::COPY_READ_BUFFER,
    glow::COPY_WRITE_BUFFER,
    glow::PIXEL_PACK_BUFFER,
    glow::PIXEL_UNPACK_BUFFER,
    glow::UNIFORM_BUFFER,
    glow::SHADER_STORAGE_BUFFER,
    glow::DRAW_INDIRECT_BUFFER,
    glow::DISPATCH_INDIRECT_BUFFER,
];

/// Indexed uniform and storage buffer binding points tracked per target.
pub const MAX_INDEXED_BUFFERS: usize = 32;
/// Image units tracked.
pub const MAX_IMAGE_UNITS: usize = 8;
/// Vertex buffer binding slots tracked per vertex array.
pub const MAX_VERTEX_BINDINGS: usize = 16;

fn texture_slot(target: u32) -> Option<usize> {
    TEXTURE_TARGETS.iter().position(|t| *t == target)
}

fn buffer_slot(target: u32) -> Option<usize> {
    BUFFER_TARGETS.iter().position(|t| *t == target)
}

/// Native binds issued and skipped since the counters were last taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindCounters {
    /// Binds sent to the driver.
    pub issued: u32,
    /// Binds skipped because the slot already held the value.
    pub suppressed: u32,
}

/// Stores `value` in `slot` and reports whether the native call is needed.
fn update<T: PartialEq + Copy>(
    slot: &mut Option<T>,
    value: T,
    counters: &mut BindCounters,
) -> bool {
    if *slot == Some(value) {
        counters.suppressed += 1;
        false
    } else {
        *slot = Some(value);
        counters.issued += 1;
        true
    }
}

/// Like [`update`], for fixed-function state that is not counted as a bind.
fn changed<T: PartialEq + Copy>(slot: &mut Option<T>, value: T) -> bool {
    if *slot == Some(value) {
        false
    } else {
        *slot = Some(value);
        true
    }
}

/// The arguments of an image unit binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageUnitBinding {
    /// The texture, `0` for none.
    pub texture: GlName,
    /// The mip level.
    pub level: i32,
    /// Binds every layer when `true`.
    pub layered: bool,
    /// The layer bound when not layered.
    pub layer: i32,
    /// `READ_ONLY`, `WRITE_ONLY` or `READ_WRITE`.
    pub access: u32,
    /// The internal format the shader sees.
    pub format: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferRange {
    buffer: GlName,
    offset: i32,
    size: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VertexBinding {
    buffer: GlName,
    offset: i32,
    stride: i32,
}

/// Bindings stored in a vertex array object rather than in the context.
#[derive(Debug, Clone, Default)]
struct VertexArrayState {
    element_buffer: Option<GlName>,
    vertex_buffers: [Option<VertexBinding>; MAX_VERTEX_BINDINGS],
}

/// Depth test state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    /// `DEPTH_TEST` enabled.
    pub test_enabled: bool,
    /// Depth writes enabled.
    pub write_enabled: bool,
    /// The comparison function.
    pub func: u32,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enabled: false,
            write_enabled: true,
            func: glow::LESS,
        }
    }
}

/// Stencil state of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFace {
    /// The comparison function.
    pub func: u32,
    /// The reference value.
    pub reference: i32,
    /// The compare mask.
    pub compare_mask: u32,
    /// Operation when the stencil test fails.
    pub fail: u32,
    /// Operation when the depth test fails.
    pub depth_fail: u32,
    /// Operation when both tests pass.
    pub pass: u32,
    /// The write mask.
    pub write_mask: u32,
}

impl Default for StencilFace {
    fn default() -> Self {
        Self {
            func: glow::ALWAYS,
            reference: 0,
            compare_mask: 0xff,
            fail: glow::KEEP,
            depth_fail: glow::KEEP,
            pass: glow::KEEP,
            write_mask: 0xff,
        }
    }
}

/// Stencil test state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilState {
    /// `STENCIL_TEST` enabled.
    pub enabled: bool,
    /// Front faces.
    pub front: StencilFace,
    /// Back faces.
    pub back: StencilFace,
}

/// Blend state, shared by every draw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    /// `BLEND` enabled.
    pub enabled: bool,
    /// Color and alpha equations.
    pub equation: [u32; 2],
    /// Source color, destination color, source alpha, destination alpha.
    pub func: [u32; 4],
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            equation: [glow::FUNC_ADD, glow::FUNC_ADD],
            func: [glow::ONE, glow::ZERO, glow::ONE, glow::ZERO],
        }
    }
}

/// Rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    /// The culled faces, `None` when culling is disabled.
    pub cull_face: Option<u32>,
    /// `CW` or `CCW`.
    pub front_face: u32,
    /// Polygon offset factor and units, `None` when disabled.
    pub polygon_offset: Option<(f32, f32)>,
    /// `RASTERIZER_DISCARD` enabled.
    pub rasterizer_discard: bool,
    /// `PRIMITIVE_RESTART_FIXED_INDEX` enabled.
    pub primitive_restart: bool,
    /// `SAMPLE_ALPHA_TO_COVERAGE` enabled.
    pub alpha_to_coverage: bool,
    /// Width of rasterized lines.
    pub line_width: f32,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_face: None,
            front_face: glow::CCW,
            polygon_offset: None,
            rasterizer_discard: false,
            primitive_restart: false,
            alpha_to_coverage: false,
            line_width: 1.0,
        }
    }
}

/// The complete fixed-function state a draw depends on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderState {
    /// Depth state.
    pub depth: DepthState,
    /// Stencil state.
    pub stencil: StencilState,
    /// Blend state.
    pub blend: BlendState,
    /// Color write mask.
    pub color_mask: [bool; 4],
    /// Rasterizer state.
    pub raster: RasterState,
}

/// Cached mirror of the context's binding points and fixed-function state.
#[derive(Debug)]
pub struct StateCache {
    active_unit: Option<u32>,
    textures: Vec<[Option<GlName>; TEXTURE_TARGETS.len()]>,
    samplers: Vec<Option<GlName>>,
    images: [Option<ImageUnitBinding>; MAX_IMAGE_UNITS],
    buffers: [Option<GlName>; BUFFER_TARGETS.len()],
    uniform_ranges: [Option<BufferRange>; MAX_INDEXED_BUFFERS],
    storage_ranges: [Option<BufferRange>; MAX_INDEXED_BUFFERS],
    read_framebuffer: Option<GlName>,
    draw_framebuffer: Option<GlName>,
    vertex_array: Option<GlName>,
    vertex_arrays: HashMap<GlName, VertexArrayState>,
    program: Option<GlName>,

    capabilities: HashMap<u32, bool>,
    depth_func: Option<u32>,
    depth_mask: Option<bool>,
    stencil_func: [Option<(u32, i32, u32)>; 2],
    stencil_op: [Option<(u32, u32, u32)>; 2],
    stencil_write_mask: [Option<u32>; 2],
    blend_equation: Option<[u32; 2]>,
    blend_func: Option<[u32; 4]>,
    blend_color: Option<[f32; 4]>,
    color_mask: Option<[bool; 4]>,
    cull_face: Option<u32>,
    front_face: Option<u32>,
    polygon_offset: Option<(f32, f32)>,
    line_width: Option<f32>,
    viewport: Option<[i32; 4]>,
    depth_range: Option<(f32, f32)>,
    scissor: Option<[i32; 4]>,

    counters: BindCounters,
}

impl StateCache {
    /// Creates a cache where every slot is unknown.
    ///
    /// ## Arguments
    /// * `texture_units` - Number of texture units tracked.
    pub fn new(texture_units: usize) -> Self {
        Self {
            active_unit: None,
            textures: vec![[None; TEXTURE_TARGETS.len()]; texture_units],
            samplers: vec![None; texture_units],
            images: [None; MAX_IMAGE_UNITS],
            buffers: [None; BUFFER_TARGETS.len()],
            uniform_ranges: [None; MAX_INDEXED_BUFFERS],
            storage_ranges: [None; MAX_INDEXED_BUFFERS],
            read_framebuffer: None,
            draw_framebuffer: None,
            vertex_array: None,
            vertex_arrays: HashMap::new(),
            program: None,
            capabilities: HashMap::new(),
            depth_func: None,
            depth_mask: None,
            stencil_func: [None; 2],
            stencil_op: [None; 2],
            stencil_write_mask: [None; 2],
            blend_equation: None,
            blend_func: None,
            blend_color: None,
            color_mask: None,
            cull_face: None,
            front_face: None,
            polygon_offset: None,
            line_width: None,
            viewport: None,
            depth_range: None,
            scissor: None,
            counters: BindCounters::default(),
        }
    }

    /// Forgets every mirrored value, keeping the counters.
    ///
    /// Used when code outside the backend may have touched the context.
    pub fn invalidate(&mut self) {
        let counters = self.counters;
        *self = Self::new(self.textures.len());
        self.counters = counters;
    }

    /// Returns the counters and resets them.
    pub fn take_counters(&mut self) -> BindCounters {
        std::mem::take(&mut self.counters)
    }

    /// The counters accumulated so far.
    pub fn counters(&self) -> BindCounters {
        self.counters
    }

    // --- Textures and samplers ---

    fn select_unit<G: GlApi + ?Sized>(&mut self, gl: &G, unit: u32) {
        if update(&mut self.active_unit, unit, &mut self.counters) {
            gl.active_texture(unit);
        }
    }

    /// Binds `texture` to `target` of texture unit `unit`.
    ///
    /// External textures are always rebound: the unit's external target is
    /// reset to zero first so the driver latches the current platform image.
    pub fn bind_texture<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        unit: u32,
        target: u32,
        texture: GlName,
    ) {
        let slot = texture_slot(target);
        let (Some(slot), true) = (slot, (unit as usize) < self.textures.len()) else {
            log::warn!("StateCache: Untracked texture binding (unit {unit}, target {target:#x}).");
            gl.active_texture(unit);
            gl.bind_texture(target, texture);
            self.active_unit = Some(unit);
            self.counters.issued += 1;
            return;
        };
        if target == TEXTURE_EXTERNAL_OES {
            self.select_unit(gl, unit);
            gl.bind_texture(target, 0);
            gl.bind_texture(target, texture);
            self.textures[unit as usize][slot] = Some(texture);
            self.counters.issued += 2;
            return;
        }
        if self.textures[unit as usize][slot] == Some(texture) {
            self.counters.suppressed += 1;
            return;
        }
        self.select_unit(gl, unit);
        gl.bind_texture(target, texture);
        self.textures[unit as usize][slot] = Some(texture);
        self.counters.issued += 1;
    }

    /// Binds `texture` like [`Self::bind_texture`] and leaves `unit` active,
    /// for calls that edit the texture bound to the active unit.
    pub fn bind_texture_for_edit<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        unit: u32,
        target: u32,
        texture: GlName,
    ) {
        self.bind_texture(gl, unit, target, texture);
        self.select_unit(gl, unit);
    }

    /// Binds `sampler` to texture unit `unit`.
    pub fn bind_sampler<G: GlApi + ?Sized>(&mut self, gl: &G, unit: u32, sampler: GlName) {
        match self.samplers.get_mut(unit as usize) {
            Some(slot) => {
                if update(slot, sampler, &mut self.counters) {
                    gl.bind_sampler(unit, sampler);
                }
            }
            None => {
                gl.bind_sampler(unit, sampler);
                self.counters.issued += 1;
            }
        }
    }

    /// Binds a texture level to image unit `unit`.
    pub fn bind_image<G: GlApi + ?Sized>(&mut self, gl: &G, unit: u32, binding: ImageUnitBinding) {
        let issue = match self.images.get_mut(unit as usize) {
            Some(slot) => update(slot, binding, &mut self.counters),
            None => {
                self.counters.issued += 1;
                true
            }
        };
        if issue {
            gl.bind_image_texture(
                unit,
                binding.texture,
                binding.level,
                binding.layered,
                binding.layer,
                binding.access,
                binding.format,
            );
        }
    }

    /// The texture cached for `target` of `unit`.
    pub fn bound_texture(&self, unit: u32, target: u32) -> Option<GlName> {
        let slot = texture_slot(target)?;
        self.textures.get(unit as usize).and_then(|unit| unit[slot])
    }

    // --- Buffers ---

    /// Binds `buffer` to a generic target.
    ///
    /// `ELEMENT_ARRAY_BUFFER` is recorded in the bound vertex array.
    pub fn bind_buffer<G: GlApi + ?Sized>(&mut self, gl: &G, target: u32, buffer: GlName) {
        if target == glow::ELEMENT_ARRAY_BUFFER {
            let issue = match self.vertex_array {
                Some(vao) => {
                    let state = self.vertex_arrays.entry(vao).or_default();
                    update(&mut state.element_buffer, buffer, &mut self.counters)
                }
                None => {
                    self.counters.issued += 1;
                    true
                }
            };
            if issue {
                gl.bind_buffer(target, buffer);
            }
            return;
        }
        let issue = match buffer_slot(target) {
            Some(slot) => update(&mut self.buffers[slot], buffer, &mut self.counters),
            None => {
                self.counters.issued += 1;
                true
            }
        };
        if issue {
            gl.bind_buffer(target, buffer);
        }
    }

    /// Binds a range of `buffer` to an indexed uniform or storage binding
    /// point. A zero `buffer` unbinds the point.
    ///
    /// The generic binding of `target` changes as a side effect, as it does
    /// natively.
    pub fn bind_buffer_range<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        target: u32,
        index: u32,
        buffer: GlName,
        offset: i32,
        size: i32,
    ) {
        let range = if buffer == 0 {
            BufferRange {
                buffer: 0,
                offset: 0,
                size: 0,
            }
        } else {
            BufferRange {
                buffer,
                offset,
                size,
            }
        };
        let ranges = match target {
            glow::UNIFORM_BUFFER => Some(&mut self.uniform_ranges),
            glow::SHADER_STORAGE_BUFFER => Some(&mut self.storage_ranges),
            _ => None,
        };
        let issue = match ranges.and_then(|r| r.get_mut(index as usize)) {
            Some(slot) => update(slot, range, &mut self.counters),
            None => {
                self.counters.issued += 1;
                true
            }
        };
        if !issue {
            return;
        }
        if buffer == 0 {
            gl.bind_buffer_base(target, index, 0);
        } else {
            gl.bind_buffer_range(target, index, buffer, offset, size);
        }
        if let Some(slot) = buffer_slot(target) {
            self.buffers[slot] = Some(buffer);
        }
    }

    // --- Framebuffers ---

    /// Binds `framebuffer` to `FRAMEBUFFER`, `READ_FRAMEBUFFER` or
    /// `DRAW_FRAMEBUFFER`.
    pub fn bind_framebuffer<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        target: u32,
        framebuffer: GlName,
    ) {
        match target {
            glow::FRAMEBUFFER => {
                if self.read_framebuffer == Some(framebuffer)
                    && self.draw_framebuffer == Some(framebuffer)
                {
                    self.counters.suppressed += 1;
                    return;
                }
                gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer);
                self.read_framebuffer = Some(framebuffer);
                self.draw_framebuffer = Some(framebuffer);
                self.counters.issued += 1;
            }
            glow::READ_FRAMEBUFFER => {
                if update(&mut self.read_framebuffer, framebuffer, &mut self.counters) {
                    gl.bind_framebuffer(target, framebuffer);
                }
            }
            glow::DRAW_FRAMEBUFFER => {
                if update(&mut self.draw_framebuffer, framebuffer, &mut self.counters) {
                    gl.bind_framebuffer(target, framebuffer);
                }
            }
            _ => {
                gl.bind_framebuffer(target, framebuffer);
                self.counters.issued += 1;
            }
        }
    }

    /// Binds the read and draw framebuffers, with a single combined call
    /// when they are the same object.
    pub fn bind_framebuffers<G: GlApi + ?Sized>(&mut self, gl: &G, read: GlName, draw: GlName) {
        if read == draw {
            self.bind_framebuffer(gl, glow::FRAMEBUFFER, read);
        } else {
            self.bind_framebuffer(gl, glow::READ_FRAMEBUFFER, read);
            self.bind_framebuffer(gl, glow::DRAW_FRAMEBUFFER, draw);
        }
    }

    /// The cached read and draw framebuffers.
    pub fn bound_framebuffers(&self) -> (Option<GlName>, Option<GlName>) {
        (self.read_framebuffer, self.draw_framebuffer)
    }

    // --- Vertex input and program ---

    /// Binds a vertex array object.
    pub fn bind_vertex_array<G: GlApi + ?Sized>(&mut self, gl: &G, vertex_array: GlName) {
        if update(&mut self.vertex_array, vertex_array, &mut self.counters) {
            gl.bind_vertex_array(vertex_array);
        }
    }

    /// Binds a vertex buffer to `binding` of the bound vertex array.
    pub fn bind_vertex_buffer<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        binding: u32,
        buffer: GlName,
        offset: i32,
        stride: i32,
    ) {
        let value = VertexBinding {
            buffer,
            offset,
            stride,
        };
        let issue = match self.vertex_array {
            Some(vao) if (binding as usize) < MAX_VERTEX_BINDINGS => {
                let state = self.vertex_arrays.entry(vao).or_default();
                update(
                    &mut state.vertex_buffers[binding as usize],
                    value,
                    &mut self.counters,
                )
            }
            _ => {
                self.counters.issued += 1;
                true
            }
        };
        if issue {
            gl.bind_vertex_buffer(binding, buffer, offset, stride);
        }
    }

    /// Makes `program` current.
    pub fn use_program<G: GlApi + ?Sized>(&mut self, gl: &G, program: GlName) {
        if update(&mut self.program, program, &mut self.counters) {
            gl.use_program(program);
        }
    }

    /// The cached current program.
    pub fn bound_program(&self) -> Option<GlName> {
        self.program
    }

    // --- Scrubbing before deletion ---

    /// Clears every slot that refers to `texture`.
    pub fn forget_texture(&mut self, texture: GlName) {
        for unit in &mut self.textures {
            for slot in unit.iter_mut() {
                if *slot == Some(texture) {
                    *slot = None;
                }
            }
        }
        for slot in &mut self.images {
            if slot.is_some_and(|binding| binding.texture == texture) {
                *slot = None;
            }
        }
    }

    /// Clears every slot that refers to `buffer`.
    pub fn forget_buffer(&mut self, buffer: GlName) {
        for slot in &mut self.buffers {
            if *slot == Some(buffer) {
                *slot = None;
            }
        }
        for slot in self
            .uniform_ranges
            .iter_mut()
            .chain(self.storage_ranges.iter_mut())
        {
            if slot.is_some_and(|range| range.buffer == buffer) {
                *slot = None;
            }
        }
        for state in self.vertex_arrays.values_mut() {
            if state.element_buffer == Some(buffer) {
                state.element_buffer = None;
            }
            for slot in &mut state.vertex_buffers {
                if slot.is_some_and(|binding| binding.buffer == buffer) {
                    *slot = None;
                }
            }
        }
    }

    /// Clears every slot that refers to `sampler`.
    pub fn forget_sampler(&mut self, sampler: GlName) {
        for slot in &mut self.samplers {
            if *slot == Some(sampler) {
                *slot = None;
            }
        }
    }

    /// Clears every slot that refers to `framebuffer`.
    pub fn forget_framebuffer(&mut self, framebuffer: GlName) {
        if self.read_framebuffer == Some(framebuffer) {
            self.read_framebuffer = None;
        }
        if self.draw_framebuffer == Some(framebuffer) {
            self.draw_framebuffer = None;
        }
    }

    /// Clears every slot that refers to `vertex_array`, including the
    /// bindings stored inside it.
    pub fn forget_vertex_array(&mut self, vertex_array: GlName) {
        self.vertex_arrays.remove(&vertex_array);
        if self.vertex_array == Some(vertex_array) {
            self.vertex_array = None;
        }
    }

    /// Clears the current program slot if it holds `program`.
    pub fn forget_program(&mut self, program: GlName) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    // --- Fixed-function state ---

    /// Enables or disables a capability.
    pub fn set_capability<G: GlApi + ?Sized>(&mut self, gl: &G, capability: u32, enabled: bool) {
        if self.capabilities.get(&capability) == Some(&enabled) {
            return;
        }
        self.capabilities.insert(capability, enabled);
        if enabled {
            gl.enable(capability);
        } else {
            gl.disable(capability);
        }
    }

    /// Applies a pipeline's fixed-function state, re-issuing only the parts
    /// that changed.
    pub fn apply_render_state<G: GlApi + ?Sized>(&mut self, gl: &G, state: &RenderState) {
        let depth = &state.depth;
        self.set_capability(gl, glow::DEPTH_TEST, depth.test_enabled);
        if depth.test_enabled && changed(&mut self.depth_func, depth.func) {
            gl.depth_func(depth.func);
        }
        self.set_depth_write(gl, depth.write_enabled);

        let stencil = &state.stencil;
        self.set_capability(gl, glow::STENCIL_TEST, stencil.enabled);
        if stencil.enabled {
            let faces = [(&stencil.front, glow::FRONT), (&stencil.back, glow::BACK)];
            for (index, (face, gl_face)) in faces.into_iter().enumerate() {
                if changed(
                    &mut self.stencil_func[index],
                    (face.func, face.reference, face.compare_mask),
                ) {
                    gl.stencil_func_separate(gl_face, face.func, face.reference, face.compare_mask);
                }
                if changed(
                    &mut self.stencil_op[index],
                    (face.fail, face.depth_fail, face.pass),
                ) {
                    gl.stencil_op_separate(gl_face, face.fail, face.depth_fail, face.pass);
                }
            }
        }
        self.set_stencil_write_masks(gl, stencil.front.write_mask, stencil.back.write_mask);

        let blend = &state.blend;
        self.set_capability(gl, glow::BLEND, blend.enabled);
        if blend.enabled {
            if changed(&mut self.blend_equation, blend.equation) {
                gl.blend_equation_separate(blend.equation[0], blend.equation[1]);
            }
            if changed(&mut self.blend_func, blend.func) {
                gl.blend_func_separate(blend.func[0], blend.func[1], blend.func[2], blend.func[3]);
            }
        }
        self.set_color_mask(gl, state.color_mask);

        let raster = &state.raster;
        self.set_capability(gl, glow::CULL_FACE, raster.cull_face.is_some());
        if let Some(mode) = raster.cull_face {
            if changed(&mut self.cull_face, mode) {
                gl.cull_face(mode);
            }
        }
        if changed(&mut self.front_face, raster.front_face) {
            gl.front_face(raster.front_face);
        }
        self.set_capability(gl, glow::POLYGON_OFFSET_FILL, raster.polygon_offset.is_some());
        if let Some(offset) = raster.polygon_offset {
            if changed(&mut self.polygon_offset, offset) {
                gl.polygon_offset(offset.0, offset.1);
            }
        }
        self.set_capability(gl, glow::RASTERIZER_DISCARD, raster.rasterizer_discard);
        self.set_capability(
            gl,
            glow::PRIMITIVE_RESTART_FIXED_INDEX,
            raster.primitive_restart,
        );
        self.set_capability(gl, glow::SAMPLE_ALPHA_TO_COVERAGE, raster.alpha_to_coverage);
        self.set_line_width(gl, raster.line_width);
    }

    /// Sets the color write mask.
    pub fn set_color_mask<G: GlApi + ?Sized>(&mut self, gl: &G, mask: [bool; 4]) {
        if changed(&mut self.color_mask, mask) {
            gl.color_mask(mask[0], mask[1], mask[2], mask[3]);
        }
    }

    /// Sets the depth write mask.
    pub fn set_depth_write<G: GlApi + ?Sized>(&mut self, gl: &G, enabled: bool) {
        if changed(&mut self.depth_mask, enabled) {
            gl.depth_mask(enabled);
        }
    }

    /// Sets the stencil write masks of both faces.
    pub fn set_stencil_write_masks<G: GlApi + ?Sized>(&mut self, gl: &G, front: u32, back: u32) {
        if changed(&mut self.stencil_write_mask[0], front) {
            gl.stencil_mask_separate(glow::FRONT, front);
        }
        if changed(&mut self.stencil_write_mask[1], back) {
            gl.stencil_mask_separate(glow::BACK, back);
        }
    }

    /// Opens every write mask and disables the scissor test, so that a clear
    /// reaches every texel of its attachment.
    pub fn prepare_clear<G: GlApi + ?Sized>(&mut self, gl: &G) {
        self.set_color_mask(gl, [true; 4]);
        self.set_depth_write(gl, true);
        self.set_stencil_write_masks(gl, 0xff, 0xff);
        self.set_capability(gl, glow::SCISSOR_TEST, false);
        self.set_capability(gl, glow::RASTERIZER_DISCARD, false);
    }

    /// Sets the viewport rectangle.
    pub fn set_viewport<G: GlApi + ?Sized>(&mut self, gl: &G, rect: [i32; 4]) {
        if changed(&mut self.viewport, rect) {
            gl.viewport(rect[0], rect[1], rect[2], rect[3]);
        }
    }

    /// Sets the depth range.
    pub fn set_depth_range<G: GlApi + ?Sized>(&mut self, gl: &G, near: f32, far: f32) {
        if changed(&mut self.depth_range, (near, far)) {
            gl.depth_range(near, far);
        }
    }

    /// Sets the scissor rectangle, or disables the scissor test with `None`.
    pub fn set_scissor<G: GlApi + ?Sized>(&mut self, gl: &G, rect: Option<[i32; 4]>) {
        self.set_capability(gl, glow::SCISSOR_TEST, rect.is_some());
        if let Some(rect) = rect {
            if changed(&mut self.scissor, rect) {
                gl.scissor(rect[0], rect[1], rect[2], rect[3]);
            }
        }
    }

    /// Sets the rasterized line width.
    pub fn set_line_width<G: GlApi + ?Sized>(&mut self, gl: &G, width: f32) {
        if changed(&mut self.line_width, width) {
            gl.line_width(width);
        }
    }

    /// Sets the blend constant color.
    pub fn set_blend_color<G: GlApi + ?Sized>(&mut self, gl: &G, color: [f32; 4]) {
        if changed(&mut self.blend_color, color) {
            gl.blend_color(color[0], color[1], color[2], color[3]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};

    #[test]
    fn repeated_texture_bind_is_suppressed() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(16);
        cache.bind_texture(&gl, 3, glow::TEXTURE_2D, 7);
        cache.bind_texture(&gl, 3, glow::TEXTURE_2D, 7);

        assert_eq!(
            gl.count(|c| matches!(c, GlCall::BindTexture { .. })),
            1,
            "second bind of the same texture must be skipped"
        );
        assert_eq!(gl.count(|c| matches!(c, GlCall::ActiveTexture(3))), 1);
        assert_eq!(cache.counters().suppressed, 1);
    }

    #[test]
    fn edit_bind_reselects_the_unit_on_a_hit() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.bind_texture(&gl, 0, glow::TEXTURE_2D, 1);
        cache.bind_texture(&gl, 1, glow::TEXTURE_2D, 2);
        gl.clear_calls();

        cache.bind_texture_for_edit(&gl, 0, glow::TEXTURE_2D, 1);
        assert_eq!(gl.calls(), vec![GlCall::ActiveTexture(0)]);

        gl.clear_calls();
        cache.bind_texture_for_edit(&gl, 0, glow::TEXTURE_2D, 1);
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn external_texture_rebinds_through_zero() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(16);
        cache.bind_texture(&gl, 0, TEXTURE_EXTERNAL_OES, 5);
        cache.bind_texture(&gl, 0, TEXTURE_EXTERNAL_OES, 5);

        let binds: Vec<_> = gl
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GlCall::BindTexture { texture, .. } => Some(texture),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![0, 5, 0, 5]);
    }

    #[test]
    fn same_read_and_draw_framebuffer_collapse() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.bind_framebuffers(&gl, 4, 4);
        cache.bind_framebuffers(&gl, 4, 4);
        cache.bind_framebuffers(&gl, 4, 9);

        assert_eq!(
            gl.calls(),
            vec![
                GlCall::BindFramebuffer {
                    target: glow::FRAMEBUFFER,
                    framebuffer: 4
                },
                GlCall::BindFramebuffer {
                    target: glow::DRAW_FRAMEBUFFER,
                    framebuffer: 9
                },
            ]
        );
    }

    #[test]
    fn forgotten_objects_are_rebound() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.bind_texture(&gl, 0, glow::TEXTURE_2D, 2);
        cache.bind_buffer(&gl, glow::COPY_WRITE_BUFFER, 6);
        cache.forget_texture(2);
        cache.forget_buffer(6);
        assert_eq!(cache.bound_texture(0, glow::TEXTURE_2D), None);

        gl.clear_calls();
        cache.bind_texture(&gl, 0, glow::TEXTURE_2D, 2);
        cache.bind_buffer(&gl, glow::COPY_WRITE_BUFFER, 6);
        assert_eq!(gl.count(GlCall::is_bind), 2);
    }

    #[test]
    fn buffer_range_updates_generic_binding() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.bind_buffer_range(&gl, glow::UNIFORM_BUFFER, 1, 3, 256, 64);
        gl.clear_calls();
        cache.bind_buffer(&gl, glow::UNIFORM_BUFFER, 3);
        cache.bind_buffer_range(&gl, glow::UNIFORM_BUFFER, 1, 3, 256, 64);
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn element_buffer_is_tracked_per_vertex_array() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.bind_vertex_array(&gl, 1);
        cache.bind_buffer(&gl, glow::ELEMENT_ARRAY_BUFFER, 8);
        cache.bind_vertex_array(&gl, 2);
        cache.bind_buffer(&gl, glow::ELEMENT_ARRAY_BUFFER, 8);
        cache.bind_vertex_array(&gl, 1);
        gl.clear_calls();
        cache.bind_buffer(&gl, glow::ELEMENT_ARRAY_BUFFER, 8);
        assert!(gl.calls().is_empty(), "VAO 1 still holds buffer 8");
    }

    #[test]
    fn render_state_reissues_only_changed_groups() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        let mut state = RenderState {
            color_mask: [true; 4],
            ..Default::default()
        };
        state.depth.test_enabled = true;
        cache.apply_render_state(&gl, &state);
        gl.clear_calls();

        cache.apply_render_state(&gl, &state);
        assert!(gl.calls().is_empty(), "identical state must not emit calls");

        state.depth.func = glow::LEQUAL;
        cache.apply_render_state(&gl, &state);
        assert_eq!(gl.calls(), vec![GlCall::DepthFunc(glow::LEQUAL)]);
    }

    #[test]
    fn invalidate_forces_rebinds_and_keeps_counters() {
        let gl = HeadlessGl::new();
        let mut cache = StateCache::new(4);
        cache.use_program(&gl, 3);
        cache.invalidate();
        cache.use_program(&gl, 3);
        assert_eq!(gl.count(|c| matches!(c, GlCall::UseProgram(3))), 2);
        assert_eq!(cache.take_counters().issued, 2);
        assert_eq!(cache.counters(), BindCounters::default());
    }
}
