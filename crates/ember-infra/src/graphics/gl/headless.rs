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

//! A recording [`GlApi`] with no driver behind it.
//!
//! [`HeadlessGl`] simulates just enough of a context to exercise the backend:
//! object names are allocated and reused like a driver does, shaders fail to
//! compile when their source contains `#error`, programs fail to link when a
//! stage failed, and uniforms are active when their name appears in an
//! attached source. Every state-changing call is recorded as a [`GlCall`].

use super::context::{ContextProvider, RawContext};
use super::native::{
    BlitRect, GlApi, GlExtensions, GlName, GlVersion, SyncHandle, TexelRegion, UniformKind,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One recorded native call.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateBuffer(GlName),
    DeleteBuffer(GlName),
    CreateTexture(GlName),
    DeleteTexture(GlName),
    CreateSampler(GlName),
    DeleteSampler(GlName),
    CreateFramebuffer(GlName),
    DeleteFramebuffer(GlName),
    CreateVertexArray(GlName),
    DeleteVertexArray(GlName),
    CreateShader { shader: GlName, shader_type: u32 },
    CompileShader(GlName),
    DeleteShader(GlName),
    CreateProgram(GlName),
    AttachShader { program: GlName, shader: GlName },
    LinkProgram(GlName),
    DeleteProgram(GlName),
    UseProgram(GlName),
    UniformBlockBinding { program: GlName, index: u32, binding: u32 },
    ShaderStorageBlockBinding { program: GlName, index: u32, binding: u32 },
    Uniform1i { location: u32, value: i32 },
    UniformWords { location: u32, kind: UniformKind, components: u32, data: Vec<u32> },
    ActiveTexture(u32),
    BindTexture { target: u32, texture: GlName },
    BindSampler { unit: u32, sampler: GlName },
    BindImageTexture { unit: u32, texture: GlName, level: i32, layered: bool, layer: i32, access: u32, format: u32 },
    BindBuffer { target: u32, buffer: GlName },
    BindBufferRange { target: u32, index: u32, buffer: GlName, offset: i32, size: i32 },
    BindBufferBase { target: u32, index: u32, buffer: GlName },
    BindFramebuffer { target: u32, framebuffer: GlName },
    BindVertexArray(GlName),
    BindVertexBuffer { binding: u32, buffer: GlName, offset: i32, stride: i32 },
    EnableVertexAttribArray(u32),
    VertexAttribFormat { index: u32, size: i32, data_type: u32, normalized: bool, integer: bool, offset: u32 },
    VertexAttribBinding { index: u32, binding: u32 },
    VertexBindingDivisor { binding: u32, divisor: u32 },
    BufferData { target: u32, size: i32, usage: u32 },
    BufferSubData { target: u32, offset: i32, len: usize },
    CopyBufferSubData { src_target: u32, dst_target: u32, src_offset: i32, dst_offset: i32, size: i32 },
    TexStorage { target: u32, levels: i32, internal_format: u32, width: i32, height: i32, depth: i32, samples: i32 },
    TexParameter { target: u32, parameter: u32, value: i32 },
    TexSubImage { target: u32, level: i32, region: TexelRegion, format: u32, data_type: u32, offset: u32 },
    ReadPixels { x: i32, y: i32, width: i32, height: i32, format: u32, data_type: u32, offset: u32 },
    PixelStore { parameter: u32, value: i32 },
    SamplerParameterI { sampler: GlName, parameter: u32, value: i32 },
    SamplerParameterF { sampler: GlName, parameter: u32, value: f32 },
    FramebufferTexture2D { target: u32, attachment: u32, texture_target: u32, texture: GlName, level: i32 },
    FramebufferTextureLayer { target: u32, attachment: u32, texture: GlName, level: i32, layer: i32 },
    DrawBuffers(Vec<u32>),
    ReadBuffer(u32),
    InvalidateFramebuffer { target: u32, attachments: Vec<u32> },
    BlitFramebuffer { src: BlitRect, dst: BlitRect, mask: u32, filter: u32 },
    ClearBufferF { buffer: u32, draw_buffer: i32, values: [f32; 4] },
    ClearBufferI { buffer: u32, draw_buffer: i32, values: [i32; 4] },
    ClearBufferU { buffer: u32, draw_buffer: i32, values: [u32; 4] },
    ClearDepthStencil { depth: f32, stencil: i32 },
    DrawArraysInstanced { mode: u32, first: i32, count: i32, instances: i32 },
    DrawElementsInstancedBaseVertex { mode: u32, count: i32, index_type: u32, offset: i32, instances: i32, base_vertex: i32 },
    DrawArraysIndirect { mode: u32, offset: i32 },
    DrawElementsIndirect { mode: u32, index_type: u32, offset: i32 },
    DispatchCompute { x: u32, y: u32, z: u32 },
    DispatchComputeIndirect(i32),
    MemoryBarrier(u32),
    MemoryBarrierByRegion(u32),
    Enable(u32),
    Disable(u32),
    Viewport([i32; 4]),
    DepthRange(f32, f32),
    Scissor([i32; 4]),
    LineWidth(f32),
    FrontFace(u32),
    CullFace(u32),
    PolygonOffset(f32, f32),
    DepthFunc(u32),
    DepthMask(bool),
    StencilFuncSeparate { face: u32, func: u32, reference: i32, mask: u32 },
    StencilOpSeparate { face: u32, fail: u32, depth_fail: u32, pass: u32 },
    StencilMaskSeparate { face: u32, mask: u32 },
    ColorMask([bool; 4]),
    BlendEquationSeparate(u32, u32),
    BlendFuncSeparate([u32; 4]),
    BlendColor([f32; 4]),
    FenceSync(SyncHandle),
    ClientWaitSync(SyncHandle),
    WaitSync(SyncHandle),
    DeleteSync(SyncHandle),
    Flush,
}

impl GlCall {
    /// Returns `true` for calls that change a binding point.
    pub fn is_bind(&self) -> bool {
        matches!(
            self,
            GlCall::ActiveTexture(_)
                | GlCall::BindTexture { .. }
                | GlCall::BindSampler { .. }
                | GlCall::BindImageTexture { .. }
                | GlCall::BindBuffer { .. }
                | GlCall::BindBufferRange { .. }
                | GlCall::BindBufferBase { .. }
                | GlCall::BindFramebuffer { .. }
                | GlCall::BindVertexArray(_)
                | GlCall::BindVertexBuffer { .. }
                | GlCall::UseProgram(_)
        )
    }
}

/// The native object kinds whose names the headless backend allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Buffer objects.
    Buffer,
    /// Texture objects.
    Texture,
    /// Sampler objects.
    Sampler,
    /// Framebuffer objects.
    Framebuffer,
    /// Vertex array objects.
    VertexArray,
    /// Shader objects.
    Shader,
    /// Program objects.
    Program,
}

#[derive(Debug, Default)]
struct NamePool {
    live: BTreeSet<GlName>,
}

impl NamePool {
    /// Allocates the lowest free non-zero name.
    fn allocate(&mut self) -> GlName {
        let mut name = 1;
        for live in &self.live {
            if *live != name {
                break;
            }
            name += 1;
        }
        self.live.insert(name);
        name
    }

    fn release(&mut self, name: GlName) -> bool {
        self.live.remove(&name)
    }
}

#[derive(Debug, Default)]
struct ShaderObject {
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<GlName>,
    linked: bool,
    log: String,
    /// Names resolved so far, in query order; the position is the index or
    /// location returned.
    resolved: Vec<String>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    pools: HashMap<ObjectKind, NamePool>,
    shaders: HashMap<GlName, ShaderObject>,
    programs: HashMap<GlName, ProgramObject>,
    inactive: HashSet<String>,
    framebuffer_complete: bool,
    next_fence: SyncHandle,
    live_fences: BTreeSet<SyncHandle>,
    calls: Vec<GlCall>,
}

/// A [`GlApi`] that records calls instead of rendering.
#[derive(Debug)]
pub struct HeadlessGl {
    version: GlVersion,
    extensions: GlExtensions,
    state: RefCell<HeadlessState>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGl {
    /// A desktop OpenGL 4.5 context with every optional extension.
    pub fn new() -> Self {
        Self::with_version(
            GlVersion {
                major: 4,
                minor: 5,
                is_embedded: false,
            },
            GlExtensions::all(),
        )
    }

    /// A context reporting the given version and extensions.
    pub fn with_version(version: GlVersion, extensions: GlExtensions) -> Self {
        Self {
            version,
            extensions,
            state: RefCell::new(HeadlessState {
                framebuffer_complete: true,
                next_fence: 1,
                ..Default::default()
            }),
        }
    }

    /// A copy of every call recorded since the last [`clear_calls`](Self::clear_calls).
    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Counts recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// The number of live objects of `kind`.
    pub fn live_objects(&self, kind: ObjectKind) -> usize {
        self.state
            .borrow()
            .pools
            .get(&kind)
            .map_or(0, |pool| pool.live.len())
    }

    /// The number of fences created and not yet deleted.
    pub fn live_fences(&self) -> usize {
        self.state.borrow().live_fences.len()
    }

    /// Makes the linker report `name` as inactive even if a source uses it.
    pub fn set_inactive_uniform(&self, name: impl Into<String>) {
        self.state.borrow_mut().inactive.insert(name.into());
    }

    /// Controls the status returned by `check_framebuffer_status`.
    pub fn set_framebuffer_complete(&self, complete: bool) {
        self.state.borrow_mut().framebuffer_complete = complete;
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn allocate(&self, kind: ObjectKind) -> GlName {
        self.state
            .borrow_mut()
            .pools
            .entry(kind)
            .or_default()
            .allocate()
    }

    fn release(&self, kind: ObjectKind, name: GlName) -> bool {
        self.state
            .borrow_mut()
            .pools
            .get_mut(&kind)
            .is_some_and(|pool| pool.release(name))
    }

    /// Resolves an interface name of a linked program, the way the driver
    /// answers index and location queries.
    fn resolve(&self, program: GlName, name: &str) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        if state.inactive.contains(name) {
            return None;
        }
        let base = name.split('[').next().unwrap_or(name).to_string();
        let HeadlessState {
            shaders, programs, ..
        } = &mut *state;
        let object = programs.get_mut(&program)?;
        if !object.linked {
            return None;
        }
        let used = object.shaders.iter().any(|s| {
            shaders
                .get(s)
                .is_some_and(|shader| shader.source.contains(base.as_str()))
        });
        if !used {
            return None;
        }
        let index = match object.resolved.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                object.resolved.push(name.to_string());
                object.resolved.len() - 1
            }
        };
        Some(index as u32)
    }
}

impl GlApi for HeadlessGl {
    fn version(&self) -> GlVersion {
        self.version
    }

    fn extensions(&self) -> GlExtensions {
        self.extensions
    }

    fn create_buffer(&self) -> GlName {
        let name = self.allocate(ObjectKind::Buffer);
        self.record(GlCall::CreateBuffer(name));
        name
    }

    fn delete_buffer(&self, buffer: GlName) {
        self.release(ObjectKind::Buffer, buffer);
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn create_texture(&self) -> GlName {
        let name = self.allocate(ObjectKind::Texture);
        self.record(GlCall::CreateTexture(name));
        name
    }

    fn delete_texture(&self, texture: GlName) {
        self.release(ObjectKind::Texture, texture);
        self.record(GlCall::DeleteTexture(texture));
    }

    fn create_sampler(&self) -> GlName {
        let name = self.allocate(ObjectKind::Sampler);
        self.record(GlCall::CreateSampler(name));
        name
    }

    fn delete_sampler(&self, sampler: GlName) {
        self.release(ObjectKind::Sampler, sampler);
        self.record(GlCall::DeleteSampler(sampler));
    }

    fn create_framebuffer(&self) -> GlName {
        let name = self.allocate(ObjectKind::Framebuffer);
        self.record(GlCall::CreateFramebuffer(name));
        name
    }

    fn delete_framebuffer(&self, framebuffer: GlName) {
        self.release(ObjectKind::Framebuffer, framebuffer);
        self.record(GlCall::DeleteFramebuffer(framebuffer));
    }

    fn create_vertex_array(&self) -> GlName {
        let name = self.allocate(ObjectKind::VertexArray);
        self.record(GlCall::CreateVertexArray(name));
        name
    }

    fn delete_vertex_array(&self, vertex_array: GlName) {
        self.release(ObjectKind::VertexArray, vertex_array);
        self.record(GlCall::DeleteVertexArray(vertex_array));
    }

    fn create_shader(&self, shader_type: u32) -> GlName {
        let name = self.allocate(ObjectKind::Shader);
        self.state
            .borrow_mut()
            .shaders
            .insert(name, ShaderObject::default());
        self.record(GlCall::CreateShader {
            shader: name,
            shader_type,
        });
        name
    }

    fn shader_source(&self, shader: GlName, source: &str) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: GlName) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader) {
            object.compiled = !object.source.contains("#error");
        }
        self.record(GlCall::CompileShader(shader));
    }

    fn get_shader_compile_status(&self, shader: GlName) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled)
    }

    fn get_shader_info_log(&self, shader: GlName) -> String {
        match self.state.borrow().shaders.get(&shader) {
            Some(s) if !s.compiled => format!("0:1: '#error' : compilation terminated (shader {shader})"),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: GlName) {
        if self.release(ObjectKind::Shader, shader) {
            self.state.borrow_mut().shaders.remove(&shader);
        }
        self.record(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> GlName {
        let name = self.allocate(ObjectKind::Program);
        self.state
            .borrow_mut()
            .programs
            .insert(name, ProgramObject::default());
        self.record(GlCall::CreateProgram(name));
        name
    }

    fn attach_shader(&self, program: GlName, shader: GlName) {
        if let Some(object) = self.state.borrow_mut().programs.get_mut(&program) {
            object.shaders.push(shader);
        }
        self.record(GlCall::AttachShader { program, shader });
    }

    fn link_program(&self, program: GlName) {
        {
            let mut state = self.state.borrow_mut();
            let HeadlessState {
                shaders, programs, ..
            } = &mut *state;
            if let Some(object) = programs.get_mut(&program) {
                let all_compiled = object
                    .shaders
                    .iter()
                    .all(|s| shaders.get(s).is_some_and(|shader| shader.compiled));
                object.linked = !object.shaders.is_empty() && all_compiled;
                object.log = if object.linked {
                    String::new()
                } else if object.shaders.is_empty() {
                    "error: no shaders attached".to_string()
                } else {
                    "error: attached shader is not compiled".to_string()
                };
            }
        }
        self.record(GlCall::LinkProgram(program));
    }

    fn get_program_link_status(&self, program: GlName) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn get_program_info_log(&self, program: GlName) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: GlName) {
        if self.release(ObjectKind::Program, program) {
            self.state.borrow_mut().programs.remove(&program);
        }
        self.record(GlCall::DeleteProgram(program));
    }

    fn use_program(&self, program: GlName) {
        self.record(GlCall::UseProgram(program));
    }

    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32> {
        self.resolve(program, name)
    }

    fn uniform_block_binding(&self, program: GlName, index: u32, binding: u32) {
        self.record(GlCall::UniformBlockBinding {
            program,
            index,
            binding,
        });
    }

    fn get_shader_storage_block_index(&self, program: GlName, name: &str) -> Option<u32> {
        self.resolve(program, name)
    }

    fn shader_storage_block_binding(&self, program: GlName, index: u32, binding: u32) {
        self.record(GlCall::ShaderStorageBlockBinding {
            program,
            index,
            binding,
        });
    }

    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<u32> {
        self.resolve(program, name)
    }

    fn uniform_1_i32(&self, location: u32, value: i32) {
        self.record(GlCall::Uniform1i { location, value });
    }

    fn uniform_words(&self, location: u32, kind: UniformKind, components: u32, data: &[u32]) {
        self.record(GlCall::UniformWords {
            location,
            kind,
            components,
            data: data.to_vec(),
        });
    }

    fn active_texture(&self, unit: u32) {
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, target: u32, texture: GlName) {
        self.record(GlCall::BindTexture { target, texture });
    }

    fn bind_sampler(&self, unit: u32, sampler: GlName) {
        self.record(GlCall::BindSampler { unit, sampler });
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: GlName,
        level: i32,
        layered: bool,
        layer: i32,
        access: u32,
        format: u32,
    ) {
        self.record(GlCall::BindImageTexture {
            unit,
            texture,
            level,
            layered,
            layer,
            access,
            format,
        });
    }

    fn bind_buffer(&self, target: u32, buffer: GlName) {
        self.record(GlCall::BindBuffer { target, buffer });
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: GlName, offset: i32, size: i32) {
        self.record(GlCall::BindBufferRange {
            target,
            index,
            buffer,
            offset,
            size,
        });
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: GlName) {
        self.record(GlCall::BindBufferBase {
            target,
            index,
            buffer,
        });
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: GlName) {
        self.record(GlCall::BindFramebuffer {
            target,
            framebuffer,
        });
    }

    fn bind_vertex_array(&self, vertex_array: GlName) {
        self.record(GlCall::BindVertexArray(vertex_array));
    }

    fn bind_vertex_buffer(&self, binding: u32, buffer: GlName, offset: i32, stride: i32) {
        self.record(GlCall::BindVertexBuffer {
            binding,
            buffer,
            offset,
            stride,
        });
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn vertex_attrib_format_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        offset: u32,
    ) {
        self.record(GlCall::VertexAttribFormat {
            index,
            size,
            data_type,
            normalized,
            integer: false,
            offset,
        });
    }

    fn vertex_attrib_format_i32(&self, index: u32, size: i32, data_type: u32, offset: u32) {
        self.record(GlCall::VertexAttribFormat {
            index,
            size,
            data_type,
            normalized: false,
            integer: true,
            offset,
        });
    }

    fn vertex_attrib_binding(&self, index: u32, binding: u32) {
        self.record(GlCall::VertexAttribBinding { index, binding });
    }

    fn vertex_binding_divisor(&self, binding: u32, divisor: u32) {
        self.record(GlCall::VertexBindingDivisor { binding, divisor });
    }

    fn buffer_data_size(&self, target: u32, size: i32, usage: u32) {
        self.record(GlCall::BufferData {
            target,
            size,
            usage,
        });
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        self.record(GlCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    ) {
        self.record(GlCall::CopyBufferSubData {
            src_target,
            dst_target,
            src_offset,
            dst_offset,
            size,
        });
    }

    fn tex_storage_2d(&self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32) {
        self.record(GlCall::TexStorage {
            target,
            levels,
            internal_format,
            width,
            height,
            depth: 1,
            samples: 1,
        });
    }

    fn tex_storage_3d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    ) {
        self.record(GlCall::TexStorage {
            target,
            levels,
            internal_format,
            width,
            height,
            depth,
            samples: 1,
        });
    }

    fn tex_storage_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        self.record(GlCall::TexStorage {
            target,
            levels: 1,
            internal_format,
            width,
            height,
            depth: 1,
            samples,
        });
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        self.record(GlCall::TexParameter {
            target,
            parameter,
            value,
        });
    }

    fn tex_sub_image_from_buffer(
        &self,
        target: u32,
        level: i32,
        region: TexelRegion,
        format: u32,
        data_type: u32,
        buffer_offset: u32,
    ) {
        self.record(GlCall::TexSubImage {
            target,
            level,
            region,
            format,
            data_type,
            offset: buffer_offset,
        });
    }

    fn read_pixels_to_buffer(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        buffer_offset: u32,
    ) {
        self.record(GlCall::ReadPixels {
            x,
            y,
            width,
            height,
            format,
            data_type,
            offset: buffer_offset,
        });
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        self.record(GlCall::PixelStore { parameter, value });
    }

    fn sampler_parameter_i32(&self, sampler: GlName, parameter: u32, value: i32) {
        self.record(GlCall::SamplerParameterI {
            sampler,
            parameter,
            value,
        });
    }

    fn sampler_parameter_f32(&self, sampler: GlName, parameter: u32, value: f32) {
        self.record(GlCall::SamplerParameterF {
            sampler,
            parameter,
            value,
        });
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: GlName,
        level: i32,
    ) {
        self.record(GlCall::FramebufferTexture2D {
            target,
            attachment,
            texture_target,
            texture,
            level,
        });
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: GlName,
        level: i32,
        layer: i32,
    ) {
        self.record(GlCall::FramebufferTextureLayer {
            target,
            attachment,
            texture,
            level,
            layer,
        });
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        if self.state.borrow().framebuffer_complete {
            glow::FRAMEBUFFER_COMPLETE
        } else {
            glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
        }
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        self.record(GlCall::DrawBuffers(buffers.to_vec()));
    }

    fn read_buffer(&self, buffer: u32) {
        self.record(GlCall::ReadBuffer(buffer));
    }

    fn invalidate_framebuffer(&self, target: u32, attachments: &[u32]) {
        self.record(GlCall::InvalidateFramebuffer {
            target,
            attachments: attachments.to_vec(),
        });
    }

    fn blit_framebuffer(&self, src: BlitRect, dst: BlitRect, mask: u32, filter: u32) {
        self.record(GlCall::BlitFramebuffer {
            src,
            dst,
            mask,
            filter,
        });
    }

    fn clear_buffer_f32(&self, buffer: u32, draw_buffer: i32, values: &[f32]) {
        let mut stored = [0.0; 4];
        for (dst, src) in stored.iter_mut().zip(values) {
            *dst = *src;
        }
        self.record(GlCall::ClearBufferF {
            buffer,
            draw_buffer,
            values: stored,
        });
    }

    fn clear_buffer_i32(&self, buffer: u32, draw_buffer: i32, values: &[i32]) {
        let mut stored = [0; 4];
        for (dst, src) in stored.iter_mut().zip(values) {
            *dst = *src;
        }
        self.record(GlCall::ClearBufferI {
            buffer,
            draw_buffer,
            values: stored,
        });
    }

    fn clear_buffer_u32(&self, buffer: u32, draw_buffer: i32, values: &[u32]) {
        let mut stored = [0; 4];
        for (dst, src) in stored.iter_mut().zip(values) {
            *dst = *src;
        }
        self.record(GlCall::ClearBufferU {
            buffer,
            draw_buffer,
            values: stored,
        });
    }

    fn clear_buffer_depth_stencil(&self, depth: f32, stencil: i32) {
        self.record(GlCall::ClearDepthStencil { depth, stencil });
    }

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32) {
        self.record(GlCall::DrawArraysInstanced {
            mode,
            first,
            count,
            instances,
        });
    }

    fn draw_elements_instanced_base_vertex(
        &self,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
    ) {
        self.record(GlCall::DrawElementsInstancedBaseVertex {
            mode,
            count,
            index_type,
            offset,
            instances,
            base_vertex,
        });
    }

    fn draw_arrays_indirect(&self, mode: u32, offset: i32) {
        self.record(GlCall::DrawArraysIndirect { mode, offset });
    }

    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: i32) {
        self.record(GlCall::DrawElementsIndirect {
            mode,
            index_type,
            offset,
        });
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        self.record(GlCall::DispatchCompute { x, y, z });
    }

    fn dispatch_compute_indirect(&self, offset: i32) {
        self.record(GlCall::DispatchComputeIndirect(offset));
    }

    fn memory_barrier(&self, barriers: u32) {
        self.record(GlCall::MemoryBarrier(barriers));
    }

    fn memory_barrier_by_region(&self, barriers: u32) {
        self.record(GlCall::MemoryBarrierByRegion(barriers));
    }

    fn enable(&self, capability: u32) {
        self.record(GlCall::Enable(capability));
    }

    fn disable(&self, capability: u32) {
        self.record(GlCall::Disable(capability));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport([x, y, width, height]));
    }

    fn depth_range(&self, near: f32, far: f32) {
        self.record(GlCall::DepthRange(near, far));
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Scissor([x, y, width, height]));
    }

    fn line_width(&self, width: f32) {
        self.record(GlCall::LineWidth(width));
    }

    fn front_face(&self, mode: u32) {
        self.record(GlCall::FrontFace(mode));
    }

    fn cull_face(&self, mode: u32) {
        self.record(GlCall::CullFace(mode));
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        self.record(GlCall::PolygonOffset(factor, units));
    }

    fn depth_func(&self, func: u32) {
        self.record(GlCall::DepthFunc(func));
    }

    fn depth_mask(&self, enabled: bool) {
        self.record(GlCall::DepthMask(enabled));
    }

    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32) {
        self.record(GlCall::StencilFuncSeparate {
            face,
            func,
            reference,
            mask,
        });
    }

    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        self.record(GlCall::StencilOpSeparate {
            face,
            fail,
            depth_fail,
            pass,
        });
    }

    fn stencil_mask_separate(&self, face: u32, mask: u32) {
        self.record(GlCall::StencilMaskSeparate { face, mask });
    }

    fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.record(GlCall::ColorMask([red, green, blue, alpha]));
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        self.record(GlCall::BlendEquationSeparate(mode_rgb, mode_alpha));
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.record(GlCall::BlendFuncSeparate([
            src_rgb, dst_rgb, src_alpha, dst_alpha,
        ]));
    }

    fn blend_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(GlCall::BlendColor([red, green, blue, alpha]));
    }

    fn fence_sync(&self) -> SyncHandle {
        let handle = {
            let mut state = self.state.borrow_mut();
            let handle = state.next_fence;
            state.next_fence += 1;
            state.live_fences.insert(handle);
            handle
        };
        self.record(GlCall::FenceSync(handle));
        handle
    }

    fn client_wait_sync(&self, sync: SyncHandle, _timeout_ns: u64) -> u32 {
        self.record(GlCall::ClientWaitSync(sync));
        glow::ALREADY_SIGNALED
    }

    fn wait_sync(&self, sync: SyncHandle) {
        self.record(GlCall::WaitSync(sync));
    }

    fn delete_sync(&self, sync: SyncHandle) {
        self.state.borrow_mut().live_fences.remove(&sync);
        self.record(GlCall::DeleteSync(sync));
    }

    fn flush(&self) {
        self.record(GlCall::Flush);
    }
}

/// A [`ContextProvider`] that only tracks which context is current.
#[derive(Debug)]
pub struct HeadlessContext {
    own: RawContext,
    current: Option<RawContext>,
    switches: usize,
    presented: Vec<u64>,
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessContext {
    /// A provider with no context current.
    pub fn new() -> Self {
        Self {
            own: RawContext(1),
            current: None,
            switches: 0,
            presented: Vec::new(),
        }
    }

    /// A provider where some foreign context is current.
    pub fn with_current(current: RawContext) -> Self {
        Self {
            current: Some(current),
            ..Self::new()
        }
    }

    /// The number of `make_current` calls so far.
    pub fn switches(&self) -> usize {
        self.switches
    }

    /// The surfaces presented so far, in order.
    pub fn presented(&self) -> &[u64] {
        &self.presented
    }
}

impl ContextProvider for HeadlessContext {
    fn current(&self) -> Option<RawContext> {
        self.current
    }

    fn own(&self) -> RawContext {
        self.own
    }

    fn make_current(&mut self, context: Option<RawContext>) -> Result<(), String> {
        self.switches += 1;
        self.current = context;
        Ok(())
    }

    fn swap_buffers(&mut self, surface: u64) -> Result<(), String> {
        if self.current != Some(self.own) {
            return Err("context is not current".to_string());
        }
        self.presented.push(surface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_reuse_lowest_free_slot() {
        let gl = HeadlessGl::new();
        let a = gl.create_texture();
        let b = gl.create_texture();
        let c = gl.create_texture();
        assert_eq!((a, b, c), (1, 2, 3));
        gl.delete_texture(b);
        assert_eq!(gl.create_texture(), 2, "freed name must be reused");
        assert_eq!(gl.live_objects(ObjectKind::Texture), 3);
    }

    #[test]
    fn compile_and_link_outcomes_follow_sources() {
        let gl = HeadlessGl::new();
        let good = gl.create_shader(glow::VERTEX_SHADER);
        gl.shader_source(good, "#version 430\nvoid main() {}");
        gl.compile_shader(good);
        let bad = gl.create_shader(glow::FRAGMENT_SHADER);
        gl.shader_source(bad, "#version 430\n#error broken\n");
        gl.compile_shader(bad);

        assert!(gl.get_shader_compile_status(good));
        assert!(!gl.get_shader_compile_status(bad));
        assert!(!gl.get_shader_info_log(bad).is_empty());

        let program = gl.create_program();
        gl.attach_shader(program, good);
        gl.attach_shader(program, bad);
        gl.link_program(program);
        assert!(!gl.get_program_link_status(program));
    }

    #[test]
    fn uniforms_are_active_when_referenced() {
        let gl = HeadlessGl::new();
        let vs = gl.create_shader(glow::VERTEX_SHADER);
        gl.shader_source(vs, "uniform sampler2D albedo[4];\nuniform Globals {};");
        gl.compile_shader(vs);
        let program = gl.create_program();
        gl.attach_shader(program, vs);
        gl.link_program(program);
        gl.set_inactive_uniform("albedo[2]");

        assert!(gl.get_uniform_location(program, "albedo[0]").is_some());
        assert!(gl.get_uniform_location(program, "albedo[2]").is_none());
        assert!(gl.get_uniform_block_index(program, "Globals").is_some());
        assert!(gl.get_uniform_location(program, "missing").is_none());
    }
}
