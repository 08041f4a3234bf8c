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

//! [`GlApi`] implementation on top of `glow`.

use super::native::{
    BlitRect, GlApi, GlExtensions, GlName, GlVersion, SyncHandle, TexelRegion, UniformKind,
};
use anyhow::{bail, Result};
use glow::HasContext;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::num::NonZeroU32;

fn buffer(name: GlName) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(name).map(glow::NativeBuffer)
}

fn texture(name: GlName) -> Option<glow::NativeTexture> {
    NonZeroU32::new(name).map(glow::NativeTexture)
}

fn sampler(name: GlName) -> Option<glow::NativeSampler> {
    NonZeroU32::new(name).map(glow::NativeSampler)
}

fn framebuffer(name: GlName) -> Option<glow::NativeFramebuffer> {
    NonZeroU32::new(name).map(glow::NativeFramebuffer)
}

fn vertex_array(name: GlName) -> Option<glow::NativeVertexArray> {
    NonZeroU32::new(name).map(glow::NativeVertexArray)
}

fn shader(name: GlName) -> Option<glow::NativeShader> {
    NonZeroU32::new(name).map(glow::NativeShader)
}

fn program(name: GlName) -> Option<glow::NativeProgram> {
    NonZeroU32::new(name).map(glow::NativeProgram)
}

fn created<T>(what: &str, result: Result<T, String>, name: impl FnOnce(T) -> GlName) -> GlName {
    match result {
        Ok(object) => name(object),
        Err(e) => {
            log::error!("GlowApi: Failed to create {what}: {e}");
            0
        }
    }
}

/// Drives a real OpenGL or OpenGL ES context through `glow`.
///
/// Every method forwards to the matching `glow` entry point. The calls are
/// `unsafe` because the driver must have this context current on the calling
/// thread; the device only issues them between `activate` and `deactivate`.
pub struct GlowApi {
    gl: glow::Context,
    version: GlVersion,
    extensions: GlExtensions,
    fences: RefCell<HashMap<SyncHandle, glow::NativeFence>>,
    next_fence: Cell<SyncHandle>,
}

impl std::fmt::Debug for GlowApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowApi")
            .field("version", &self.version)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl GlowApi {
    /// Wraps a loaded `glow` context.
    ///
    /// ## Arguments
    /// * `gl` - A context whose function pointers are loaded and which is
    ///   current on this thread.
    ///
    /// ## Returns
    /// The adapter, or an error if the context cannot run compute shaders,
    /// storage buffers and vertex attribute bindings.
    pub fn new(gl: glow::Context) -> Result<Self> {
        let native = gl.version();
        let version = GlVersion {
            major: native.major,
            minor: native.minor,
            is_embedded: native.is_embedded,
        };
        if !version.supports_compute() {
            bail!(
                "OpenGL{} {}.{} is too old; OpenGL 4.3 or OpenGL ES 3.1 is required",
                if version.is_embedded { " ES" } else { "" },
                version.major,
                version.minor
            );
        }
        let extensions =
            GlExtensions::from_names(gl.supported_extensions().iter().map(String::as_str));
        log::info!(
            "GlowApi: Using OpenGL{} {}.{} ({})",
            if version.is_embedded { " ES" } else { "" },
            version.major,
            version.minor,
            native.vendor_info
        );
        log::debug!("GlowApi: Extensions {extensions:?}");
        Ok(Self {
            gl,
            version,
            extensions,
            fences: RefCell::new(HashMap::new()),
            next_fence: Cell::new(1),
        })
    }

    /// Loads the entry points with `loader` and wraps the resulting context.
    ///
    /// # Safety
    /// The context the loader belongs to must be current on this thread.
    pub unsafe fn from_loader<F>(loader: F) -> Result<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        let gl = unsafe { glow::Context::from_loader_function(loader) };
        Self::new(gl)
    }

    fn fence(&self, sync: SyncHandle) -> Option<glow::NativeFence> {
        self.fences.borrow().get(&sync).copied()
    }
}

impl GlApi for GlowApi {
    fn version(&self) -> GlVersion {
        self.version
    }

    fn extensions(&self) -> GlExtensions {
        self.extensions
    }

    fn create_buffer(&self) -> GlName {
        created("buffer", unsafe { self.gl.create_buffer() }, |b| b.0.get())
    }

    fn delete_buffer(&self, name: GlName) {
        if let Some(b) = buffer(name) {
            unsafe { self.gl.delete_buffer(b) }
        }
    }

    fn create_texture(&self) -> GlName {
        created("texture", unsafe { self.gl.create_texture() }, |t| t.0.get())
    }

    fn delete_texture(&self, name: GlName) {
        if let Some(t) = texture(name) {
            unsafe { self.gl.delete_texture(t) }
        }
    }

    fn create_sampler(&self) -> GlName {
        created("sampler", unsafe { self.gl.create_sampler() }, |s| s.0.get())
    }

    fn delete_sampler(&self, name: GlName) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.delete_sampler(s) }
        }
    }

    fn create_framebuffer(&self) -> GlName {
        created("framebuffer", unsafe { self.gl.create_framebuffer() }, |f| {
            f.0.get()
        })
    }

    fn delete_framebuffer(&self, name: GlName) {
        if let Some(f) = framebuffer(name) {
            unsafe { self.gl.delete_framebuffer(f) }
        }
    }

    fn create_vertex_array(&self) -> GlName {
        created(
            "vertex array",
            unsafe { self.gl.create_vertex_array() },
            |v| v.0.get(),
        )
    }

    fn delete_vertex_array(&self, name: GlName) {
        if let Some(v) = vertex_array(name) {
            unsafe { self.gl.delete_vertex_array(v) }
        }
    }

    fn create_shader(&self, shader_type: u32) -> GlName {
        created("shader", unsafe { self.gl.create_shader(shader_type) }, |s| {
            s.0.get()
        })
    }

    fn shader_source(&self, name: GlName, source: &str) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.shader_source(s, source) }
        }
    }

    fn compile_shader(&self, name: GlName) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.compile_shader(s) }
        }
    }

    fn get_shader_compile_status(&self, name: GlName) -> bool {
        shader(name).is_some_and(|s| unsafe { self.gl.get_shader_compile_status(s) })
    }

    fn get_shader_info_log(&self, name: GlName) -> String {
        shader(name)
            .map(|s| unsafe { self.gl.get_shader_info_log(s) })
            .unwrap_or_default()
    }

    fn delete_shader(&self, name: GlName) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.delete_shader(s) }
        }
    }

    fn create_program(&self) -> GlName {
        created("program", unsafe { self.gl.create_program() }, |p| p.0.get())
    }

    fn attach_shader(&self, program_name: GlName, shader_name: GlName) {
        if let (Some(p), Some(s)) = (program(program_name), shader(shader_name)) {
            unsafe { self.gl.attach_shader(p, s) }
        }
    }

    fn link_program(&self, name: GlName) {
        if let Some(p) = program(name) {
            unsafe { self.gl.link_program(p) }
        }
    }

    fn get_program_link_status(&self, name: GlName) -> bool {
        program(name).is_some_and(|p| unsafe { self.gl.get_program_link_status(p) })
    }

    fn get_program_info_log(&self, name: GlName) -> String {
        program(name)
            .map(|p| unsafe { self.gl.get_program_info_log(p) })
            .unwrap_or_default()
    }

    fn delete_program(&self, name: GlName) {
        if let Some(p) = program(name) {
            unsafe { self.gl.delete_program(p) }
        }
    }

    fn use_program(&self, name: GlName) {
        unsafe { self.gl.use_program(program(name)) }
    }

    fn get_uniform_block_index(&self, name: GlName, block: &str) -> Option<u32> {
        program(name).and_then(|p| unsafe { self.gl.get_uniform_block_index(p, block) })
    }

    fn uniform_block_binding(&self, name: GlName, index: u32, binding: u32) {
        if let Some(p) = program(name) {
            unsafe { self.gl.uniform_block_binding(p, index, binding) }
        }
    }

    fn get_shader_storage_block_index(&self, name: GlName, block: &str) -> Option<u32> {
        program(name).and_then(|p| unsafe { self.gl.get_shader_storage_block_index(p, block) })
    }

    fn shader_storage_block_binding(&self, name: GlName, index: u32, binding: u32) {
        if let Some(p) = program(name) {
            unsafe { self.gl.shader_storage_block_binding(p, index, binding) }
        }
    }

    fn get_uniform_location(&self, name: GlName, uniform: &str) -> Option<u32> {
        program(name)
            .and_then(|p| unsafe { self.gl.get_uniform_location(p, uniform) })
            .map(|location| location.0)
    }

    fn uniform_1_i32(&self, location: u32, value: i32) {
        let location = glow::NativeUniformLocation(location);
        unsafe { self.gl.uniform_1_i32(Some(&location), value) }
    }

    fn uniform_words(&self, location: u32, kind: UniformKind, components: u32, data: &[u32]) {
        let location = glow::NativeUniformLocation(location);
        let loc = Some(&location);
        let floats: &[f32] = bytemuck::cast_slice(data);
        let ints: &[i32] = bytemuck::cast_slice(data);
        unsafe {
            match (kind, components) {
                (UniformKind::Float, 1) => self.gl.uniform_1_f32_slice(loc, floats),
                (UniformKind::Float, 2) => self.gl.uniform_2_f32_slice(loc, floats),
                (UniformKind::Float, 3) => self.gl.uniform_3_f32_slice(loc, floats),
                (UniformKind::Float, _) => self.gl.uniform_4_f32_slice(loc, floats),
                (UniformKind::Int, 1) => self.gl.uniform_1_i32_slice(loc, ints),
                (UniformKind::Int, 2) => self.gl.uniform_2_i32_slice(loc, ints),
                (UniformKind::Int, 3) => self.gl.uniform_3_i32_slice(loc, ints),
                (UniformKind::Int, _) => self.gl.uniform_4_i32_slice(loc, ints),
                (UniformKind::UInt, 1) => self.gl.uniform_1_u32_slice(loc, data),
                (UniformKind::UInt, 2) => self.gl.uniform_2_u32_slice(loc, data),
                (UniformKind::UInt, 3) => self.gl.uniform_3_u32_slice(loc, data),
                (UniformKind::UInt, _) => self.gl.uniform_4_u32_slice(loc, data),
                (UniformKind::Mat3, _) => self.gl.uniform_matrix_3_f32_slice(loc, false, floats),
                (UniformKind::Mat4, _) => self.gl.uniform_matrix_4_f32_slice(loc, false, floats),
            }
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: u32, name: GlName) {
        unsafe { self.gl.bind_texture(target, texture(name)) }
    }

    fn bind_sampler(&self, unit: u32, name: GlName) {
        unsafe { self.gl.bind_sampler(unit, sampler(name)) }
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        name: GlName,
        level: i32,
        layered: bool,
        layer: i32,
        access: u32,
        format: u32,
    ) {
        unsafe {
            self.gl
                .bind_image_texture(unit, texture(name), level, layered, layer, access, format)
        }
    }

    fn bind_buffer(&self, target: u32, name: GlName) {
        unsafe { self.gl.bind_buffer(target, buffer(name)) }
    }

    fn bind_buffer_range(&self, target: u32, index: u32, name: GlName, offset: i32, size: i32) {
        unsafe {
            self.gl
                .bind_buffer_range(target, index, buffer(name), offset, size)
        }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, name: GlName) {
        unsafe { self.gl.bind_buffer_base(target, index, buffer(name)) }
    }

    fn bind_framebuffer(&self, target: u32, name: GlName) {
        unsafe { self.gl.bind_framebuffer(target, framebuffer(name)) }
    }

    fn bind_vertex_array(&self, name: GlName) {
        unsafe { self.gl.bind_vertex_array(vertex_array(name)) }
    }

    fn bind_vertex_buffer(&self, binding: u32, name: GlName, offset: i32, stride: i32) {
        unsafe {
            self.gl
                .bind_vertex_buffer(binding, buffer(name), offset, stride)
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_format_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        offset: u32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_format_f32(index, size, data_type, normalized, offset)
        }
    }

    fn vertex_attrib_format_i32(&self, index: u32, size: i32, data_type: u32, offset: u32) {
        unsafe {
            self.gl
                .vertex_attrib_format_i32(index, size, data_type, offset)
        }
    }

    fn vertex_attrib_binding(&self, index: u32, binding: u32) {
        unsafe { self.gl.vertex_attrib_binding(index, binding) }
    }

    fn vertex_binding_divisor(&self, binding: u32, divisor: u32) {
        unsafe { self.gl.vertex_binding_divisor(binding, divisor) }
    }

    fn buffer_data_size(&self, target: u32, size: i32, usage: u32) {
        unsafe { self.gl.buffer_data_size(target, size, usage) }
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        unsafe { self.gl.buffer_sub_data_u8_slice(target, offset, data) }
    }

    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    ) {
        unsafe {
            self.gl
                .copy_buffer_sub_data(src_target, dst_target, src_offset, dst_offset, size)
        }
    }

    fn tex_storage_2d(&self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32) {
        unsafe {
            self.gl
                .tex_storage_2d(target, levels, internal_format, width, height)
        }
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
        unsafe {
            self.gl
                .tex_storage_3d(target, levels, internal_format, width, height, depth)
        }
    }

    fn tex_storage_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl.tex_storage_2d_multisample(
                target,
                samples,
                internal_format,
                width,
                height,
                true,
            )
        }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, parameter, value) }
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
        let pixels = glow::PixelUnpackData::BufferOffset(buffer_offset);
        unsafe {
            match target {
                glow::TEXTURE_2D_ARRAY | glow::TEXTURE_3D | glow::TEXTURE_CUBE_MAP_ARRAY => {
                    self.gl.tex_sub_image_3d(
                        target,
                        level,
                        region.x,
                        region.y,
                        region.z,
                        region.width,
                        region.height,
                        region.depth,
                        format,
                        data_type,
                        pixels,
                    )
                }
                _ => self.gl.tex_sub_image_2d(
                    target,
                    level,
                    region.x,
                    region.y,
                    region.width,
                    region.height,
                    format,
                    data_type,
                    pixels,
                ),
            }
        }
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
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width,
                height,
                format,
                data_type,
                glow::PixelPackData::BufferOffset(buffer_offset),
            )
        }
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(parameter, value) }
    }

    fn sampler_parameter_i32(&self, name: GlName, parameter: u32, value: i32) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.sampler_parameter_i32(s, parameter, value) }
        }
    }

    fn sampler_parameter_f32(&self, name: GlName, parameter: u32, value: f32) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.sampler_parameter_f32(s, parameter, value) }
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        name: GlName,
        level: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_2d(target, attachment, texture_target, texture(name), level)
        }
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        name: GlName,
        level: i32,
        layer: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_layer(target, attachment, texture(name), level, layer)
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        unsafe { self.gl.draw_buffers(buffers) }
    }

    fn read_buffer(&self, buffer: u32) {
        unsafe { self.gl.read_buffer(buffer) }
    }

    fn invalidate_framebuffer(&self, target: u32, attachments: &[u32]) {
        unsafe { self.gl.invalidate_framebuffer(target, attachments) }
    }

    fn blit_framebuffer(&self, src: BlitRect, dst: BlitRect, mask: u32, filter: u32) {
        unsafe {
            self.gl.blit_framebuffer(
                src.x0, src.y0, src.x1, src.y1, dst.x0, dst.y0, dst.x1, dst.y1, mask, filter,
            )
        }
    }

    fn clear_buffer_f32(&self, buffer: u32, draw_buffer: i32, values: &[f32]) {
        unsafe {
            self.gl
                .clear_buffer_f32_slice(buffer, draw_buffer as u32, values)
        }
    }

    fn clear_buffer_i32(&self, buffer: u32, draw_buffer: i32, values: &[i32]) {
        unsafe {
            self.gl
                .clear_buffer_i32_slice(buffer, draw_buffer as u32, values)
        }
    }

    fn clear_buffer_u32(&self, buffer: u32, draw_buffer: i32, values: &[u32]) {
        unsafe {
            self.gl
                .clear_buffer_u32_slice(buffer, draw_buffer as u32, values)
        }
    }

    fn clear_buffer_depth_stencil(&self, depth: f32, stencil: i32) {
        unsafe {
            self.gl
                .clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, stencil)
        }
    }

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32) {
        unsafe { self.gl.draw_arrays_instanced(mode, first, count, instances) }
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
        unsafe {
            self.gl.draw_elements_instanced_base_vertex(
                mode,
                count,
                index_type,
                offset,
                instances,
                base_vertex,
            )
        }
    }

    fn draw_arrays_indirect(&self, mode: u32, offset: i32) {
        unsafe { self.gl.draw_arrays_indirect_offset(mode, offset) }
    }

    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: i32) {
        unsafe {
            self.gl
                .draw_elements_indirect_offset(mode, index_type, offset)
        }
    }

    fn dispatch_compute(&self, x: u32, y: u32, z: u32) {
        unsafe { self.gl.dispatch_compute(x, y, z) }
    }

    fn dispatch_compute_indirect(&self, offset: i32) {
        unsafe { self.gl.dispatch_compute_indirect(offset) }
    }

    fn memory_barrier(&self, barriers: u32) {
        unsafe { self.gl.memory_barrier(barriers) }
    }

    fn memory_barrier_by_region(&self, barriers: u32) {
        unsafe { self.gl.memory_barrier_by_region(barriers) }
    }

    fn enable(&self, capability: u32) {
        unsafe { self.gl.enable(capability) }
    }

    fn disable(&self, capability: u32) {
        unsafe { self.gl.disable(capability) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn depth_range(&self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.scissor(x, y, width, height) }
    }

    fn line_width(&self, width: f32) {
        unsafe { self.gl.line_width(width) }
    }

    fn front_face(&self, mode: u32) {
        unsafe { self.gl.front_face(mode) }
    }

    fn cull_face(&self, mode: u32) {
        unsafe { self.gl.cull_face(mode) }
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        unsafe { self.gl.polygon_offset(factor, units) }
    }

    fn depth_func(&self, func: u32) {
        unsafe { self.gl.depth_func(func) }
    }

    fn depth_mask(&self, enabled: bool) {
        unsafe { self.gl.depth_mask(enabled) }
    }

    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32) {
        unsafe { self.gl.stencil_func_separate(face, func, reference, mask) }
    }

    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        unsafe { self.gl.stencil_op_separate(face, fail, depth_fail, pass) }
    }

    fn stencil_mask_separate(&self, face: u32, mask: u32) {
        unsafe { self.gl.stencil_mask_separate(face, mask) }
    }

    fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
        unsafe { self.gl.color_mask(red, green, blue, alpha) }
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        unsafe { self.gl.blend_equation_separate(mode_rgb, mode_alpha) }
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe {
            self.gl
                .blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha)
        }
    }

    fn blend_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { self.gl.blend_color(red, green, blue, alpha) }
    }

    fn fence_sync(&self) -> SyncHandle {
        match unsafe { self.gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0) } {
            Ok(fence) => {
                let handle = self.next_fence.get();
                self.next_fence.set(handle + 1);
                self.fences.borrow_mut().insert(handle, fence);
                handle
            }
            Err(e) => {
                log::error!("GlowApi: Failed to create fence: {e}");
                0
            }
        }
    }

    fn client_wait_sync(&self, sync: SyncHandle, timeout_ns: u64) -> u32 {
        let Some(fence) = self.fence(sync) else {
            return glow::ALREADY_SIGNALED;
        };
        let timeout = timeout_ns.min(i32::MAX as u64) as i32;
        unsafe {
            self.gl
                .client_wait_sync(fence, glow::SYNC_FLUSH_COMMANDS_BIT, timeout)
        }
    }

    fn wait_sync(&self, sync: SyncHandle) {
        if let Some(fence) = self.fence(sync) {
            unsafe { self.gl.wait_sync(fence, 0, u64::MAX) }
        }
    }

    fn delete_sync(&self, sync: SyncHandle) {
        if let Some(fence) = self.fences.borrow_mut().remove(&sync) {
            unsafe { self.gl.delete_sync(fence) }
        }
    }

    fn flush(&self) {
        unsafe { self.gl.flush() }
    }
}
