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

//! The native call surface used by the backend.
//!
//! [`GlApi`] lists exactly the OpenGL 4.3 / OpenGL ES 3.1 entry points the
//! emulation layer needs. Object names are plain `u32`s where `0` means "no
//! object", matching the native convention, so that caches can store and
//! compare them cheaply. Two implementations exist: [`GlowApi`] drives a
//! real driver through `glow`, and [`HeadlessGl`] records calls for tests.
//!
//! [`GlowApi`]: super::glow_api::GlowApi
//! [`HeadlessGl`]: super::headless::HeadlessGl

/// A native object name. `0` is the null object.
pub type GlName = u32;

/// A native sync object handle. `0` is the null handle.
pub type SyncHandle = u64;

/// `GL_TEXTURE_EXTERNAL_OES`, the texture target of platform images.
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

/// `GL_TEXTURE_MAX_ANISOTROPY_EXT`.
pub const TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FE;

/// The context version reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// `true` for OpenGL ES contexts.
    pub is_embedded: bool,
}

impl GlVersion {
    /// Returns `true` if the context exposes compute shaders, storage
    /// buffers, vertex attribute bindings and indirect draws.
    pub fn supports_compute(&self) -> bool {
        if self.is_embedded {
            (self.major, self.minor) >= (3, 1)
        } else {
            (self.major, self.minor) >= (4, 3)
        }
    }
}

/// Extensions that change what the backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlExtensions {
    /// `GL_OES_EGL_image_external_essl3`: external textures in ESSL 3 shaders.
    pub oes_egl_image_external_essl3: bool,
    /// `GL_EXT_color_buffer_float`: float formats are renderable.
    pub ext_color_buffer_float: bool,
    /// `GL_EXT_texture_compression_s3tc`: BC1-BC3 formats.
    pub ext_texture_compression_s3tc: bool,
    /// `GL_KHR_texture_compression_astc_ldr`: ASTC LDR formats.
    pub khr_texture_compression_astc_ldr: bool,
    /// `GL_EXT_texture_filter_anisotropic`.
    pub ext_texture_filter_anisotropic: bool,
    /// `GL_EXT_texture_format_BGRA8888`: BGRA storage on ES.
    pub ext_texture_format_bgra8888: bool,
}

impl GlExtensions {
    /// Builds the set from the extension names reported by the driver.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ext = Self::default();
        for name in names {
            match name {
                "GL_OES_EGL_image_external_essl3" => ext.oes_egl_image_external_essl3 = true,
                "GL_EXT_color_buffer_float" => ext.ext_color_buffer_float = true,
                "GL_EXT_texture_compression_s3tc" => ext.ext_texture_compression_s3tc = true,
                "GL_KHR_texture_compression_astc_ldr" => {
                    ext.khr_texture_compression_astc_ldr = true
                }
                "GL_EXT_texture_filter_anisotropic" | "GL_ARB_texture_filter_anisotropic" => {
                    ext.ext_texture_filter_anisotropic = true
                }
                "GL_EXT_texture_format_BGRA8888" => ext.ext_texture_format_bgra8888 = true,
                _ => {}
            }
        }
        ext
    }

    /// Every extension enabled; used by the headless backend.
    pub fn all() -> Self {
        Self {
            oes_egl_image_external_essl3: true,
            ext_color_buffer_float: true,
            ext_texture_compression_s3tc: true,
            khr_texture_compression_astc_ldr: true,
            ext_texture_filter_anisotropic: true,
            ext_texture_format_bgra8888: true,
        }
    }
}

/// A texel region of a texture upload or readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TexelRegion {
    /// X offset.
    pub x: i32,
    /// Y offset.
    pub y: i32,
    /// Z offset or array layer.
    pub z: i32,
    /// Width in texels.
    pub width: i32,
    /// Height in texels.
    pub height: i32,
    /// Depth in texels or layer count.
    pub depth: i32,
}

/// A rectangle given by two corners, as the blit entry point takes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlitRect {
    /// First corner X.
    pub x0: i32,
    /// First corner Y.
    pub y0: i32,
    /// Second corner X.
    pub x1: i32,
    /// Second corner Y.
    pub y1: i32,
}

/// The scalar kind of a uniform upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `float`, `vecN`
    Float,
    /// `int`, `ivecN`
    Int,
    /// `uint`, `uvecN`
    UInt,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
}

/// The OpenGL entry points used by the emulation layer.
///
/// Methods mirror the native functions one to one. Implementations must not
/// cache anything: redundancy elimination is the job of the state cache.
pub trait GlApi {
    /// The context version.
    fn version(&self) -> GlVersion;
    /// The extensions relevant to the backend.
    fn extensions(&self) -> GlExtensions;

    // --- Object lifetime ---

    /// `glGenBuffers`
    fn create_buffer(&self) -> GlName;
    /// `glDeleteBuffers`
    fn delete_buffer(&self, buffer: GlName);
    /// `glGenTextures`
    fn create_texture(&self) -> GlName;
    /// `glDeleteTextures`
    fn delete_texture(&self, texture: GlName);
    /// `glGenSamplers`
    fn create_sampler(&self) -> GlName;
    /// `glDeleteSamplers`
    fn delete_sampler(&self, sampler: GlName);
    /// `glGenFramebuffers`
    fn create_framebuffer(&self) -> GlName;
    /// `glDeleteFramebuffers`
    fn delete_framebuffer(&self, framebuffer: GlName);
    /// `glGenVertexArrays`
    fn create_vertex_array(&self) -> GlName;
    /// `glDeleteVertexArrays`
    fn delete_vertex_array(&self, vertex_array: GlName);

    // --- Shaders and programs ---

    /// `glCreateShader`
    fn create_shader(&self, shader_type: u32) -> GlName;
    /// `glShaderSource`
    fn shader_source(&self, shader: GlName, source: &str);
    /// `glCompileShader`
    fn compile_shader(&self, shader: GlName);
    /// `glGetShaderiv(GL_COMPILE_STATUS)`
    fn get_shader_compile_status(&self, shader: GlName) -> bool;
    /// `glGetShaderInfoLog`
    fn get_shader_info_log(&self, shader: GlName) -> String;
    /// `glDeleteShader`
    fn delete_shader(&self, shader: GlName);
    /// `glCreateProgram`
    fn create_program(&self) -> GlName;
    /// `glAttachShader`
    fn attach_shader(&self, program: GlName, shader: GlName);
    /// `glLinkProgram`
    fn link_program(&self, program: GlName);
    /// `glGetProgramiv(GL_LINK_STATUS)`
    fn get_program_link_status(&self, program: GlName) -> bool;
    /// `glGetProgramInfoLog`
    fn get_program_info_log(&self, program: GlName) -> String;
    /// `glDeleteProgram`
    fn delete_program(&self, program: GlName);
    /// `glUseProgram`
    fn use_program(&self, program: GlName);
    /// `glGetUniformBlockIndex`; `None` if the block is inactive.
    fn get_uniform_block_index(&self, program: GlName, name: &str) -> Option<u32>;
    /// `glUniformBlockBinding`
    fn uniform_block_binding(&self, program: GlName, index: u32, binding: u32);
    /// `glGetProgramResourceIndex(GL_SHADER_STORAGE_BLOCK)`; `None` if inactive.
    fn get_shader_storage_block_index(&self, program: GlName, name: &str) -> Option<u32>;
    /// `glShaderStorageBlockBinding`
    fn shader_storage_block_binding(&self, program: GlName, index: u32, binding: u32);
    /// `glGetUniformLocation`; `None` if the uniform is inactive.
    fn get_uniform_location(&self, program: GlName, name: &str) -> Option<u32>;
    /// `glUniform1i` on the current program.
    fn uniform_1_i32(&self, location: u32, value: i32);
    /// `glUniform{N}fv`, `glUniform{N}iv`, `glUniform{N}uiv` or
    /// `glUniformMatrix{N}fv` on the current program. `data` holds raw
    /// 32-bit words reinterpreted according to `kind`.
    fn uniform_words(&self, location: u32, kind: UniformKind, components: u32, data: &[u32]);

    // --- Binding ---

    /// `glActiveTexture(GL_TEXTURE0 + unit)`
    fn active_texture(&self, unit: u32);
    /// `glBindTexture`
    fn bind_texture(&self, target: u32, texture: GlName);
    /// `glBindSampler`
    fn bind_sampler(&self, unit: u32, sampler: GlName);
    /// `glBindImageTexture`
    #[allow(clippy::too_many_arguments)]
    fn bind_image_texture(
        &self,
        unit: u32,
        texture: GlName,
        level: i32,
        layered: bool,
        layer: i32,
        access: u32,
        format: u32,
    );
    /// `glBindBuffer`
    fn bind_buffer(&self, target: u32, buffer: GlName);
    /// `glBindBufferRange`
    fn bind_buffer_range(&self, target: u32, index: u32, buffer: GlName, offset: i32, size: i32);
    /// `glBindBufferBase`
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: GlName);
    /// `glBindFramebuffer`
    fn bind_framebuffer(&self, target: u32, framebuffer: GlName);
    /// `glBindVertexArray`
    fn bind_vertex_array(&self, vertex_array: GlName);
    /// `glBindVertexBuffer`
    fn bind_vertex_buffer(&self, binding: u32, buffer: GlName, offset: i32, stride: i32);

    // --- Vertex formats ---

    /// `glEnableVertexAttribArray`
    fn enable_vertex_attrib_array(&self, index: u32);
    /// `glVertexAttribFormat`
    fn vertex_attrib_format_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        offset: u32,
    );
    /// `glVertexAttribIFormat`
    fn vertex_attrib_format_i32(&self, index: u32, size: i32, data_type: u32, offset: u32);
    /// `glVertexAttribBinding`
    fn vertex_attrib_binding(&self, index: u32, binding: u32);
    /// `glVertexBindingDivisor`
    fn vertex_binding_divisor(&self, binding: u32, divisor: u32);

    // --- Storage and uploads ---

    /// `glBufferData` with no initial content.
    fn buffer_data_size(&self, target: u32, size: i32, usage: u32);
    /// `glBufferSubData`
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]);
    /// `glCopyBufferSubData`
    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    );
    /// `glTexStorage2D`
    fn tex_storage_2d(&self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32);
    /// `glTexStorage3D`
    fn tex_storage_3d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    );
    /// `glTexStorage2DMultisample`
    fn tex_storage_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    );
    /// `glTexParameteri`
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    /// `glTexSubImage2D`/`glTexSubImage3D` sourcing from the bound pixel-unpack buffer.
    fn tex_sub_image_from_buffer(
        &self,
        target: u32,
        level: i32,
        region: TexelRegion,
        format: u32,
        data_type: u32,
        buffer_offset: u32,
    );
    /// `glReadPixels` into the bound pixel-pack buffer.
    #[allow(clippy::too_many_arguments)]
    fn read_pixels_to_buffer(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        buffer_offset: u32,
    );
    /// `glPixelStorei`
    fn pixel_store_i32(&self, parameter: u32, value: i32);
    /// `glSamplerParameteri`
    fn sampler_parameter_i32(&self, sampler: GlName, parameter: u32, value: i32);
    /// `glSamplerParameterf`
    fn sampler_parameter_f32(&self, sampler: GlName, parameter: u32, value: f32);

    // --- Framebuffers ---

    /// `glFramebufferTexture2D`
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: GlName,
        level: i32,
    );
    /// `glFramebufferTextureLayer`
    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: GlName,
        level: i32,
        layer: i32,
    );
    /// `glCheckFramebufferStatus`
    fn check_framebuffer_status(&self, target: u32) -> u32;
    /// `glDrawBuffers`
    fn draw_buffers(&self, buffers: &[u32]);
    /// `glReadBuffer`
    fn read_buffer(&self, buffer: u32);
    /// `glInvalidateFramebuffer`
    fn invalidate_framebuffer(&self, target: u32, attachments: &[u32]);
    /// `glBlitFramebuffer`
    fn blit_framebuffer(&self, src: BlitRect, dst: BlitRect, mask: u32, filter: u32);
    /// `glClearBufferfv`
    fn clear_buffer_f32(&self, buffer: u32, draw_buffer: i32, values: &[f32]);
    /// `glClearBufferiv`
    fn clear_buffer_i32(&self, buffer: u32, draw_buffer: i32, values: &[i32]);
    /// `glClearBufferuiv`
    fn clear_buffer_u32(&self, buffer: u32, draw_buffer: i32, values: &[u32]);
    /// `glClearBufferfi`
    fn clear_buffer_depth_stencil(&self, depth: f32, stencil: i32);

    // --- Draws, dispatches and barriers ---

    /// `glDrawArraysInstanced`
    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32);
    /// `glDrawElementsInstancedBaseVertex`
    fn draw_elements_instanced_base_vertex(
        &self,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
    );
    /// `glDrawArraysIndirect`
    fn draw_arrays_indirect(&self, mode: u32, offset: i32);
    /// `glDrawElementsIndirect`
    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: i32);
    /// `glDispatchCompute`
    fn dispatch_compute(&self, x: u32, y: u32, z: u32);
    /// `glDispatchComputeIndirect`
    fn dispatch_compute_indirect(&self, offset: i32);
    /// `glMemoryBarrier`
    fn memory_barrier(&self, barriers: u32);
    /// `glMemoryBarrierByRegion`
    fn memory_barrier_by_region(&self, barriers: u32);

    // --- Fixed-function state ---

    /// `glEnable`
    fn enable(&self, capability: u32);
    /// `glDisable`
    fn disable(&self, capability: u32);
    /// `glViewport`
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    /// `glDepthRangef`
    fn depth_range(&self, near: f32, far: f32);
    /// `glScissor`
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    /// `glLineWidth`
    fn line_width(&self, width: f32);
    /// `glFrontFace`
    fn front_face(&self, mode: u32);
    /// `glCullFace`
    fn cull_face(&self, mode: u32);
    /// `glPolygonOffset`
    fn polygon_offset(&self, factor: f32, units: f32);
    /// `glDepthFunc`
    fn depth_func(&self, func: u32);
    /// `glDepthMask`
    fn depth_mask(&self, enabled: bool);
    /// `glStencilFuncSeparate`
    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32);
    /// `glStencilOpSeparate`
    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32);
    /// `glStencilMaskSeparate`
    fn stencil_mask_separate(&self, face: u32, mask: u32);
    /// `glColorMask`
    fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool);
    /// `glBlendEquationSeparate`
    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32);
    /// `glBlendFuncSeparate`
    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    /// `glBlendColor`
    fn blend_color(&self, red: f32, green: f32, blue: f32, alpha: f32);

    // --- Synchronization ---

    /// `glFenceSync(GL_SYNC_GPU_COMMANDS_COMPLETE)`
    fn fence_sync(&self) -> SyncHandle;
    /// `glClientWaitSync` with `GL_SYNC_FLUSH_COMMANDS_BIT`; returns the native status.
    fn client_wait_sync(&self, sync: SyncHandle, timeout_ns: u64) -> u32;
    /// `glWaitSync`
    fn wait_sync(&self, sync: SyncHandle);
    /// `glDeleteSync`
    fn delete_sync(&self, sync: SyncHandle);
    /// `glFlush`
    fn flush(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_parse_known_names() {
        let ext = GlExtensions::from_names([
            "GL_EXT_color_buffer_float",
            "GL_OES_EGL_image_external_essl3",
            "GL_NV_unrelated",
        ]);
        assert!(ext.ext_color_buffer_float);
        assert!(ext.oes_egl_image_external_essl3);
        assert!(!ext.ext_texture_compression_s3tc);
    }

    #[test]
    fn compute_support_by_version() {
        let es31 = GlVersion {
            major: 3,
            minor: 1,
            is_embedded: true,
        };
        let gl41 = GlVersion {
            major: 4,
            minor: 1,
            is_embedded: false,
        };
        assert!(es31.supports_compute());
        assert!(!gl41.supports_compute());
    }
}
