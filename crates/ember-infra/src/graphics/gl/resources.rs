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

//! Native objects behind engine resource handles.
//!
//! The registry owns the mapping from [`BufferId`], [`ImageId`],
//! [`SamplerId`] and [`SemaphoreId`] to native names. Destruction always
//! scrubs the [`StateCache`] before the native delete.

use super::conversions::{min_filter, texture_target, IntoGl};
use super::format_table::{self, FormatInfo};
use super::native::{
    GlApi, GlName, SyncHandle, TEXTURE_EXTERNAL_OES, TEXTURE_MAX_ANISOTROPY_EXT,
};
use super::state_cache::StateCache;
use ember_core::renderer::{
    BufferDescriptor, BufferId, ImageDescriptor, ImageId, ImageKind, MemoryPropertyFlags,
    ResourceError, SamplerDescriptor, SamplerId, SemaphoreId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Rounds `value` up to a multiple of `alignment`.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// A native buffer.
#[derive(Debug)]
pub struct GlBuffer {
    /// The native buffer.
    pub name: GlName,
    /// The creation descriptor.
    pub descriptor: BufferDescriptor,
    /// Size of one ring copy, aligned for indexed binding.
    pub aligned_size: u64,
    /// Number of ring copies; `1` for ordinary buffers.
    pub ring_count: u32,
}

impl GlBuffer {
    /// Byte offset of the copy used by frame slot `frame_slot`.
    pub fn ring_offset(&self, frame_slot: u32) -> u64 {
        if self.ring_count <= 1 {
            return 0;
        }
        self.aligned_size * u64::from(frame_slot % self.ring_count)
    }

    /// Size of the native allocation.
    pub fn allocation_size(&self) -> u64 {
        self.aligned_size * u64::from(self.ring_count.max(1))
    }
}

/// A native texture.
#[derive(Debug)]
pub struct GlImage {
    /// The native texture.
    pub name: GlName,
    /// The creation descriptor.
    pub descriptor: ImageDescriptor,
    /// The texture target it is bound to.
    pub target: u32,
    /// The native format description.
    pub format: &'static FormatInfo,
}

impl GlImage {
    /// Returns `true` for textures backed by a platform image.
    pub fn is_external(&self) -> bool {
        self.target == TEXTURE_EXTERNAL_OES
    }
}

/// A native sampler object.
#[derive(Debug)]
pub struct GlSampler {
    /// The native sampler.
    pub name: GlName,
    /// The creation descriptor.
    pub descriptor: SamplerDescriptor,
}

/// A semaphore, emulated with a fence created at signal time.
#[derive(Debug, Default)]
pub struct GlSemaphore {
    /// The fence of the last signal not yet waited on.
    pub fence: Option<SyncHandle>,
}

/// All resource wrappers of one device.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    buffers: HashMap<BufferId, GlBuffer>,
    images: HashMap<ImageId, GlImage>,
    samplers: HashMap<SamplerId, GlSampler>,
    semaphores: HashMap<SemaphoreId, GlSemaphore>,
    next_buffer_id: AtomicUsize,
    next_image_id: AtomicUsize,
    next_sampler_id: AtomicUsize,
    next_semaphore_id: AtomicUsize,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_image_id(&self) -> ImageId {
        ImageId(self.next_image_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_sampler_id(&self) -> SamplerId {
        SamplerId(self.next_sampler_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_semaphore_id(&self) -> SemaphoreId {
        SemaphoreId(self.next_semaphore_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Looks up a buffer.
    pub fn buffer(&self, id: BufferId) -> Option<&GlBuffer> {
        self.buffers.get(&id)
    }

    /// Looks up an image.
    pub fn image(&self, id: ImageId) -> Option<&GlImage> {
        self.images.get(&id)
    }

    /// Looks up a sampler.
    pub fn sampler(&self, id: SamplerId) -> Option<&GlSampler> {
        self.samplers.get(&id)
    }

    /// Looks up a semaphore.
    pub fn semaphore_mut(&mut self, id: SemaphoreId) -> Option<&mut GlSemaphore> {
        self.semaphores.get_mut(&id)
    }

    // --- Buffers ---

    /// Creates a buffer.
    ///
    /// Ring-buffered buffers get `buffering_count` copies, each aligned to
    /// `alignment` so any copy can be bound as a uniform range.
    pub fn create_buffer<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        descriptor: &BufferDescriptor,
        buffering_count: u32,
        alignment: u64,
    ) -> Result<BufferId, ResourceError> {
        if descriptor.size == 0 {
            return Err(ResourceError::OutOfBounds);
        }
        let (aligned_size, ring_count) = if descriptor.dynamic_ring {
            (align_up(descriptor.size, alignment), buffering_count.max(1))
        } else {
            (descriptor.size, 1)
        };
        let total = aligned_size * u64::from(ring_count);
        let total = i32::try_from(total).map_err(|_| ResourceError::OutOfBounds)?;

        let name = gl.create_buffer();
        if name == 0 {
            return Err(ResourceError::BackendError(
                "glGenBuffers returned no name".to_string(),
            ));
        }
        let usage = if descriptor.dynamic_ring
            || descriptor
                .memory
                .contains(MemoryPropertyFlags::HOST_VISIBLE)
        {
            glow::DYNAMIC_DRAW
        } else {
            glow::STATIC_DRAW
        };
        state.bind_buffer(gl, glow::COPY_WRITE_BUFFER, name);
        gl.buffer_data_size(glow::COPY_WRITE_BUFFER, total, usage);

        let id = self.generate_buffer_id();
        self.buffers.insert(
            id,
            GlBuffer {
                name,
                descriptor: descriptor.clone(),
                aligned_size,
                ring_count,
            },
        );
        log::debug!(
            "GlDevice: Created buffer '{}' with ID: {:?}, size: {} bytes x{}",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size,
            ring_count
        );
        Ok(id)
    }

    /// Uploads `data` at `offset` of the copy used by `frame_slot`.
    pub fn write_buffer<G: GlApi + ?Sized>(
        &self,
        gl: &G,
        state: &mut StateCache,
        id: BufferId,
        offset: u64,
        data: &[u8],
        frame_slot: u32,
    ) -> Result<(), ResourceError> {
        let buffer = self.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(ResourceError::OutOfBounds)?;
        if end > buffer.descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        let native_offset = buffer.ring_offset(frame_slot) + offset;
        let native_offset = i32::try_from(native_offset).map_err(|_| ResourceError::OutOfBounds)?;
        state.bind_buffer(gl, glow::COPY_WRITE_BUFFER, buffer.name);
        gl.buffer_sub_data(glow::COPY_WRITE_BUFFER, native_offset, data);
        Ok(())
    }

    /// Destroys a buffer.
    pub fn destroy_buffer<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        id: BufferId,
    ) -> Result<(), ResourceError> {
        let buffer = self.buffers.remove(&id).ok_or(ResourceError::NotFound)?;
        state.forget_buffer(buffer.name);
        gl.delete_buffer(buffer.name);
        log::debug!("GlDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    // --- Images ---

    /// Creates an image with immutable storage.
    ///
    /// External images only get a name; the platform attaches their content.
    pub fn create_image<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        descriptor: &ImageDescriptor,
    ) -> Result<ImageId, ResourceError> {
        let format = format_table::lookup(descriptor.format)
            .ok_or(ResourceError::UnsupportedFormat(descriptor.format))?;
        if !format.is_supported(gl.version(), &gl.extensions()) {
            return Err(ResourceError::UnsupportedFormat(descriptor.format));
        }
        let external = descriptor.kind == ImageKind::External;
        if external && !gl.extensions().oes_egl_image_external_essl3 {
            return Err(ResourceError::BackendError(
                "external images need GL_OES_EGL_image_external_essl3".to_string(),
            ));
        }
        let samples = descriptor.sample_count.count() as i32;
        if samples > 1 && descriptor.kind != ImageKind::D2 {
            return Err(ResourceError::BackendError(format!(
                "multisampled {:?} images are not supported",
                descriptor.kind
            )));
        }

        let target = texture_target(descriptor.kind, descriptor.sample_count);
        let name = gl.create_texture();
        if name == 0 {
            return Err(ResourceError::BackendError(
                "glGenTextures returned no name".to_string(),
            ));
        }
        state.bind_texture_for_edit(gl, 0, target, name);

        let size = descriptor.size;
        let (width, height) = (size.width as i32, size.height as i32);
        let levels = descriptor.mip_level_count.max(1) as i32;
        match descriptor.kind {
            ImageKind::External => {}
            ImageKind::D2 if samples > 1 => {
                gl.tex_storage_2d_multisample(target, samples, format.internal_format, width, height)
            }
            ImageKind::D2 | ImageKind::Cube => {
                gl.tex_storage_2d(target, levels, format.internal_format, width, height)
            }
            ImageKind::D2Array | ImageKind::CubeArray => gl.tex_storage_3d(
                target,
                levels,
                format.internal_format,
                width,
                height,
                descriptor.array_layer_count.max(1) as i32,
            ),
            ImageKind::D3 => gl.tex_storage_3d(
                target,
                levels,
                format.internal_format,
                width,
                height,
                size.depth.max(1) as i32,
            ),
        }
        if !external && samples == 1 {
            gl.tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, levels - 1);
        }

        let id = self.generate_image_id();
        self.images.insert(
            id,
            GlImage {
                name,
                descriptor: descriptor.clone(),
                target,
                format,
            },
        );
        log::debug!(
            "GlDevice: Created image '{}' with ID: {:?} ({:?}, {}x{}x{})",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.format,
            size.width,
            size.height,
            size.depth
        );
        Ok(id)
    }

    /// Destroys an image.
    pub fn destroy_image<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        id: ImageId,
    ) -> Result<(), ResourceError> {
        let image = self.images.remove(&id).ok_or(ResourceError::NotFound)?;
        state.forget_texture(image.name);
        gl.delete_texture(image.name);
        log::debug!("GlDevice: Destroyed image with ID: {id:?}");
        Ok(())
    }

    // --- Samplers ---

    /// Creates a sampler object.
    pub fn create_sampler<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerId, ResourceError> {
        let name = gl.create_sampler();
        if name == 0 {
            return Err(ResourceError::BackendError(
                "glGenSamplers returned no name".to_string(),
            ));
        }
        gl.sampler_parameter_i32(name, glow::TEXTURE_WRAP_S, descriptor.address_mode_u.into_gl());
        gl.sampler_parameter_i32(name, glow::TEXTURE_WRAP_T, descriptor.address_mode_v.into_gl());
        gl.sampler_parameter_i32(name, glow::TEXTURE_WRAP_R, descriptor.address_mode_w.into_gl());
        gl.sampler_parameter_i32(
            name,
            glow::TEXTURE_MIN_FILTER,
            min_filter(descriptor.min_filter, descriptor.mipmap_filter),
        );
        let mag: u32 = descriptor.mag_filter.into_gl();
        gl.sampler_parameter_i32(name, glow::TEXTURE_MAG_FILTER, mag as i32);
        gl.sampler_parameter_f32(name, glow::TEXTURE_MIN_LOD, descriptor.lod_min_clamp);
        gl.sampler_parameter_f32(name, glow::TEXTURE_MAX_LOD, descriptor.lod_max_clamp);
        if let Some(compare) = descriptor.compare {
            let func: u32 = compare.into_gl();
            gl.sampler_parameter_i32(
                name,
                glow::TEXTURE_COMPARE_MODE,
                glow::COMPARE_REF_TO_TEXTURE as i32,
            );
            gl.sampler_parameter_i32(name, glow::TEXTURE_COMPARE_FUNC, func as i32);
        }
        if descriptor.anisotropy_clamp > 1 && gl.extensions().ext_texture_filter_anisotropic {
            gl.sampler_parameter_f32(
                name,
                TEXTURE_MAX_ANISOTROPY_EXT,
                f32::from(descriptor.anisotropy_clamp),
            );
        }

        let id = self.generate_sampler_id();
        self.samplers.insert(
            id,
            GlSampler {
                name,
                descriptor: descriptor.clone(),
            },
        );
        log::debug!("GlDevice: Created sampler with ID: {id:?}");
        Ok(id)
    }

    /// Destroys a sampler.
    pub fn destroy_sampler<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        id: SamplerId,
    ) -> Result<(), ResourceError> {
        let sampler = self.samplers.remove(&id).ok_or(ResourceError::NotFound)?;
        state.forget_sampler(sampler.name);
        gl.delete_sampler(sampler.name);
        log::debug!("GlDevice: Destroyed sampler with ID: {id:?}");
        Ok(())
    }

    // --- Semaphores ---

    /// Creates an unsignaled semaphore.
    pub fn create_semaphore(&mut self) -> SemaphoreId {
        let id = self.generate_semaphore_id();
        self.semaphores.insert(id, GlSemaphore::default());
        id
    }

    /// Signals a semaphore with a fence placed after the submitted commands.
    pub fn signal_semaphore<G: GlApi + ?Sized>(&mut self, gl: &G, id: SemaphoreId) -> bool {
        let Some(semaphore) = self.semaphores.get_mut(&id) else {
            return false;
        };
        if let Some(previous) = semaphore.fence.replace(gl.fence_sync()) {
            gl.delete_sync(previous);
        }
        true
    }

    /// Makes the server wait on a signaled semaphore and resets it.
    pub fn wait_semaphore<G: GlApi + ?Sized>(&mut self, gl: &G, id: SemaphoreId) -> bool {
        let Some(semaphore) = self.semaphores.get_mut(&id) else {
            return false;
        };
        if let Some(fence) = semaphore.fence.take() {
            gl.wait_sync(fence);
            gl.delete_sync(fence);
        }
        true
    }

    /// Destroys a semaphore.
    pub fn destroy_semaphore<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        id: SemaphoreId,
    ) -> Result<(), ResourceError> {
        let semaphore = self.semaphores.remove(&id).ok_or(ResourceError::NotFound)?;
        if let Some(fence) = semaphore.fence {
            gl.delete_sync(fence);
        }
        Ok(())
    }

    /// Deletes every native object.
    pub fn destroy_all<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache) {
        for (_, buffer) in self.buffers.drain() {
            state.forget_buffer(buffer.name);
            gl.delete_buffer(buffer.name);
        }
        for (_, image) in self.images.drain() {
            state.forget_texture(image.name);
            gl.delete_texture(image.name);
        }
        for (_, sampler) in self.samplers.drain() {
            state.forget_sampler(sampler.name);
            gl.delete_sampler(sampler.name);
        }
        for (_, semaphore) in self.semaphores.drain() {
            if let Some(fence) = semaphore.fence {
                gl.delete_sync(fence);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl, ObjectKind};
    use crate::graphics::gl::native::{GlExtensions, GlVersion};
    use ember_core::renderer::{BufferUsage, ImageUsage, TextureFormat};

    #[test]
    fn ring_buffers_allocate_aligned_copies() {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut registry = ResourceRegistry::new();
        let mut descriptor = BufferDescriptor::new(100, BufferUsage::UNIFORM);
        descriptor.dynamic_ring = true;
        let id = registry
            .create_buffer(&gl, &mut state, &descriptor, 3, 256)
            .expect("buffer");
        let buffer = registry.buffer(id).expect("registered");
        assert_eq!(buffer.aligned_size, 256);
        assert_eq!(buffer.ring_offset(4), 256);
        assert_eq!(
            gl.count(|c| matches!(c, GlCall::BufferData { size: 768, .. })),
            1,
            "one allocation holds every frame's copy"
        );

        registry
            .write_buffer(&gl, &mut state, id, 0, &[0u8; 16], 2)
            .expect("write");
        assert!(gl
            .calls()
            .contains(&GlCall::BufferSubData { target: glow::COPY_WRITE_BUFFER, offset: 512, len: 16 }));
        assert!(matches!(
            registry.write_buffer(&gl, &mut state, id, 96, &[0u8; 8], 0),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn destroying_a_bound_buffer_scrubs_the_cache() {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut registry = ResourceRegistry::new();
        let id = registry
            .create_buffer(&gl, &mut state, &BufferDescriptor::new(64, BufferUsage::VERTEX), 3, 256)
            .expect("buffer");
        let name = registry.buffer(id).expect("registered").name;
        registry.destroy_buffer(&gl, &mut state, id).expect("destroy");
        assert_eq!(gl.live_objects(ObjectKind::Buffer), 0);

        // The recycled name must be bound again, not suppressed.
        let again = registry
            .create_buffer(&gl, &mut state, &BufferDescriptor::new(64, BufferUsage::VERTEX), 3, 256)
            .expect("buffer");
        assert_eq!(registry.buffer(again).expect("registered").name, name);
        assert_eq!(
            gl.count(|c| matches!(c, GlCall::BindBuffer { target: glow::COPY_WRITE_BUFFER, .. })),
            2
        );
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let es = GlVersion {
            major: 3,
            minor: 1,
            is_embedded: true,
        };
        let gl = HeadlessGl::with_version(es, GlExtensions::default());
        let mut state = StateCache::new(16);
        let mut registry = ResourceRegistry::new();
        let descriptor =
            ImageDescriptor::new_2d(TextureFormat::Bc1RgbaUnorm, 64, 64, ImageUsage::SAMPLED);
        assert!(matches!(
            registry.create_image(&gl, &mut state, &descriptor),
            Err(ResourceError::UnsupportedFormat(TextureFormat::Bc1RgbaUnorm))
        ));
        assert_eq!(gl.live_objects(ObjectKind::Texture), 0);
    }

    #[test]
    fn semaphores_wait_on_the_signal_fence() {
        let gl = HeadlessGl::new();
        let mut registry = ResourceRegistry::new();
        let id = registry.create_semaphore();
        assert!(registry.signal_semaphore(&gl, id));
        assert_eq!(gl.live_fences(), 1);
        assert!(registry.wait_semaphore(&gl, id));
        assert_eq!(gl.live_fences(), 0);
        assert_eq!(gl.count(|c| matches!(c, GlCall::WaitSync(_))), 1);
    }
}
