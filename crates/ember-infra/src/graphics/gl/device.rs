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

//! The device facade.
//!
//! [`GlDevice`] owns every cache of the backend and implements
//! [`GraphicsDevice`] on top of them. It is driven from one thread: every
//! call that touches the native context requires an open activation.

use super::context::{ContextActivation, ContextProvider};
use super::executor::{Executor, FrameContext, ScratchFramebuffers};
use super::framebuffer_cache::FramebufferCache;
use super::glow_api::GlowApi;
use super::native::{GlApi, SyncHandle};
use super::pipeline::PipelineRegistry;
use super::resources::ResourceRegistry;
use super::shader_cache::ShaderCache;
use super::state_cache::StateCache;
use super::swapchain::{Swapchain, SwapchainRegistry};
use anyhow::{anyhow, Result};
use ember_core::renderer::{
    BufferDescriptor, BufferId, CommandList, ComputePipelineDescriptor, ComputePipelineId,
    DeviceSettings, FrameStats, GraphicsDevice, ImageDescriptor, ImageId, PipelineLayoutDescriptor,
    PipelineLayoutId, RenderError, RenderPipelineDescriptor, RenderPipelineId, ResourceError,
    SamplerDescriptor, SamplerId, SemaphoreId, ShaderModuleDescriptor, ShaderModuleId,
    SwapchainDescriptor, SwapchainId,
};
use std::ffi::c_void;

/// A [`GraphicsDevice`] running on an OpenGL context.
///
/// `G` issues the native calls and `P` owns the platform context the calls
/// run on.
pub struct GlDevice<G: GlApi, P: ContextProvider> {
    gl: G,
    provider: P,
    settings: DeviceSettings,
    activation: ContextActivation,
    lost: bool,

    state: StateCache,
    shaders: ShaderCache,
    resources: ResourceRegistry,
    pipelines: PipelineRegistry,
    framebuffers: FramebufferCache,
    scratch: ScratchFramebuffers,
    swapchains: SwapchainRegistry,

    frame_fences: Vec<Option<SyncHandle>>,
    frame_number: u64,
    frame_open: bool,
    stats: FrameStats,
}

impl<G: GlApi, P: ContextProvider> std::fmt::Debug for GlDevice<G, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDevice")
            .field("version", &self.gl.version())
            .field("settings", &self.settings)
            .field("active", &self.activation.is_active())
            .field("lost", &self.lost)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

impl<P: ContextProvider> GlDevice<GlowApi, P> {
    /// Brings up a device on the provider's context, loading the GL entry
    /// points with `loader`.
    ///
    /// ## Arguments
    /// * `provider` - Owner of the native context.
    /// * `settings` - Device configuration.
    /// * `loader` - Resolves GL function names for the provider's context.
    ///
    /// ## Returns
    /// The device, or an error if the context cannot be made current or is
    /// older than OpenGL 4.3 / OpenGL ES 3.1.
    pub fn from_loader<F>(mut provider: P, settings: DeviceSettings, loader: F) -> Result<Self>
    where
        F: FnMut(&str) -> *const c_void,
    {
        let previous = provider.current();
        provider
            .make_current(Some(provider.own()))
            .map_err(|e| anyhow!("Failed to make the GL context current: {e}"))?;
        // SAFETY: the provider's context was made current just above.
        let gl = unsafe { GlowApi::from_loader(loader) };
        provider
            .make_current(previous)
            .map_err(|e| anyhow!("Failed to restore the previous GL context: {e}"))?;
        Ok(Self::new(gl?, provider, settings))
    }
}

impl<G: GlApi, P: ContextProvider> GlDevice<G, P> {
    /// Creates a device over an initialized native API.
    pub fn new(gl: G, provider: P, settings: DeviceSettings) -> Self {
        let buffering = settings.buffering_count.max(1) as usize;
        log::info!(
            "GlDevice: Created on {:?} with {} frames in flight",
            gl.version(),
            buffering
        );
        Self {
            state: StateCache::new(settings.max_texture_units as usize),
            gl,
            provider,
            activation: ContextActivation::default(),
            lost: false,
            shaders: ShaderCache::new(),
            resources: ResourceRegistry::new(),
            pipelines: PipelineRegistry::default(),
            framebuffers: FramebufferCache::new(),
            scratch: ScratchFramebuffers::default(),
            swapchains: SwapchainRegistry::default(),
            frame_fences: vec![None; buffering],
            frame_number: 0,
            frame_open: false,
            stats: FrameStats::default(),
            settings,
        }
    }

    /// The native API.
    pub fn gl(&self) -> &G {
        &self.gl
    }

    /// The context provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The context provider, e.g. for window-system events.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// The number of the current (or last) frame.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The shader and program cache.
    pub fn shader_cache(&self) -> &ShaderCache {
        &self.shaders
    }

    /// Number of cached framebuffer entries.
    pub fn cached_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Looks up a swapchain, e.g. to resize it.
    pub fn swapchain_mut(&mut self, id: SwapchainId) -> Option<&mut Swapchain> {
        self.swapchains.get_mut(id)
    }

    fn frame_slot(&self) -> usize {
        (self.frame_number % self.frame_fences.len() as u64) as usize
    }

    fn require_context(&self) -> Result<(), RenderError> {
        if !self.activation.is_active() {
            return Err(RenderError::ContextNotActive);
        }
        if self.lost {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }

    fn require_resource_context(&self) -> Result<(), ResourceError> {
        if self.activation.is_active() && !self.lost {
            Ok(())
        } else {
            Err(ResourceError::ContextNotActive)
        }
    }

    /// Deletes every native object owned by the device.
    ///
    /// ## Returns
    /// [`RenderError::ContextNotActive`] outside an activation.
    pub fn release_all(&mut self) -> Result<(), RenderError> {
        if !self.activation.is_active() {
            return Err(RenderError::ContextNotActive);
        }
        let gl = &self.gl;
        self.framebuffers.destroy_all(gl, &mut self.state);
        self.scratch.destroy(gl, &mut self.state);
        self.pipelines.destroy_all(gl, &mut self.state, &mut self.shaders);
        self.shaders.destroy_all(gl, &mut self.state);
        self.resources.destroy_all(gl, &mut self.state);
        for fence in self.frame_fences.iter_mut().filter_map(Option::take) {
            gl.delete_sync(fence);
        }
        self.state.invalidate();
        log::info!("GlDevice: Released all native objects.");
        Ok(())
    }
}

impl<G: GlApi, P: ContextProvider> Drop for GlDevice<G, P> {
    fn drop(&mut self) {
        let result = self
            .activation
            .activate(&mut self.provider)
            .and_then(|()| self.release_all())
            .and_then(|()| self.activation.deactivate(&mut self.provider));
        if let Err(e) = result {
            log::warn!("GlDevice: Native objects leaked on drop: {e}");
        }
    }
}

impl<G: GlApi, P: ContextProvider> GraphicsDevice for GlDevice<G, P> {
    fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    fn activate(&mut self) -> Result<(), RenderError> {
        self.activation.activate(&mut self.provider)
    }

    fn deactivate(&mut self) -> Result<(), RenderError> {
        self.activation.deactivate(&mut self.provider)
    }

    fn is_active(&self) -> bool {
        self.activation.is_active() && !self.lost
    }

    // --- Resources ---

    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.require_resource_context()?;
        self.resources.create_buffer(
            &self.gl,
            &mut self.state,
            descriptor,
            self.settings.buffering_count,
            u64::from(self.settings.uniform_buffer_offset_alignment),
        )
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        let slot = self.frame_slot() as u32;
        self.resources
            .write_buffer(&self.gl, &mut self.state, id, offset, data, slot)
    }

    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.resources.destroy_buffer(&self.gl, &mut self.state, id)
    }

    fn create_image(&mut self, descriptor: &ImageDescriptor) -> Result<ImageId, ResourceError> {
        self.require_resource_context()?;
        self.resources
            .create_image(&self.gl, &mut self.state, descriptor)
    }

    fn destroy_image(&mut self, id: ImageId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.framebuffers.purge_image(&self.gl, &mut self.state, id);
        self.resources.destroy_image(&self.gl, &mut self.state, id)
    }

    fn create_sampler(&mut self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        self.require_resource_context()?;
        self.resources.create_sampler(&self.gl, descriptor)
    }

    fn destroy_sampler(&mut self, id: SamplerId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.resources
            .destroy_sampler(&self.gl, &mut self.state, id)
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId, ResourceError> {
        Ok(self.resources.create_semaphore())
    }

    fn destroy_semaphore(&mut self, id: SemaphoreId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.resources.destroy_semaphore(&self.gl, id)
    }

    // --- Shaders and pipelines ---

    fn create_shader_module(
        &mut self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        Ok(self.pipelines.create_shader_module(descriptor))
    }

    fn destroy_shader_module(&mut self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.pipelines.destroy_shader_module(id)
    }

    fn create_pipeline_layout(
        &mut self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        self.pipelines.create_layout(descriptor)
    }

    fn destroy_pipeline_layout(&mut self, id: PipelineLayoutId) -> Result<(), ResourceError> {
        self.pipelines.destroy_layout(id)
    }

    fn create_render_pipeline(
        &mut self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        self.require_resource_context()?;
        self.pipelines.create_render(
            &self.gl,
            &mut self.state,
            &mut self.shaders,
            descriptor,
            self.settings.max_texture_units,
        )
    }

    fn destroy_render_pipeline(&mut self, id: RenderPipelineId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.pipelines
            .destroy_render(&self.gl, &mut self.state, &mut self.shaders, id)
    }

    fn create_compute_pipeline(
        &mut self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        self.require_resource_context()?;
        self.pipelines.create_compute(
            &self.gl,
            &mut self.state,
            &mut self.shaders,
            descriptor,
            self.settings.max_texture_units,
        )
    }

    fn destroy_compute_pipeline(&mut self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.require_resource_context()?;
        self.pipelines
            .destroy_compute(&self.gl, &mut self.state, &mut self.shaders, id)
    }

    fn create_swapchain(&mut self, descriptor: &SwapchainDescriptor) -> Result<SwapchainId, ResourceError> {
        self.swapchains.create(descriptor)
    }

    fn destroy_swapchain(&mut self, id: SwapchainId) -> Result<(), ResourceError> {
        self.swapchains.destroy(id)
    }

    // --- Frames ---

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.require_context()?;
        if self.frame_open {
            log::warn!("GlDevice: begin_frame called twice, the open frame continues.");
            return Ok(());
        }
        self.frame_number += 1;
        let slot = self.frame_slot();
        if let Some(fence) = self.frame_fences[slot].take() {
            let status = self.gl.client_wait_sync(fence, self.settings.fence_timeout_ns);
            self.gl.delete_sync(fence);
            match status {
                glow::WAIT_FAILED => {
                    return Err(RenderError::RenderingFailed(format!(
                        "waiting on the fence of frame slot {slot} failed"
                    )))
                }
                glow::TIMEOUT_EXPIRED => log::warn!(
                    "GlDevice: Frame slot {slot} still busy after {} ns, reusing it anyway.",
                    self.settings.fence_timeout_ns
                ),
                _ => {}
            }
        }
        self.stats = FrameStats {
            frame_number: self.frame_number,
            ..Default::default()
        };
        self.frame_open = true;
        log::trace!("GlDevice: Frame {} started in slot {slot}", self.frame_number);
        Ok(())
    }

    fn submit(&mut self, commands: &CommandList) -> Result<(), RenderError> {
        self.require_context()?;
        if !self.frame_open {
            return Err(RenderError::RenderingFailed(
                "submit outside of begin_frame/end_frame".to_string(),
            ));
        }
        for &id in &commands.wait_semaphores {
            if !self.resources.wait_semaphore(&self.gl, id) {
                log::warn!("GlDevice: Wait on unknown {id:?} ignored.");
            }
        }

        let frame = FrameContext {
            number: self.frame_number,
            slot: self.frame_slot() as u32,
            backbuffer: self.swapchains.backbuffer_extent(),
            flip_default: self.settings.flip_default_framebuffer,
            validation: self.settings.validation,
        };
        Executor::new(
            &self.gl,
            &mut self.state,
            &mut self.shaders,
            &self.resources,
            &mut self.pipelines,
            &mut self.framebuffers,
            &mut self.scratch,
            frame,
            &mut self.stats,
        )
        .execute(&commands.commands);

        for &id in &commands.signal_semaphores {
            if !self.resources.signal_semaphore(&self.gl, id) {
                log::warn!("GlDevice: Signal of unknown {id:?} ignored.");
            }
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<FrameStats, RenderError> {
        self.require_context()?;
        if !self.frame_open {
            return Err(RenderError::RenderingFailed(
                "end_frame without begin_frame".to_string(),
            ));
        }
        let slot = self.frame_slot();
        if let Some(stale) = self.frame_fences[slot].replace(self.gl.fence_sync()) {
            self.gl.delete_sync(stale);
        }
        self.framebuffers.evict(
            &self.gl,
            &mut self.state,
            self.frame_number,
            self.settings.framebuffer_max_age(),
        );

        let binds = self.state.take_counters();
        let (created, evicted) = self.framebuffers.take_counters();
        self.stats.binds_issued = binds.issued;
        self.stats.binds_suppressed = binds.suppressed;
        self.stats.programs_linked = self.shaders.take_programs_linked();
        self.stats.framebuffers_created = created;
        self.stats.framebuffers_evicted = evicted;
        self.frame_open = false;
        log::trace!("GlDevice: Frame {} ended: {:?}", self.frame_number, self.stats);
        Ok(self.stats.clone())
    }

    fn present(&mut self, swapchains: &[SwapchainId]) {
        if self.require_context().is_err() {
            log::error!("GlDevice: Present while the context is not usable.");
            return;
        }
        if let Err(e) = self.swapchains.present(&self.gl, &mut self.provider, swapchains) {
            log::error!("GlDevice: Present failed, device is lost: {e}");
            self.lost = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessContext, HeadlessGl};
    use ember_core::math::Extent2D;
    use ember_core::renderer::{BufferUsage, PresentMode, TextureFormat};

    fn device() -> GlDevice<HeadlessGl, HeadlessContext> {
        GlDevice::new(HeadlessGl::new(), HeadlessContext::new(), DeviceSettings::default())
    }

    #[test]
    fn native_work_needs_an_activation() {
        let mut device = device();
        let descriptor = BufferDescriptor::new(64, BufferUsage::UNIFORM);
        assert!(matches!(
            device.create_buffer(&descriptor),
            Err(ResourceError::ContextNotActive)
        ));
        assert!(matches!(device.begin_frame(), Err(RenderError::ContextNotActive)));
        assert!(matches!(device.deactivate(), Err(RenderError::UnbalancedActivation)));

        device.activate().unwrap();
        assert!(device.is_active());
        assert!(device.create_buffer(&descriptor).is_ok());
        device.deactivate().unwrap();
        assert!(!device.is_active());
    }

    #[test]
    fn frames_rotate_fences_over_the_buffering_slots() {
        let mut device = device();
        device.activate().unwrap();
        for _ in 0..4 {
            device.begin_frame().unwrap();
            device.submit(&CommandList::default()).unwrap();
            let stats = device.end_frame().unwrap();
            assert_eq!(stats.frame_number, device.frame_number());
        }
        // Frame 4 reuses the slot of frame 1 and waits on its fence.
        assert_eq!(device.gl().count(|c| matches!(c, GlCall::FenceSync(_))), 4);
        assert_eq!(device.gl().count(|c| matches!(c, GlCall::ClientWaitSync(_))), 1);
        assert_eq!(device.gl().live_fences(), 3);
        device.deactivate().unwrap();
    }

    #[test]
    fn failed_present_loses_the_device() {
        let mut device = device();
        let swapchain = device
            .create_swapchain(&SwapchainDescriptor {
                surface: 5,
                extent: Extent2D {
                    width: 32,
                    height: 32,
                },
                format: TextureFormat::Rgba8Unorm,
                present_mode: PresentMode::Fifo,
            })
            .unwrap();
        device.activate().unwrap();
        device.present(&[swapchain]);
        assert!(device.is_active());
        assert_eq!(device.provider().presented(), &[5]);

        // The platform released the context behind the device's back.
        device.provider_mut().make_current(None).unwrap();
        device.present(&[swapchain]);
        assert!(!device.is_active());
        assert!(matches!(device.begin_frame(), Err(RenderError::DeviceLost)));
        device.deactivate().unwrap();
    }

    #[test]
    fn submit_requires_an_open_frame() {
        let mut device = device();
        device.activate().unwrap();
        assert!(matches!(
            device.submit(&CommandList::default()),
            Err(RenderError::RenderingFailed(_))
        ));
        device.deactivate().unwrap();
    }
}
