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

//! Presentable surfaces.
//!
//! A GL context renders every surface through its default framebuffer, so a
//! swapchain here is only the surface handle and its backbuffer size. The
//! first live swapchain defines the size of framebuffer 0 seen by passes.

use super::context::ContextProvider;
use super::native::GlApi;
use ember_core::math::Extent2D;
use ember_core::renderer::{ResourceError, SwapchainDescriptor, SwapchainId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A registered surface.
#[derive(Debug, Clone)]
pub struct Swapchain {
    /// The creation descriptor, updated on resize.
    pub descriptor: SwapchainDescriptor,
}

impl Swapchain {
    /// Changes the backbuffer size. Zero-sized requests are ignored.
    pub fn resize(&mut self, extent: Extent2D) {
        if extent.width > 0 && extent.height > 0 {
            log::info!(
                "GlSwapchain: Resizing surface {:#x} to {}x{}",
                self.descriptor.surface,
                extent.width,
                extent.height
            );
            self.descriptor.extent = extent;
        } else {
            log::warn!(
                "GlSwapchain: Ignoring resize request to zero dimensions: {}x{}",
                extent.width,
                extent.height
            );
        }
    }
}

/// The live swapchains of a device.
#[derive(Debug, Default)]
pub struct SwapchainRegistry {
    swapchains: BTreeMap<SwapchainId, Swapchain>,
    next_id: AtomicUsize,
}

impl SwapchainRegistry {
    /// Registers a surface.
    ///
    /// ## Returns
    /// [`ResourceError::BackendError`] for a zero-sized backbuffer.
    pub fn create(&mut self, descriptor: &SwapchainDescriptor) -> Result<SwapchainId, ResourceError> {
        if descriptor.extent.width == 0 || descriptor.extent.height == 0 {
            return Err(ResourceError::BackendError(format!(
                "swapchain for surface {:#x} has a zero-sized backbuffer",
                descriptor.surface
            )));
        }
        let id = SwapchainId(self.next_id.fetch_add(1, Ordering::Relaxed));
        log::debug!(
            "GlSwapchain: Created {id:?} for surface {:#x} ({}x{}, {:?})",
            descriptor.surface,
            descriptor.extent.width,
            descriptor.extent.height,
            descriptor.present_mode
        );
        self.swapchains.insert(
            id,
            Swapchain {
                descriptor: descriptor.clone(),
            },
        );
        Ok(id)
    }

    /// Forgets a surface.
    pub fn destroy(&mut self, id: SwapchainId) -> Result<(), ResourceError> {
        self.swapchains
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    /// Looks up a surface.
    pub fn get_mut(&mut self, id: SwapchainId) -> Option<&mut Swapchain> {
        self.swapchains.get_mut(&id)
    }

    /// Size of framebuffer 0: the backbuffer of the oldest live swapchain.
    pub fn backbuffer_extent(&self) -> Extent2D {
        self.swapchains
            .values()
            .next()
            .map(|s| s.descriptor.extent)
            .unwrap_or(Extent2D {
                width: 0,
                height: 0,
            })
    }

    /// Flushes pending work and swaps the buffers of each surface in `ids`.
    ///
    /// Unknown ids are skipped with a warning.
    ///
    /// ## Returns
    /// The provider's message for the first surface that failed to swap.
    pub fn present<G: GlApi + ?Sized, P: ContextProvider>(
        &self,
        gl: &G,
        provider: &mut P,
        ids: &[SwapchainId],
    ) -> Result<(), String> {
        gl.flush();
        for id in ids {
            let Some(swapchain) = self.swapchains.get(id) else {
                log::warn!("GlSwapchain: Present of unknown {id:?} ignored.");
                continue;
            };
            provider.swap_buffers(swapchain.descriptor.surface)?;
        }
        Ok(())
    }

    /// Number of live swapchains.
    pub fn len(&self) -> usize {
        self.swapchains.len()
    }

    /// Returns `true` if no swapchain is live.
    pub fn is_empty(&self) -> bool {
        self.swapchains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{HeadlessContext, HeadlessGl};
    use ember_core::renderer::{PresentMode, TextureFormat};

    fn descriptor(surface: u64, width: u32, height: u32) -> SwapchainDescriptor {
        SwapchainDescriptor {
            surface,
            extent: Extent2D { width, height },
            format: TextureFormat::Rgba8Unorm,
            present_mode: PresentMode::Fifo,
        }
    }

    #[test]
    fn oldest_swapchain_defines_the_backbuffer() {
        let mut registry = SwapchainRegistry::default();
        let first = registry.create(&descriptor(10, 800, 600)).unwrap();
        registry.create(&descriptor(11, 320, 200)).unwrap();
        assert_eq!(registry.backbuffer_extent(), Extent2D { width: 800, height: 600 });

        registry.get_mut(first).unwrap().resize(Extent2D { width: 0, height: 10 });
        assert_eq!(registry.backbuffer_extent().width, 800);

        registry.destroy(first).unwrap();
        assert_eq!(registry.backbuffer_extent(), Extent2D { width: 320, height: 200 });
        assert!(matches!(registry.destroy(first), Err(ResourceError::NotFound)));
        assert!(registry.create(&descriptor(12, 0, 0)).is_err());
    }

    #[test]
    fn present_needs_the_own_context() {
        let gl = HeadlessGl::new();
        let mut provider = HeadlessContext::new();
        let mut registry = SwapchainRegistry::default();
        let id = registry.create(&descriptor(10, 64, 64)).unwrap();

        assert!(registry.present(&gl, &mut provider, &[id]).is_err());

        let own = provider.own();
        provider.make_current(Some(own)).unwrap();
        registry.present(&gl, &mut provider, &[id, SwapchainId(99)]).unwrap();
        assert_eq!(provider.presented(), &[10]);
    }
}
