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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// The capability interface of a graphics backend.
///
/// Every method that touches native objects requires the device to be
/// active (see [`GraphicsDevice::activate`]); calling them otherwise returns
/// `ContextNotActive`. The device is bound to a single thread and is not
/// `Sync`.
pub trait GraphicsDevice: Debug {
    /// Returns the settings the device was created with.
    fn settings(&self) -> &DeviceSettings;

    /// Makes the device's context current on this thread.
    ///
    /// Calls nest: the first activation saves the previously current context
    /// and the matching last [`deactivate`](GraphicsDevice::deactivate)
    /// restores it.
    /// ## Errors
    /// * `RenderError::ContextSwitchFailed` - If the platform refuses the switch.
    fn activate(&mut self) -> Result<(), RenderError>;

    /// Leaves one level of activation.
    /// ## Errors
    /// * `RenderError::UnbalancedActivation` - If the device is not active.
    fn deactivate(&mut self) -> Result<(), RenderError>;

    /// Returns `true` while the device is active and its context is usable.
    fn is_active(&self) -> bool;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - The buffer configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Writes data to a GPU buffer.
    ///
    /// For ring-buffered buffers the write lands in the current frame's copy.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - The bytes to write.
    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8])
        -> Result<(), ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates a new GPU image.
    /// ## Arguments
    /// * `descriptor` - The image configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created image.
    /// ## Errors
    /// * `ResourceError::UnsupportedFormat` - If the context cannot store the format.
    fn create_image(&mut self, descriptor: &ImageDescriptor) -> Result<ImageId, ResourceError>;

    /// Destroys a GPU image and every cached framebuffer that references it.
    fn destroy_image(&mut self, id: ImageId) -> Result<(), ResourceError>;

    /// Creates a sampler object.
    fn create_sampler(&mut self, descriptor: &SamplerDescriptor)
        -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler object.
    fn destroy_sampler(&mut self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a semaphore used to order submissions.
    fn create_semaphore(&mut self) -> Result<SemaphoreId, ResourceError>;

    /// Destroys a semaphore.
    fn destroy_semaphore(&mut self, id: SemaphoreId) -> Result<(), ResourceError>;

    /// Registers a shader module. Compilation happens when a pipeline uses it.
    fn create_shader_module(
        &mut self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Forgets a shader module. Pipelines built from it stay valid.
    fn destroy_shader_module(&mut self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Creates a pipeline layout.
    fn create_pipeline_layout(
        &mut self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError>;

    /// Destroys a pipeline layout.
    fn destroy_pipeline_layout(&mut self, id: PipelineLayoutId) -> Result<(), ResourceError>;

    /// Creates a render pipeline state object.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the specialized program fails to compile or link.
    fn create_render_pipeline(
        &mut self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys a render pipeline and releases its program.
    fn destroy_render_pipeline(&mut self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a compute pipeline.
    fn create_compute_pipeline(
        &mut self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError>;

    /// Destroys a compute pipeline and releases its program.
    fn destroy_compute_pipeline(&mut self, id: ComputePipelineId) -> Result<(), ResourceError>;

    /// Creates a presentable surface.
    fn create_swapchain(
        &mut self,
        descriptor: &SwapchainDescriptor,
    ) -> Result<SwapchainId, ResourceError>;

    /// Destroys a presentable surface.
    fn destroy_swapchain(&mut self, id: SwapchainId) -> Result<(), ResourceError>;

    /// Starts a frame: waits for the frame slot being reused and rotates ring buffers.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Executes a command list in recorded order.
    ///
    /// Illegal commands are skipped and counted in the frame statistics.
    fn submit(&mut self, commands: &CommandList) -> Result<(), RenderError>;

    /// Ends the frame: fences it, evicts stale cache entries and returns its statistics.
    fn end_frame(&mut self) -> Result<FrameStats, RenderError>;

    /// Presents the given swapchains.
    ///
    /// Failures are not reported per call. A failed present marks the device
    /// as lost, which [`is_active`](GraphicsDevice::is_active) reflects.
    fn present(&mut self, swapchains: &[SwapchainId]);
}
