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

//! Execution of recorded command lists.
//!
//! [`Executor`] walks a command list in order, tracking the bound pipeline
//! and the open render pass. Commands that are not legal in the current
//! state are skipped and counted; nothing aborts the stream.

use super::barrier;
use super::conversions::IntoGl;
use super::descriptor::DescriptorState;
use super::format_table::{ClearKind, FormatInfo};
use super::framebuffer_cache::{
    attach_image, draw_buffer_list, FramebufferCache, FramebufferHandle, SubpassTarget,
};
use super::native::{BlitRect, GlApi, GlName, TexelRegion};
use super::pipeline::{PipelineRegistry, ProgramSet};
use super::reflection::ProgramBindings;
use super::render_pass::{self, AttachmentOp, Aspects, PassPlan};
use super::resources::{GlImage, ResourceRegistry};
use super::shader_cache::ShaderCache;
use super::state_cache::{RenderState, StateCache, MAX_VERTEX_BINDINGS};
use ember_core::math::{Extent2D, Origin3D, Rect2D};
use ember_core::renderer::{
    AttachmentDescriptor, BufferCopy, BufferId, BufferImageCopy, ClearValue, Command,
    ComputePipelineId, FilterMode, FrameStats, ImageBlit, ImageCopy, ImageId, ImageKind,
    ImageSubresourceRange, IndexFormat, LoadOp, PipelineBinding, PipelineLayoutDescriptor,
    PipelineLayoutId, RenderPassDescriptor, RenderPipelineId, StencilFaceFlags, StoreOp,
    VertexBufferBinding, Viewport,
};

/// Largest push-constant block accepted.
pub const MAX_PUSH_CONSTANT_BYTES: usize = 256;

/// Per-frame inputs of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// Sequential frame number.
    pub number: u64,
    /// Ring-buffer slot of the frame.
    pub slot: u32,
    /// Size of the default framebuffer.
    pub backbuffer: Extent2D,
    /// Whether rendering to the default framebuffer flips the vertical axis.
    pub flip_default: bool,
    /// Whether descriptor data is validated against layouts.
    pub validation: bool,
}

/// Framebuffers used by copies, blits and clears outside render passes.
#[derive(Debug, Default)]
pub struct ScratchFramebuffers {
    read: GlName,
    draw: GlName,
}

impl ScratchFramebuffers {
    fn ensure<G: GlApi + ?Sized>(&mut self, gl: &G) -> (GlName, GlName) {
        if self.read == 0 {
            self.read = gl.create_framebuffer();
        }
        if self.draw == 0 {
            self.draw = gl.create_framebuffer();
        }
        (self.read, self.draw)
    }

    /// Deletes the scratch framebuffers.
    pub fn destroy<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache) {
        for name in [std::mem::take(&mut self.read), std::mem::take(&mut self.draw)] {
            if name != 0 {
                state.forget_framebuffer(name);
                gl.delete_framebuffer(name);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundPipeline {
    None,
    Render(RenderPipelineId),
    Compute(ComputePipelineId),
}

#[derive(Debug)]
struct ActivePass {
    descriptor: RenderPassDescriptor,
    plan: PassPlan,
    handle: Option<FramebufferHandle>,
    subpass: u32,
    valid: bool,
}

/// Dynamic state set by commands. Viewport and scissor last for the render
/// pass; the other overrides last until the next `BindPipeline`.
#[derive(Debug, Clone, Copy, Default)]
struct DynamicState {
    viewport: Option<Viewport>,
    scissor: Option<Rect2D>,
    line_width: Option<f32>,
    stencil_compare_mask: [Option<u32>; 2],
    stencil_write_mask: [Option<u32>; 2],
    stencil_reference: [Option<u32>; 2],
    blend_constants: Option<[f32; 4]>,
}

impl DynamicState {
    fn reset_pipeline_overrides(&mut self) {
        *self = Self {
            viewport: self.viewport,
            scissor: self.scissor,
            ..Self::default()
        };
    }

    fn set_faces(slots: &mut [Option<u32>; 2], faces: StencilFaceFlags, value: u32) {
        if faces.contains(StencilFaceFlags::FRONT) {
            slots[0] = Some(value);
        }
        if faces.contains(StencilFaceFlags::BACK) {
            slots[1] = Some(value);
        }
    }

    fn apply(&self, render_state: &mut RenderState) {
        if let Some(width) = self.line_width {
            render_state.raster.line_width = width;
        }
        let stencil = &mut render_state.stencil;
        for (index, face) in [&mut stencil.front, &mut stencil.back].into_iter().enumerate() {
            if let Some(mask) = self.stencil_compare_mask[index] {
                face.compare_mask = mask;
            }
            if let Some(mask) = self.stencil_write_mask[index] {
                face.write_mask = mask;
            }
            if let Some(reference) = self.stencil_reference[index] {
                face.reference = reference as i32;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexBinding {
    buffer: BufferId,
    offset: u64,
    format: IndexFormat,
}

/// A rectangle in window coordinates, mirrored when rendering to a flipped
/// default framebuffer.
fn device_rect(rect: Rect2D, flip: bool, surface_height: u32) -> [i32; 4] {
    if flip {
        rect.flipped_y(surface_height).into_gl()
    } else {
        rect.into_gl()
    }
}

fn blit_rect(rect: Rect2D, flip: bool, surface_height: u32) -> BlitRect {
    let x0 = rect.offset.x;
    let x1 = rect.offset.x + rect.extent.width as i32;
    let y0 = rect.offset.y;
    let y1 = rect.offset.y + rect.extent.height as i32;
    if flip {
        let h = surface_height as i32;
        BlitRect {
            x0,
            y0: h - y0,
            x1,
            y1: h - y1,
        }
    } else {
        BlitRect { x0, y0, x1, y1 }
    }
}

/// Narrows a byte offset to the integer width a GL entry point takes.
fn native_offset<T: TryFrom<u64>>(offset: Option<u64>, what: &str) -> Option<T> {
    let narrowed = offset.and_then(|o| T::try_from(o).ok());
    if narrowed.is_none() {
        log::error!("Executor: {what} offset exceeds native limits, skipped.");
    }
    narrowed
}

/// Buffer offsets of the first `layers` image layers of `region`. `None` when
/// one does not fit the 32-bit offsets pixel transfers take.
fn layer_offsets(
    base: u64,
    region: &BufferImageCopy,
    layers: u32,
    bytes_per_pixel: u32,
) -> Option<Vec<u32>> {
    let extent = region.image_extent;
    let row = match region.buffer_row_length {
        0 => extent.width,
        row => row,
    };
    let rows = match region.buffer_image_height {
        0 => extent.height,
        rows => rows,
    };
    let layer_bytes = (u64::from(row) * u64::from(rows)).checked_mul(u64::from(bytes_per_pixel))?;
    let start = base.checked_add(region.buffer_offset)?;
    (0..layers)
        .map(|layer| {
            let at = u64::from(layer).checked_mul(layer_bytes)?.checked_add(start)?;
            u32::try_from(at).ok()
        })
        .collect()
}

fn clear_color<G: GlApi + ?Sized>(
    gl: &G,
    format: Option<&FormatInfo>,
    draw_buffer: i32,
    color: [f32; 4],
) {
    match format.map(FormatInfo::clear_kind) {
        Some(ClearKind::Int) => {
            gl.clear_buffer_i32(glow::COLOR, draw_buffer, &color.map(|c| c as i32))
        }
        Some(ClearKind::UInt) => {
            gl.clear_buffer_u32(glow::COLOR, draw_buffer, &color.map(|c| c as u32))
        }
        _ => gl.clear_buffer_f32(glow::COLOR, draw_buffer, &color),
    }
}

fn clear_depth_stencil<G: GlApi + ?Sized>(gl: &G, aspects: Aspects, depth: f32, stencil: u32) {
    match (aspects.contains(Aspects::DEPTH), aspects.contains(Aspects::STENCIL)) {
        (true, true) => gl.clear_buffer_depth_stencil(depth, stencil as i32),
        (true, false) => gl.clear_buffer_f32(glow::DEPTH, 0, &[depth]),
        (false, true) => gl.clear_buffer_i32(glow::STENCIL, 0, &[stencil as i32]),
        (false, false) => {}
    }
}

fn clear_attachment<G: GlApi + ?Sized>(
    gl: &G,
    attachment: &AttachmentDescriptor,
    op: &AttachmentOp,
) {
    match (attachment.clear_value, op.aspects.contains(Aspects::COLOR)) {
        (ClearValue::Color(color), true) => clear_color(
            gl,
            super::format_table::lookup(attachment.format),
            op.color_index.unwrap_or(0) as i32,
            color.to_array(),
        ),
        (ClearValue::DepthStencil { depth, stencil }, false) => {
            clear_depth_stencil(gl, op.aspects, depth, stencil)
        }
        _ => log::warn!(
            "Executor: Clear value of attachment {} does not match its format {:?}",
            op.attachment,
            attachment.format
        ),
    }
}

/// Uploads the push-constant members of `bindings` that overlap `range`.
fn upload_push_constants<G: GlApi + ?Sized>(
    gl: &G,
    bindings: &ProgramBindings,
    data: &[u8],
    range: (u32, u32),
) {
    for slot in bindings.push_constants() {
        let start = slot.offset as usize;
        let end = start + slot.size as usize;
        if end <= range.0 as usize || start >= range.1 as usize {
            continue;
        }
        let mut bytes = vec![0u8; slot.size as usize];
        if start < data.len() {
            let available = end.min(data.len()) - start;
            bytes[..available].copy_from_slice(&data[start..start + available]);
        }
        let words: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes);
        gl.uniform_words(slot.location, slot.uniform_kind(), slot.ty.components(), &words);
    }
}

/// The push-constant block and the range not yet uploaded.
#[derive(Debug, Default)]
struct PushConstantBlock {
    data: Vec<u8>,
    dirty: Option<(u32, u32)>,
    program: GlName,
}

impl PushConstantBlock {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        let end = offset as usize + bytes.len();
        if end > MAX_PUSH_CONSTANT_BYTES {
            log::error!(
                "Executor: Push constants {offset}..{end} exceed {MAX_PUSH_CONSTANT_BYTES} bytes"
            );
            return false;
        }
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset as usize..end].copy_from_slice(bytes);
        let (start, stop) = self.dirty.unwrap_or((offset, end as u32));
        self.dirty = Some((start.min(offset), stop.max(end as u32)));
        true
    }

    /// Uploads the dirty range, or the whole block after a program change.
    fn flush<G: GlApi + ?Sized>(&mut self, gl: &G, program: GlName, bindings: &ProgramBindings) {
        if self.data.is_empty() {
            return;
        }
        let range = if program != self.program {
            Some((0, self.data.len() as u32))
        } else {
            self.dirty
        };
        if let Some(range) = range {
            upload_push_constants(gl, bindings, &self.data, range);
        }
        self.program = program;
        self.dirty = None;
    }
}

/// Executes command lists against the device's caches.
pub struct Executor<'a, G: GlApi + ?Sized> {
    gl: &'a G,
    state: &'a mut StateCache,
    shaders: &'a mut ShaderCache,
    resources: &'a ResourceRegistry,
    pipelines: &'a mut PipelineRegistry,
    framebuffers: &'a mut FramebufferCache,
    scratch: &'a mut ScratchFramebuffers,
    frame: FrameContext,
    stats: &'a mut FrameStats,

    descriptors: DescriptorState,
    pipeline: BoundPipeline,
    pass: Option<ActivePass>,
    vertex_buffers: [Option<VertexBufferBinding>; MAX_VERTEX_BINDINGS],
    index_buffer: Option<IndexBinding>,
    push: PushConstantBlock,
    dynamic: DynamicState,
}

impl<'a, G: GlApi + ?Sized> Executor<'a, G> {
    /// Creates an executor with no pipeline bound and no pass open.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gl: &'a G,
        state: &'a mut StateCache,
        shaders: &'a mut ShaderCache,
        resources: &'a ResourceRegistry,
        pipelines: &'a mut PipelineRegistry,
        framebuffers: &'a mut FramebufferCache,
        scratch: &'a mut ScratchFramebuffers,
        frame: FrameContext,
        stats: &'a mut FrameStats,
    ) -> Self {
        Self {
            gl,
            state,
            shaders,
            resources,
            pipelines,
            framebuffers,
            scratch,
            frame,
            stats,
            descriptors: DescriptorState::new(),
            pipeline: BoundPipeline::None,
            pass: None,
            vertex_buffers: [None; MAX_VERTEX_BINDINGS],
            index_buffer: None,
            push: PushConstantBlock::default(),
            dynamic: DynamicState::default(),
        }
    }

    /// Executes `commands` in order. A pass left open at the end is closed.
    pub fn execute(&mut self, commands: &[Command]) {
        for command in commands {
            if !self.execute_one(command) {
                self.stats.skipped_commands += 1;
                log::debug!("Executor: Skipped {}", command_name(command));
            }
        }
        if self.pass.is_some() {
            log::warn!("Executor: Command list ended inside a render pass, closing it.");
            self.end_render_pass();
        }
    }

    fn execute_one(&mut self, command: &Command) -> bool {
        match command {
            Command::BeginRenderPass(descriptor) => self.begin_render_pass(descriptor),
            Command::NextSubpass => self.next_subpass(),
            Command::EndRenderPass => self.end_render_pass(),
            Command::BindPipeline(binding) => self.bind_pipeline(*binding),
            Command::BindVertexBuffers {
                first_binding,
                buffers,
            } => {
                let first = *first_binding as usize;
                if first + buffers.len() > MAX_VERTEX_BINDINGS {
                    log::error!(
                        "Executor: Vertex buffers {first}..{} exceed {MAX_VERTEX_BINDINGS} bindings",
                        first + buffers.len()
                    );
                    return false;
                }
                for (slot, buffer) in self.vertex_buffers[first..].iter_mut().zip(buffers) {
                    *slot = Some(*buffer);
                }
                true
            }
            Command::BindIndexBuffer {
                buffer,
                offset,
                format,
            } => {
                self.index_buffer = Some(IndexBinding {
                    buffer: *buffer,
                    offset: *offset,
                    format: *format,
                });
                true
            }
            Command::BindDescriptorSets {
                first_set,
                sets,
                dynamic_offsets,
            } => match self.descriptors.bind_sets(*first_set, sets, dynamic_offsets) {
                Ok(()) => true,
                Err(err) => {
                    log::error!("Executor: BindDescriptorSets rejected: {err}");
                    false
                }
            },
            Command::PushConstants { offset, data } => self.push.write(*offset, data),
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => self.draw(*vertex_count, *instance_count, *first_vertex, *first_instance),
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => self.draw_indexed(
                *index_count,
                *instance_count,
                *first_index,
                *vertex_offset,
                *first_instance,
            ),
            Command::DrawIndirect {
                buffer,
                offset,
                draw_count,
                stride,
                indexed,
            } => self.draw_indirect(*buffer, *offset, *draw_count, *stride, *indexed),
            Command::Dispatch { x, y, z } => self.dispatch(Some([*x, *y, *z]), None),
            Command::DispatchIndirect { buffer, offset } => {
                self.dispatch(None, Some((*buffer, *offset)))
            }
            Command::CopyBuffer { src, dst, regions } => self.copy_buffer(*src, *dst, regions),
            Command::CopyBufferToImage { src, dst, regions } => {
                self.copy_buffer_to_image(*src, *dst, regions)
            }
            Command::CopyImageToBuffer { src, dst, regions } => {
                self.copy_image_to_buffer(*src, *dst, regions)
            }
            Command::CopyImage { src, dst, regions } => self.copy_image(*src, *dst, regions),
            Command::BlitImage {
                src,
                dst,
                regions,
                filter,
            } => self.blit_image(*src, *dst, regions, *filter),
            Command::BarrierPoint(point) => {
                self.stats.barriers_issued += barrier::issue(self.gl, point);
                true
            }
            Command::ClearColorImage { image, color, range } => {
                self.clear_image(*image, *range, ClearValue::Color(*color))
            }
            Command::ClearDepthStencilImage {
                image,
                depth,
                stencil,
                range,
            } => self.clear_image(
                *image,
                *range,
                ClearValue::DepthStencil {
                    depth: *depth,
                    stencil: *stencil,
                },
            ),
            Command::SetViewport(viewport) => {
                self.dynamic.viewport = Some(*viewport);
                true
            }
            Command::SetScissor(rect) => {
                self.dynamic.scissor = Some(*rect);
                true
            }
            Command::SetLineWidth(width) => {
                self.dynamic.line_width = Some(*width);
                true
            }
            Command::SetStencilCompareMask { faces, mask } => {
                DynamicState::set_faces(&mut self.dynamic.stencil_compare_mask, *faces, *mask);
                true
            }
            Command::SetStencilWriteMask { faces, mask } => {
                DynamicState::set_faces(&mut self.dynamic.stencil_write_mask, *faces, *mask);
                true
            }
            Command::SetStencilReference { faces, reference } => {
                DynamicState::set_faces(&mut self.dynamic.stencil_reference, *faces, *reference);
                true
            }
            Command::SetBlendConstants(color) => {
                self.dynamic.blend_constants = Some(color.to_array());
                true
            }
        }
    }

    // --- Render passes ---

    fn begin_render_pass(&mut self, descriptor: &RenderPassDescriptor) -> bool {
        if self.pass.is_some() {
            log::error!("Executor: BeginRenderPass inside an open render pass.");
            return false;
        }
        self.dynamic.viewport = None;
        self.dynamic.scissor = None;

        let (handle, valid) = match render_pass::validate(descriptor) {
            Ok(()) => {
                let handle = self.framebuffers.get_framebuffer(
                    self.gl,
                    self.state,
                    self.resources,
                    descriptor,
                    self.frame.number,
                    self.frame.backbuffer,
                    self.frame.flip_default,
                );
                let valid = self.framebuffers.get(handle).is_some_and(|e| e.valid);
                (Some(handle), valid)
            }
            Err(reason) => {
                log::error!("Executor: Invalid render pass: {reason}");
                (None, false)
            }
        };
        self.pass = Some(ActivePass {
            descriptor: descriptor.clone(),
            plan: PassPlan::new(descriptor),
            handle,
            subpass: 0,
            valid,
        });
        self.begin_subpass();
        true
    }

    fn next_subpass(&mut self) -> bool {
        let has_next = self
            .pass
            .as_ref()
            .is_some_and(|p| (p.subpass as usize) + 1 < p.descriptor.subpasses.len());
        if !has_next {
            log::error!("Executor: NextSubpass without a following subpass.");
            return false;
        }
        self.end_subpass();
        if let Some(pass) = self.pass.as_mut() {
            pass.subpass += 1;
        }
        self.begin_subpass();
        true
    }

    fn end_render_pass(&mut self) -> bool {
        if self.pass.is_none() {
            log::error!("Executor: EndRenderPass without an open render pass.");
            return false;
        }
        self.end_subpass();
        self.pass = None;
        true
    }

    fn subpass_target(&self) -> Option<(SubpassTarget, Extent2D)> {
        let pass = self.pass.as_ref().filter(|p| p.valid)?;
        let entry = self.framebuffers.get(pass.handle?)?;
        let target = entry.subpasses.get(pass.subpass as usize).copied()?;
        Some((target, entry.extent))
    }

    fn surface_height(&self, target: &SubpassTarget, extent: Extent2D) -> u32 {
        if target.framebuffer == 0 {
            self.frame.backbuffer.height
        } else {
            extent.height
        }
    }

    fn begin_subpass(&mut self) {
        let Some((target, extent)) = self.subpass_target() else {
            return;
        };
        let height = self.surface_height(&target, extent);
        let Some(pass) = self.pass.as_ref() else {
            return;
        };
        let gl = self.gl;
        self.state.bind_framebuffer(gl, glow::DRAW_FRAMEBUFFER, target.framebuffer);

        let discarded: Vec<u32> = pass
            .plan
            .first_use_loads(&pass.descriptor, pass.subpass, LoadOp::DontCare)
            .iter()
            .flat_map(|op| {
                op.aspects
                    .invalidation_targets(op.color_index.unwrap_or(0), target.framebuffer == 0)
            })
            .collect();
        if !discarded.is_empty() {
            gl.invalidate_framebuffer(glow::DRAW_FRAMEBUFFER, &discarded);
        }

        let clears = pass
            .plan
            .first_use_loads(&pass.descriptor, pass.subpass, LoadOp::Clear);
        if !clears.is_empty() {
            self.state.prepare_clear(gl);
            let area = device_rect(pass.descriptor.render_area, target.flip_y, height);
            self.state.set_scissor(gl, Some(area));
            for op in &clears {
                clear_attachment(gl, &pass.descriptor.attachments[op.attachment as usize], op);
            }
        }
    }

    fn end_subpass(&mut self) {
        let Some((target, extent)) = self.subpass_target() else {
            return;
        };
        let height = self.surface_height(&target, extent);
        let Some(pass) = self.pass.as_ref() else {
            return;
        };
        let gl = self.gl;
        let index = pass.subpass;
        let subpass = &pass.descriptor.subpasses[index as usize];
        let area = pass.descriptor.render_area;

        if let Some(resolve_fbo) = target.resolve_framebuffer {
            let src = blit_rect(area, target.flip_y, height);
            let dst = blit_rect(area, target.resolve_flip_y, self.frame.backbuffer.height);
            let mut narrowed = false;
            let colors = subpass.resolve_attachments.iter().enumerate();
            for (color_index, resolve) in colors {
                let Some(resolve) = *resolve else {
                    continue;
                };
                if !pass.plan.resolve_needed(&pass.descriptor, index, resolve) {
                    log::trace!("Executor: Resolve into attachment {resolve} elided");
                    continue;
                }
                self.state.bind_framebuffers(gl, target.framebuffer, resolve_fbo);
                gl.read_buffer(glow::COLOR_ATTACHMENT0 + color_index as u32);
                if resolve_fbo != 0 {
                    let mut draw_buffers = vec![glow::NONE; color_index + 1];
                    draw_buffers[color_index] = glow::COLOR_ATTACHMENT0 + color_index as u32;
                    gl.draw_buffers(&draw_buffers);
                    narrowed = true;
                }
                gl.blit_framebuffer(src, dst, glow::COLOR_BUFFER_BIT, glow::NEAREST);
            }
            // The resolve framebuffer may also be the draw target of a later subpass.
            if narrowed {
                gl.draw_buffers(&draw_buffer_list(&subpass.resolve_attachments));
            }
            if let Some(depth) = subpass.depth_resolve_attachment {
                if pass.plan.resolve_needed(&pass.descriptor, index, depth) {
                    let format = pass.descriptor.attachments[depth as usize].format;
                    let mask = super::format_table::lookup(format)
                        .map_or(glow::DEPTH_BUFFER_BIT, FormatInfo::buffer_mask);
                    self.state.bind_framebuffers(gl, target.framebuffer, resolve_fbo);
                    gl.blit_framebuffer(src, dst, mask, glow::NEAREST);
                }
            }
        }

        let stored_nowhere: Vec<u32> = pass
            .plan
            .last_use_stores(&pass.descriptor, index, StoreOp::DontCare)
            .iter()
            .flat_map(|op| {
                op.aspects
                    .invalidation_targets(op.color_index.unwrap_or(0), target.framebuffer == 0)
            })
            .collect();
        if !stored_nowhere.is_empty() {
            self.state.bind_framebuffer(gl, glow::DRAW_FRAMEBUFFER, target.framebuffer);
            gl.invalidate_framebuffer(glow::DRAW_FRAMEBUFFER, &stored_nowhere);
        }
    }

    // --- Pipelines and resources ---

    fn bind_pipeline(&mut self, binding: PipelineBinding) -> bool {
        let known = match binding {
            PipelineBinding::Render(id) => self.pipelines.render.contains_key(&id),
            PipelineBinding::Compute(id) => self.pipelines.compute.contains_key(&id),
        };
        if !known {
            log::error!("Executor: BindPipeline with unknown {binding:?}");
            return false;
        }
        self.pipeline = match binding {
            PipelineBinding::Render(id) => BoundPipeline::Render(id),
            PipelineBinding::Compute(id) => BoundPipeline::Compute(id),
        };
        self.dynamic.reset_pipeline_overrides();
        self.push.program = 0;
        true
    }

    /// Makes the right program variant current, binds its resources and
    /// uploads pending push constants.
    #[allow(clippy::too_many_arguments)]
    fn bind_program(
        gl: &G,
        state: &mut StateCache,
        shaders: &mut ShaderCache,
        programs: &mut ProgramSet,
        descriptors: &mut DescriptorState,
        push: &mut PushConstantBlock,
        layout: (PipelineLayoutId, &PipelineLayoutDescriptor),
        resources: &ResourceRegistry,
        frame: &FrameContext,
    ) -> Option<()> {
        let external = descriptors.external_bindings(&programs.base().bindings, resources);
        let variant = programs.variant(gl, state, shaders, &external)?;
        state.use_program(gl, variant.program);
        descriptors.bind_resources(
            gl,
            state,
            &variant.bindings,
            layout.0,
            layout.1,
            resources,
            frame.slot,
            frame.validation,
        );
        push.flush(gl, variant.program, &variant.bindings);
        Some(())
    }

    /// Prepares the bound render pipeline for a draw.
    ///
    /// ## Returns
    /// The primitive mode, or `None` if the draw must be skipped.
    fn prepare_draw(&mut self, first_instance: u32) -> Option<u32> {
        let BoundPipeline::Render(id) = self.pipeline else {
            log::debug!("Executor: Draw without a render pipeline.");
            return None;
        };
        let Some((target, extent)) = self.subpass_target() else {
            log::debug!("Executor: Draw outside a valid render pass.");
            return None;
        };
        let height = self.surface_height(&target, extent);
        let render_area = self.pass.as_ref().map(|p| p.descriptor.render_area)?;
        let gl = self.gl;

        let registry = &mut *self.pipelines;
        let pipeline = registry.render.get_mut(&id)?;
        let Some(layout) = registry.layouts.get(&pipeline.layout) else {
            log::error!("Executor: Render pipeline {id:?} lost its layout.");
            return None;
        };
        Self::bind_program(
            gl,
            self.state,
            self.shaders,
            &mut pipeline.programs,
            &mut self.descriptors,
            &mut self.push,
            (pipeline.layout, layout),
            self.resources,
            &self.frame,
        )?;

        self.state.bind_vertex_array(gl, pipeline.vertex_array);
        for (binding, slot) in pipeline.vertex_buffers.iter().enumerate() {
            let bound = self.vertex_buffers.get(binding).copied().flatten().and_then(|b| {
                let buffer = self.resources.buffer(b.buffer)?;
                Some((buffer.name, buffer.ring_offset(self.frame.slot) + b.offset))
            });
            let (name, mut offset) = bound.unwrap_or((0, 0));
            if slot.per_instance {
                offset += u64::from(first_instance) * slot.stride as u64;
            }
            self.state
                .bind_vertex_buffer(gl, binding as u32, name, offset as i32, slot.stride);
        }

        let mut render_state = pipeline.render_state;
        self.dynamic.apply(&mut render_state);
        if target.flip_y {
            render_state.raster.front_face = match render_state.raster.front_face {
                glow::CCW => glow::CW,
                _ => glow::CCW,
            };
        }
        self.state.apply_render_state(gl, &render_state);
        if render_state.blend.enabled {
            let color = self.dynamic.blend_constants.unwrap_or(pipeline.blend_constant);
            self.state.set_blend_color(gl, color);
        }

        let viewport = self
            .dynamic
            .viewport
            .unwrap_or_else(|| Viewport::from_rect(render_area));
        let [x, y, w, h] =
            [viewport.x, viewport.y, viewport.width, viewport.height].map(|v| v as i32);
        let y = if target.flip_y { height as i32 - (y + h) } else { y };
        self.state.set_viewport(gl, [x, y, w, h]);
        self.state
            .set_depth_range(gl, viewport.min_depth, viewport.max_depth);
        let scissor = self.dynamic.scissor.unwrap_or(render_area);
        self.state
            .set_scissor(gl, Some(device_rect(scissor, target.flip_y, height)));

        Some(pipeline.topology)
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> bool {
        let Some(mode) = self.prepare_draw(first_instance) else {
            return false;
        };
        self.gl.draw_arrays_instanced(
            mode,
            first_vertex as i32,
            vertex_count as i32,
            instance_count as i32,
        );
        self.stats.draw_calls += 1;
        true
    }

    fn bind_index_buffer(&mut self) -> Option<(u32, u64, u64)> {
        let binding = self.index_buffer?;
        let buffer = self.resources.buffer(binding.buffer)?;
        self.state
            .bind_buffer(self.gl, glow::ELEMENT_ARRAY_BUFFER, buffer.name);
        Some((
            binding.format.into_gl(),
            buffer.ring_offset(self.frame.slot) + binding.offset,
            binding.format.size(),
        ))
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> bool {
        if self.index_buffer.is_none() {
            log::debug!("Executor: DrawIndexed without an index buffer.");
            return false;
        }
        let Some(mode) = self.prepare_draw(first_instance) else {
            return false;
        };
        let Some((index_type, offset, index_size)) = self.bind_index_buffer() else {
            return false;
        };
        let first = u64::from(first_index)
            .checked_mul(index_size)
            .and_then(|bytes| bytes.checked_add(offset));
        let Some(first) = native_offset::<i32>(first, "DrawIndexed") else {
            return false;
        };
        self.gl.draw_elements_instanced_base_vertex(
            mode,
            index_count as i32,
            index_type,
            first,
            instance_count as i32,
            vertex_offset,
        );
        self.stats.draw_calls += 1;
        true
    }

    fn draw_indirect(
        &mut self,
        buffer: BufferId,
        offset: u64,
        draw_count: u32,
        stride: u32,
        indexed: bool,
    ) -> bool {
        let Some((name, base)) =
            self.resources.buffer(buffer).map(|b| (b.name, b.ring_offset(self.frame.slot)))
        else {
            log::debug!("Executor: DrawIndirect with unknown {buffer:?}");
            return false;
        };
        if indexed && self.index_buffer.is_none() {
            return false;
        }
        // Every record lies below the last one.
        let span = u64::from(draw_count.saturating_sub(1)) * u64::from(stride);
        let last = base.checked_add(offset).and_then(|s| s.checked_add(span));
        if native_offset::<i32>(last, "DrawIndirect").is_none() {
            return false;
        }
        let Some(mode) = self.prepare_draw(0) else {
            return false;
        };
        let index_type = if indexed {
            match self.bind_index_buffer() {
                Some((index_type, _, _)) => Some(index_type),
                None => return false,
            }
        } else {
            None
        };
        self.state.bind_buffer(self.gl, glow::DRAW_INDIRECT_BUFFER, name);
        for draw in 0..u64::from(draw_count) {
            let Ok(at) = i32::try_from(base + offset + draw * u64::from(stride)) else {
                break;
            };
            match index_type {
                Some(index_type) => self.gl.draw_elements_indirect(mode, index_type, at),
                None => self.gl.draw_arrays_indirect(mode, at),
            }
        }
        self.stats.draw_calls += draw_count;
        true
    }

    fn dispatch(&mut self, groups: Option<[u32; 3]>, indirect: Option<(BufferId, u64)>) -> bool {
        let BoundPipeline::Compute(id) = self.pipeline else {
            log::debug!("Executor: Dispatch without a compute pipeline.");
            return false;
        };
        if self.pass.is_some() {
            log::debug!("Executor: Dispatch inside a render pass.");
            return false;
        }
        let args = match indirect {
            Some((buffer, offset)) => {
                let Some(b) = self.resources.buffer(buffer) else {
                    return false;
                };
                let at = b.ring_offset(self.frame.slot).checked_add(offset);
                match native_offset::<i32>(at, "DispatchIndirect") {
                    Some(at) => Some((b.name, at)),
                    None => return false,
                }
            }
            None => None,
        };
        let gl = self.gl;
        let registry = &mut *self.pipelines;
        let Some(pipeline) = registry.compute.get_mut(&id) else {
            return false;
        };
        let Some(layout) = registry.layouts.get(&pipeline.layout) else {
            log::error!("Executor: Compute pipeline {id:?} lost its layout.");
            return false;
        };
        if Self::bind_program(
            gl,
            self.state,
            self.shaders,
            &mut pipeline.programs,
            &mut self.descriptors,
            &mut self.push,
            (pipeline.layout, layout),
            self.resources,
            &self.frame,
        )
        .is_none()
        {
            return false;
        }

        match (groups, args) {
            (Some([x, y, z]), _) => gl.dispatch_compute(x, y, z),
            (None, Some((name, offset))) => {
                self.state.bind_buffer(gl, glow::DISPATCH_INDIRECT_BUFFER, name);
                gl.dispatch_compute_indirect(offset);
            }
            (None, None) => return false,
        }
        self.stats.dispatches += 1;
        true
    }

    // --- Transfers ---

    fn outside_pass(&self, what: &str) -> bool {
        if self.pass.is_some() {
            log::error!("Executor: {what} inside a render pass.");
            return false;
        }
        true
    }

    fn copy_buffer(&mut self, src: BufferId, dst: BufferId, regions: &[BufferCopy]) -> bool {
        if !self.outside_pass("CopyBuffer") {
            return false;
        }
        let (Some(from), Some(to)) = (self.resources.buffer(src), self.resources.buffer(dst)) else {
            return false;
        };
        let gl = self.gl;
        self.state.bind_buffer(gl, glow::COPY_READ_BUFFER, from.name);
        self.state.bind_buffer(gl, glow::COPY_WRITE_BUFFER, to.name);
        let src_base = from.ring_offset(self.frame.slot);
        let dst_base = to.ring_offset(self.frame.slot);
        for region in regions {
            let fits = |offset: u64, size: u64| {
                matches!(offset.checked_add(region.size), Some(end) if end <= size)
            };
            if !fits(region.src_offset, from.descriptor.size)
                || !fits(region.dst_offset, to.descriptor.size)
            {
                log::error!("Executor: CopyBuffer region {region:?} out of bounds, skipped.");
                continue;
            }
            let (Some(read), Some(write), Some(size)) = (
                native_offset::<i32>(src_base.checked_add(region.src_offset), "CopyBuffer"),
                native_offset::<i32>(dst_base.checked_add(region.dst_offset), "CopyBuffer"),
                native_offset::<i32>(Some(region.size), "CopyBuffer"),
            ) else {
                continue;
            };
            gl.copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                read,
                write,
                size,
            );
        }
        true
    }

    fn transferable_image(&self, id: ImageId) -> Option<&'a GlImage> {
        let image = self.resources.image(id)?;
        if image.is_external() || !image.format.is_transferable() {
            log::error!("Executor: Image {id:?} cannot take part in pixel transfers.");
            return None;
        }
        Some(image)
    }

    fn copy_buffer_to_image(
        &mut self,
        src: BufferId,
        dst: ImageId,
        regions: &[BufferImageCopy],
    ) -> bool {
        if !self.outside_pass("CopyBufferToImage") {
            return false;
        }
        let (Some(buffer), Some(image)) = (self.resources.buffer(src), self.transferable_image(dst))
        else {
            return false;
        };
        let gl = self.gl;
        let base = buffer.ring_offset(self.frame.slot);
        let bytes_per_pixel = image.descriptor.format.bytes_per_pixel();
        self.state.bind_buffer(gl, glow::PIXEL_UNPACK_BUFFER, buffer.name);
        self.state.bind_texture_for_edit(gl, 0, image.target, image.name);
        for region in regions {
            let layers = region.image_subresource;
            let faces = match image.descriptor.kind {
                ImageKind::Cube => layers.array_layer_count,
                _ => 1,
            };
            let Some(offsets) = layer_offsets(base, region, faces, bytes_per_pixel) else {
                log::error!("Executor: CopyBufferToImage offset exceeds native limits, skipped.");
                continue;
            };
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, region.buffer_row_length as i32);
            gl.pixel_store_i32(glow::UNPACK_IMAGE_HEIGHT, region.buffer_image_height as i32);
            let level = layers.mip_level as i32;
            let extent = region.image_extent;
            let (target, z, depth) = match image.descriptor.kind {
                ImageKind::D3 => (image.target, region.image_offset.z, extent.depth as i32),
                ImageKind::D2Array | ImageKind::CubeArray => (
                    image.target,
                    layers.base_array_layer as i32,
                    layers.array_layer_count as i32,
                ),
                ImageKind::Cube => {
                    (glow::TEXTURE_CUBE_MAP_POSITIVE_X + layers.base_array_layer, 0, 1)
                }
                _ => (image.target, 0, 1),
            };
            for (face, offset) in (0u32..).zip(offsets) {
                gl.tex_sub_image_from_buffer(
                    target + face,
                    level,
                    TexelRegion {
                        x: region.image_offset.x,
                        y: region.image_offset.y,
                        z,
                        width: extent.width as i32,
                        height: extent.height as i32,
                        depth,
                    },
                    image.format.external_format,
                    image.format.data_type,
                    offset,
                );
            }
        }
        gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
        gl.pixel_store_i32(glow::UNPACK_IMAGE_HEIGHT, 0);
        self.state.bind_buffer(gl, glow::PIXEL_UNPACK_BUFFER, 0);
        true
    }

    fn copy_image_to_buffer(
        &mut self,
        src: ImageId,
        dst: BufferId,
        regions: &[BufferImageCopy],
    ) -> bool {
        if !self.outside_pass("CopyImageToBuffer") {
            return false;
        }
        let (Some(image), Some(buffer)) = (self.transferable_image(src), self.resources.buffer(dst))
        else {
            return false;
        };
        if image.format.clear_kind() == ClearKind::DepthStencil {
            log::error!("Executor: Depth/stencil readback is not available.");
            return false;
        }
        let gl = self.gl;
        let (read, _) = self.scratch.ensure(gl);
        let base = buffer.ring_offset(self.frame.slot);
        let bytes_per_pixel = image.descriptor.format.bytes_per_pixel();
        self.state.bind_framebuffer(gl, glow::READ_FRAMEBUFFER, read);
        self.state.bind_buffer(gl, glow::PIXEL_PACK_BUFFER, buffer.name);
        for region in regions {
            let layers = region.image_subresource;
            let count = layers.array_layer_count.max(1);
            let Some(offsets) = layer_offsets(base, region, count, bytes_per_pixel) else {
                log::error!("Executor: CopyImageToBuffer offset exceeds native limits, skipped.");
                continue;
            };
            let extent = region.image_extent;
            gl.pixel_store_i32(glow::PACK_ROW_LENGTH, region.buffer_row_length as i32);
            for (layer, offset) in (0u32..).zip(offsets) {
                attach_image(
                    gl,
                    glow::READ_FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    image,
                    layers.mip_level,
                    layers.base_array_layer + layer,
                );
                gl.read_buffer(glow::COLOR_ATTACHMENT0);
                gl.read_pixels_to_buffer(
                    region.image_offset.x,
                    region.image_offset.y,
                    extent.width as i32,
                    extent.height as i32,
                    image.format.external_format,
                    image.format.data_type,
                    offset,
                );
            }
        }
        gl.pixel_store_i32(glow::PACK_ROW_LENGTH, 0);
        gl.framebuffer_texture_2d(
            glow::READ_FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0,
            glow::TEXTURE_2D,
            0,
            0,
        );
        self.state.bind_buffer(gl, glow::PIXEL_PACK_BUFFER, 0);
        true
    }

    /// Blits one layer pair through the scratch framebuffers.
    #[allow(clippy::too_many_arguments)]
    fn blit_layers(
        &mut self,
        src: &GlImage,
        dst: &GlImage,
        src_level: u32,
        src_layer: u32,
        dst_level: u32,
        dst_layer: u32,
        rects: (BlitRect, BlitRect),
        filter: u32,
    ) {
        let gl = self.gl;
        let (read, draw) = self.scratch.ensure(gl);
        self.state.bind_framebuffers(gl, read, draw);
        let point = src.format.attachment_point(0);
        let dst_point = dst.format.attachment_point(0);
        attach_image(gl, glow::READ_FRAMEBUFFER, point, src, src_level, src_layer);
        attach_image(gl, glow::DRAW_FRAMEBUFFER, dst_point, dst, dst_level, dst_layer);
        if point == glow::COLOR_ATTACHMENT0 {
            gl.read_buffer(glow::COLOR_ATTACHMENT0);
            gl.draw_buffers(&[glow::COLOR_ATTACHMENT0]);
        }
        self.state.set_scissor(gl, None);
        gl.blit_framebuffer(rects.0, rects.1, src.format.buffer_mask(), filter);
        gl.framebuffer_texture_2d(glow::READ_FRAMEBUFFER, point, glow::TEXTURE_2D, 0, 0);
        gl.framebuffer_texture_2d(glow::DRAW_FRAMEBUFFER, dst_point, glow::TEXTURE_2D, 0, 0);
    }

    fn copy_image(&mut self, src: ImageId, dst: ImageId, regions: &[ImageCopy]) -> bool {
        if !self.outside_pass("CopyImage") {
            return false;
        }
        let (Some(from), Some(to)) = (self.resources.image(src), self.resources.image(dst)) else {
            return false;
        };
        let external = from.is_external() || to.is_external();
        if external || from.descriptor.format != to.descriptor.format {
            log::error!("Executor: CopyImage between incompatible images {src:?} and {dst:?}");
            return false;
        }
        let corner = |o: Origin3D, w: u32, h: u32| BlitRect {
            x0: o.x,
            y0: o.y,
            x1: o.x + w as i32,
            y1: o.y + h as i32,
        };
        for region in regions {
            let rects = (
                corner(region.src_offset, region.extent.width, region.extent.height),
                corner(region.dst_offset, region.extent.width, region.extent.height),
            );
            let layers = region.src_subresource.array_layer_count.max(1);
            for layer in 0..layers {
                self.blit_layers(
                    from,
                    to,
                    region.src_subresource.mip_level,
                    region.src_subresource.base_array_layer + layer,
                    region.dst_subresource.mip_level,
                    region.dst_subresource.base_array_layer + layer,
                    rects,
                    glow::NEAREST,
                );
            }
        }
        true
    }

    fn blit_image(
        &mut self,
        src: ImageId,
        dst: ImageId,
        regions: &[ImageBlit],
        filter: FilterMode,
    ) -> bool {
        if !self.outside_pass("BlitImage") {
            return false;
        }
        let (Some(from), Some(to)) = (self.resources.image(src), self.resources.image(dst)) else {
            return false;
        };
        if from.is_external() || to.is_external() {
            return false;
        }
        let filter = if from.format.clear_kind() == ClearKind::DepthStencil {
            glow::NEAREST
        } else {
            filter.into_gl()
        };
        let rect = |o: [Origin3D; 2]| BlitRect {
            x0: o[0].x,
            y0: o[0].y,
            x1: o[1].x,
            y1: o[1].y,
        };
        for region in regions {
            let layers = region.src_subresource.array_layer_count.max(1);
            for layer in 0..layers {
                self.blit_layers(
                    from,
                    to,
                    region.src_subresource.mip_level,
                    region.src_subresource.base_array_layer + layer,
                    region.dst_subresource.mip_level,
                    region.dst_subresource.base_array_layer + layer,
                    (rect(region.src_offsets), rect(region.dst_offsets)),
                    filter,
                );
            }
        }
        true
    }

    fn clear_image(
        &mut self,
        id: ImageId,
        range: ImageSubresourceRange,
        value: ClearValue,
    ) -> bool {
        if !self.outside_pass("Image clear") {
            return false;
        }
        let Some(image) = self.resources.image(id).filter(|i| !i.is_external()) else {
            return false;
        };
        let is_depth = image.format.clear_kind() == ClearKind::DepthStencil;
        if is_depth != matches!(value, ClearValue::DepthStencil { .. }) {
            log::error!("Executor: Clear value does not match the format of {id:?}");
            return false;
        }
        let gl = self.gl;
        let (_, draw) = self.scratch.ensure(gl);
        self.state.bind_framebuffer(gl, glow::DRAW_FRAMEBUFFER, draw);
        self.state.prepare_clear(gl);
        let point = image.format.attachment_point(0);
        let aspects = Aspects::of(image.descriptor.format);
        for level in range.base_mip_level..range.base_mip_level + range.mip_level_count {
            for layer in range.base_array_layer..range.base_array_layer + range.array_layer_count {
                attach_image(gl, glow::DRAW_FRAMEBUFFER, point, image, level, layer);
                match value {
                    ClearValue::Color(color) => {
                        gl.draw_buffers(&[glow::COLOR_ATTACHMENT0]);
                        clear_color(gl, Some(image.format), 0, color.to_array());
                    }
                    ClearValue::DepthStencil { depth, stencil } => {
                        clear_depth_stencil(gl, aspects, depth, stencil)
                    }
                }
            }
        }
        gl.framebuffer_texture_2d(glow::DRAW_FRAMEBUFFER, point, glow::TEXTURE_2D, 0, 0);
        true
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::BeginRenderPass(_) => "BeginRenderPass",
        Command::NextSubpass => "NextSubpass",
        Command::EndRenderPass => "EndRenderPass",
        Command::BindPipeline(_) => "BindPipeline",
        Command::BindVertexBuffers { .. } => "BindVertexBuffers",
        Command::BindIndexBuffer { .. } => "BindIndexBuffer",
        Command::BindDescriptorSets { .. } => "BindDescriptorSets",
        Command::PushConstants { .. } => "PushConstants",
        Command::Draw { .. } => "Draw",
        Command::DrawIndexed { .. } => "DrawIndexed",
        Command::DrawIndirect { .. } => "DrawIndirect",
        Command::Dispatch { .. } => "Dispatch",
        Command::DispatchIndirect { .. } => "DispatchIndirect",
        Command::CopyBuffer { .. } => "CopyBuffer",
        Command::CopyBufferToImage { .. } => "CopyBufferToImage",
        Command::CopyImageToBuffer { .. } => "CopyImageToBuffer",
        Command::CopyImage { .. } => "CopyImage",
        Command::BlitImage { .. } => "BlitImage",
        Command::BarrierPoint(_) => "BarrierPoint",
        Command::ClearColorImage { .. } => "ClearColorImage",
        Command::ClearDepthStencilImage { .. } => "ClearDepthStencilImage",
        Command::SetViewport(_) => "SetViewport",
        Command::SetScissor(_) => "SetScissor",
        Command::SetLineWidth(_) => "SetLineWidth",
        Command::SetStencilCompareMask { .. } => "SetStencilCompareMask",
        Command::SetStencilWriteMask { .. } => "SetStencilWriteMask",
        Command::SetStencilReference { .. } => "SetStencilReference",
        Command::SetBlendConstants(_) => "SetBlendConstants",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use ember_core::math::{Extent3D, LinearRgba};
    use ember_core::renderer::{
        AttachmentTarget, BufferDescriptor, BufferUsage, ImageDescriptor, ImageSubresourceLayers,
        ImageUsage, PushConstantReflection, PushConstantType, RenderPipelineDescriptor,
        SampleCount, ShaderModuleDescriptor, ShaderReflection, ShaderStage, ShaderStageDescriptor,
        SubpassDescriptor, TextureFormat, VertexAttributeDescriptor, VertexBufferLayoutDescriptor,
        VertexFormat, VertexStepMode,
    };

    const VERTEX: &str =
        "#version 310 es\nlayout(location = 0) in vec3 position;\nvoid main() {}\n";
    const FRAGMENT: &str = "#version 310 es\nprecision mediump float;\nvoid main() {}\n";

    struct Fixture {
        gl: HeadlessGl,
        state: StateCache,
        shaders: ShaderCache,
        resources: ResourceRegistry,
        pipelines: PipelineRegistry,
        framebuffers: FramebufferCache,
        scratch: ScratchFramebuffers,
        stats: FrameStats,
        target: ImageId,
    }

    impl Fixture {
        fn new() -> Self {
            let gl = HeadlessGl::new();
            let mut state = StateCache::new(16);
            let mut resources = ResourceRegistry::new();
            let usage = ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST;
            let desc = ImageDescriptor::new_2d(TextureFormat::Rgba8Unorm, 64, 64, usage);
            let target = resources.create_image(&gl, &mut state, &desc).expect("target");
            Self {
                gl,
                state,
                shaders: ShaderCache::new(),
                resources,
                pipelines: PipelineRegistry::default(),
                framebuffers: FramebufferCache::new(),
                scratch: ScratchFramebuffers::default(),
                stats: FrameStats::default(),
                target,
            }
        }

        fn render_pipeline(&mut self, step_mode: VertexStepMode) -> RenderPipelineId {
            let module = |stage, source: &str| ShaderModuleDescriptor {
                label: None,
                stage,
                source: source.to_string(),
                reflection: ShaderReflection::default(),
            };
            let vertex = self.pipelines.create_shader_module(&module(ShaderStage::Vertex, VERTEX));
            let fragment =
                self.pipelines.create_shader_module(&module(ShaderStage::Fragment, FRAGMENT));
            let layout = self
                .pipelines
                .create_layout(&PipelineLayoutDescriptor::default())
                .expect("layout");
            let descriptor = RenderPipelineDescriptor {
                label: Some("executor".to_string()),
                vertex: ShaderStageDescriptor::new(vertex),
                fragment: Some(ShaderStageDescriptor::new(fragment)),
                vertex_buffers_layout: vec![VertexBufferLayoutDescriptor {
                    array_stride: 12,
                    step_mode,
                    attributes: vec![VertexAttributeDescriptor {
                        shader_location: 0,
                        format: VertexFormat::Float32x3,
                        offset: 0,
                    }],
                }],
                layout,
                primitive_state: Default::default(),
                depth_stencil_state: None,
                color_target_states: vec![Default::default()],
                multisample_state: Default::default(),
                blend_constant: Default::default(),
            };
            self.pipelines
                .create_render(&self.gl, &mut self.state, &mut self.shaders, &descriptor, 16)
                .expect("pipeline")
        }

        fn vertex_buffer(&mut self) -> BufferId {
            self.resources
                .create_buffer(
                    &self.gl,
                    &mut self.state,
                    &BufferDescriptor::new(256, BufferUsage::VERTEX),
                    1,
                    256,
                )
                .expect("buffer")
        }

        fn pass(&self, load_op: LoadOp, store_op: StoreOp) -> RenderPassDescriptor {
            let target = AttachmentTarget::Image(self.target);
            let mut attachment = AttachmentDescriptor::new(target, TextureFormat::Rgba8Unorm);
            attachment.load_op = load_op;
            attachment.store_op = store_op;
            attachment.clear_value = ClearValue::Color(LinearRgba::default());
            RenderPassDescriptor {
                attachments: vec![attachment],
                subpasses: vec![SubpassDescriptor {
                    color_attachments: vec![0],
                    ..Default::default()
                }],
                render_area: Rect2D::from_extent(64, 64),
            }
        }

        fn transfer_buffer(&mut self, size: u64, ring: bool) -> BufferId {
            let mut desc =
                BufferDescriptor::new(size, BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST);
            desc.dynamic_ring = ring;
            self.resources
                .create_buffer(&self.gl, &mut self.state, &desc, 3, 256)
                .expect("buffer")
        }

        fn image(&mut self, kind: ImageKind, format: TextureFormat, layers: u32) -> ImageId {
            let usage = ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST;
            let mut desc = ImageDescriptor::new_2d(format, 16, 16, usage);
            desc.kind = kind;
            desc.array_layer_count = layers;
            self.resources
                .create_image(&self.gl, &mut self.state, &desc)
                .expect("image")
        }

        fn attachment(
            &mut self,
            format: TextureFormat,
            samples: SampleCount,
        ) -> AttachmentDescriptor {
            let usage = if format == TextureFormat::Rgba8Unorm {
                ImageUsage::COLOR_ATTACHMENT
            } else {
                ImageUsage::DEPTH_STENCIL_ATTACHMENT
            };
            let mut desc = ImageDescriptor::new_2d(format, 64, 64, usage);
            desc.sample_count = samples;
            let image = self
                .resources
                .create_image(&self.gl, &mut self.state, &desc)
                .expect("attachment");
            AttachmentDescriptor::new(AttachmentTarget::Image(image), format)
        }

        fn run(&mut self, commands: &[Command]) {
            self.run_in_slot(0, commands);
        }

        fn run_in_slot(&mut self, slot: u32, commands: &[Command]) {
            let frame = FrameContext {
                number: 1,
                slot,
                backbuffer: Extent2D {
                    width: 800,
                    height: 600,
                },
                flip_default: true,
                validation: true,
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
            .execute(commands);
        }
    }

    fn draw(first_instance: u32) -> Command {
        Command::Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance,
        }
    }

    #[test]
    fn draw_without_pipeline_is_skipped() {
        let mut fixture = Fixture::new();
        let pass = fixture.pass(LoadOp::Clear, StoreOp::Store);
        fixture.run(&[Command::BeginRenderPass(pass), draw(0), Command::EndRenderPass]);
        assert_eq!(fixture.stats.skipped_commands, 1);
        assert_eq!(fixture.stats.draw_calls, 0);
        assert_eq!(
            fixture.gl.count(|c| matches!(
                c,
                GlCall::ClearBufferF {
                    buffer: glow::COLOR,
                    draw_buffer: 0,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn dispatch_needs_a_compute_pipeline() {
        let mut fixture = Fixture::new();
        let pipeline = fixture.render_pipeline(VertexStepMode::Vertex);
        fixture.run(&[
            Command::BindPipeline(PipelineBinding::Render(pipeline)),
            Command::Dispatch { x: 1, y: 1, z: 1 },
        ]);
        assert_eq!(fixture.stats.skipped_commands, 1);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::DispatchCompute { .. })), 0);
    }

    #[test]
    fn discarded_contents_are_invalidated() {
        let mut fixture = Fixture::new();
        let pass = fixture.pass(LoadOp::DontCare, StoreOp::DontCare);
        fixture.run(&[Command::BeginRenderPass(pass), Command::EndRenderPass]);
        let invalidations = fixture.gl.count(|c| {
            matches!(c, GlCall::InvalidateFramebuffer { attachments, .. }
                if attachments == &vec![glow::COLOR_ATTACHMENT0])
        });
        assert_eq!(invalidations, 2);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::ClearBufferF { .. })), 0);
    }

    #[test]
    fn repeated_draws_issue_no_redundant_binds() {
        let mut fixture = Fixture::new();
        let pipeline = fixture.render_pipeline(VertexStepMode::Vertex);
        let buffer = fixture.vertex_buffer();
        let pass = fixture.pass(LoadOp::Load, StoreOp::Store);
        fixture.run(&[
            Command::BeginRenderPass(pass),
            Command::BindPipeline(PipelineBinding::Render(pipeline)),
            Command::BindVertexBuffers {
                first_binding: 0,
                buffers: vec![VertexBufferBinding { buffer, offset: 0 }],
            },
            draw(0),
            draw(0),
            Command::EndRenderPass,
        ]);
        assert_eq!(fixture.stats.draw_calls, 2);
        assert_eq!(fixture.stats.skipped_commands, 0);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::UseProgram(_))), 1);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::BindVertexBuffer { .. })), 1);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::Viewport(_))), 1);
    }

    #[test]
    fn instance_buffers_start_at_the_first_instance() {
        let mut fixture = Fixture::new();
        let pipeline = fixture.render_pipeline(VertexStepMode::Instance);
        let buffer = fixture.vertex_buffer();
        let pass = fixture.pass(LoadOp::Load, StoreOp::Store);
        fixture.run(&[
            Command::BeginRenderPass(pass),
            Command::BindPipeline(PipelineBinding::Render(pipeline)),
            Command::BindVertexBuffers {
                first_binding: 0,
                buffers: vec![VertexBufferBinding { buffer, offset: 16 }],
            },
            draw(2),
            Command::EndRenderPass,
        ]);
        assert_eq!(
            fixture.gl.count(|c| matches!(
                c,
                GlCall::BindVertexBuffer {
                    binding: 0,
                    offset: 40,
                    stride: 12,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn nested_passes_and_transfers_inside_passes_are_skipped() {
        let mut fixture = Fixture::new();
        let buffer = fixture.vertex_buffer();
        let pass = fixture.pass(LoadOp::Load, StoreOp::Store);
        fixture.run(&[
            Command::BeginRenderPass(pass.clone()),
            Command::BeginRenderPass(pass),
            Command::CopyBuffer {
                src: buffer,
                dst: buffer,
                regions: vec![BufferCopy {
                    src_offset: 0,
                    dst_offset: 128,
                    size: 64,
                }],
            },
        ]);
        assert_eq!(fixture.stats.skipped_commands, 2);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::CopyBufferSubData { .. })), 0);
    }

    #[test]
    fn pipeline_binds_reset_stencil_overrides() {
        let mut dynamic = DynamicState::default();
        DynamicState::set_faces(&mut dynamic.stencil_reference, StencilFaceFlags::BACK, 7);
        dynamic.viewport = Some(Viewport::from_rect(Rect2D::from_extent(8, 8)));
        let mut state = RenderState::default();
        dynamic.apply(&mut state);
        assert_eq!(state.stencil.back.reference, 7);
        assert_eq!(state.stencil.front.reference, 0);

        dynamic.reset_pipeline_overrides();
        assert_eq!(dynamic.stencil_reference, [None, None]);
        assert!(dynamic.viewport.is_some());
    }

    fn upload(buffer_offset: u64, buffer_row_length: u32, layers: u32) -> BufferImageCopy {
        BufferImageCopy {
            buffer_offset,
            buffer_row_length,
            buffer_image_height: 0,
            image_subresource: ImageSubresourceLayers {
                mip_level: 0,
                base_array_layer: 0,
                array_layer_count: layers,
            },
            image_offset: Origin3D::default(),
            image_extent: Extent3D::new_2d(16, 16),
        }
    }

    fn pixel_stores(gl: &HeadlessGl, parameter: u32) -> Vec<i32> {
        gl.calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::PixelStore { parameter: p, value } if *p == parameter => Some(*value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn uploads_select_the_destination_unit() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(64 * 64 * 4, false);
        let target = fixture.resources.image(fixture.target).expect("target").name;
        let other = fixture.gl.create_texture();
        fixture.state.bind_texture(&fixture.gl, 0, glow::TEXTURE_2D, target);
        fixture.state.bind_texture(&fixture.gl, 1, glow::TEXTURE_2D, other);
        fixture.gl.clear_calls();

        let region = BufferImageCopy {
            image_extent: Extent3D::new_2d(64, 64),
            ..upload(0, 0, 1)
        };
        fixture.run(&[Command::CopyBufferToImage {
            src: buffer,
            dst: fixture.target,
            regions: vec![region],
        }]);

        let calls = fixture.gl.calls();
        let selected = calls.iter().position(|c| *c == GlCall::ActiveTexture(0));
        let uploaded = calls.iter().position(|c| matches!(c, GlCall::TexSubImage { .. }));
        assert!(selected.is_some(), "unit 0 is made active again");
        assert!(selected < uploaded, "the unit is selected before the upload");
    }

    #[test]
    fn uploads_read_from_the_frame_copy_and_restore_unpacking() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(4096, true);
        let image = fixture.image(ImageKind::D2, TextureFormat::Rgba8Unorm, 1);
        fixture.gl.clear_calls();

        fixture.run_in_slot(1, &[Command::CopyBufferToImage {
            src: buffer,
            dst: image,
            regions: vec![upload(64, 32, 1)],
        }]);

        assert_eq!(fixture.stats.skipped_commands, 0);
        assert_eq!(
            fixture.gl.count(|c| matches!(
                c,
                GlCall::TexSubImage {
                    target: glow::TEXTURE_2D,
                    offset: 4160,
                    ..
                }
            )),
            1
        );
        assert_eq!(pixel_stores(&fixture.gl, glow::UNPACK_ROW_LENGTH), vec![32, 0]);
        assert_eq!(pixel_stores(&fixture.gl, glow::UNPACK_IMAGE_HEIGHT), vec![0, 0]);
        assert_eq!(
            fixture.gl.calls().last(),
            Some(&GlCall::BindBuffer {
                target: glow::PIXEL_UNPACK_BUFFER,
                buffer: 0
            })
        );
    }

    #[test]
    fn cube_uploads_walk_the_faces() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(6 * 1024, false);
        let cube = fixture.image(ImageKind::Cube, TextureFormat::Rgba8Unorm, 6);
        fixture.gl.clear_calls();

        fixture.run(&[Command::CopyBufferToImage {
            src: buffer,
            dst: cube,
            regions: vec![upload(0, 0, 6)],
        }]);

        let faces: Vec<(u32, u32)> = fixture
            .gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::TexSubImage { target, offset, .. } => Some((*target, *offset)),
                _ => None,
            })
            .collect();
        let expected: Vec<(u32, u32)> =
            (0..6).map(|face| (glow::TEXTURE_CUBE_MAP_POSITIVE_X + face, face * 1024)).collect();
        assert_eq!(faces, expected);
    }

    #[test]
    fn readbacks_pack_into_the_buffer_and_restore_packing() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(4096, true);
        let image = fixture.image(ImageKind::D2, TextureFormat::Rgba8Unorm, 1);
        fixture.gl.clear_calls();

        fixture.run_in_slot(2, &[Command::CopyImageToBuffer {
            src: image,
            dst: buffer,
            regions: vec![upload(16, 0, 1)],
        }]);

        assert_eq!(
            fixture.gl.count(|c| matches!(
                c,
                GlCall::ReadPixels {
                    width: 16,
                    height: 16,
                    offset: 8208,
                    ..
                }
            )),
            1
        );
        assert_eq!(pixel_stores(&fixture.gl, glow::PACK_ROW_LENGTH), vec![0, 0]);
    }

    #[test]
    fn image_copies_blit_and_clears_write_each_layer() {
        let mut fixture = Fixture::new();
        let from = fixture.image(ImageKind::D2, TextureFormat::Rgba8Unorm, 1);
        let to = fixture.image(ImageKind::D2Array, TextureFormat::Rgba8Unorm, 2);
        let layers = ImageSubresourceLayers {
            mip_level: 0,
            base_array_layer: 0,
            array_layer_count: 1,
        };
        fixture.gl.clear_calls();

        fixture.run(&[
            Command::CopyImage {
                src: from,
                dst: to,
                regions: vec![ImageCopy {
                    src_subresource: layers,
                    src_offset: Origin3D::default(),
                    dst_subresource: layers,
                    dst_offset: Origin3D::default(),
                    extent: Extent3D::new_2d(16, 16),
                }],
            },
            Command::ClearColorImage {
                image: to,
                color: LinearRgba::default(),
                range: ImageSubresourceRange {
                    array_layer_count: 2,
                    ..Default::default()
                },
            },
        ]);

        assert_eq!(fixture.stats.skipped_commands, 0);
        assert_eq!(
            fixture.gl.count(|c| matches!(
                c,
                GlCall::BlitFramebuffer {
                    filter: glow::NEAREST,
                    ..
                }
            )),
            1
        );
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::ClearBufferF { .. })), 2);
    }

    #[test]
    fn external_and_compressed_images_reject_transfers() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(4096, false);
        let external = fixture.image(ImageKind::External, TextureFormat::Rgba8Unorm, 1);
        let compressed = fixture.image(ImageKind::D2, TextureFormat::Etc2Rgba8Unorm, 1);
        fixture.gl.clear_calls();

        fixture.run(&[
            Command::CopyBufferToImage {
                src: buffer,
                dst: external,
                regions: vec![upload(0, 0, 1)],
            },
            Command::CopyBufferToImage {
                src: buffer,
                dst: compressed,
                regions: vec![upload(0, 0, 1)],
            },
            Command::CopyImageToBuffer {
                src: compressed,
                dst: buffer,
                regions: vec![upload(0, 0, 1)],
            },
            Command::CopyImage {
                src: external,
                dst: external,
                regions: Vec::new(),
            },
        ]);

        assert_eq!(fixture.stats.skipped_commands, 4);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::TexSubImage { .. })), 0);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::ReadPixels { .. })), 0);
    }

    #[test]
    fn offsets_past_native_limits_skip_the_region() {
        let mut fixture = Fixture::new();
        let buffer = fixture.transfer_buffer(4096, false);
        let image = fixture.image(ImageKind::D2, TextureFormat::Rgba8Unorm, 1);
        fixture.gl.clear_calls();

        fixture.run(&[
            Command::CopyBufferToImage {
                src: buffer,
                dst: image,
                regions: vec![upload(1 << 40, 0, 1), upload(0, 0, 1)],
            },
            Command::CopyBuffer {
                src: buffer,
                dst: buffer,
                regions: vec![BufferCopy {
                    src_offset: u64::MAX - 8,
                    dst_offset: 0,
                    size: 64,
                }],
            },
        ]);

        let uploads: Vec<u32> = fixture
            .gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::TexSubImage { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![0]);
        assert_eq!(pixel_stores(&fixture.gl, glow::UNPACK_ROW_LENGTH), vec![0, 0]);
        assert_eq!(fixture.gl.count(|c| matches!(c, GlCall::CopyBufferSubData { .. })), 0);
    }

    #[test]
    fn resolves_restore_the_resolve_draw_buffers() {
        let mut fixture = Fixture::new();
        let attachments = [SampleCount::X4, SampleCount::X4, SampleCount::X1, SampleCount::X1]
            .map(|samples| fixture.attachment(TextureFormat::Rgba8Unorm, samples))
            .to_vec();
        let pass = RenderPassDescriptor {
            attachments,
            subpasses: vec![
                SubpassDescriptor {
                    color_attachments: vec![0, 1],
                    resolve_attachments: vec![Some(2), Some(3)],
                    ..Default::default()
                },
                SubpassDescriptor {
                    color_attachments: vec![2, 3],
                    ..Default::default()
                },
            ],
            render_area: Rect2D::from_extent(64, 64),
        };
        fixture.gl.clear_calls();

        fixture.run(&[
            Command::BeginRenderPass(pass),
            Command::NextSubpass,
            Command::EndRenderPass,
        ]);

        let calls = fixture.gl.calls();
        let resolves = calls
            .iter()
            .filter(|c| matches!(c, GlCall::BlitFramebuffer { .. }))
            .count();
        assert_eq!(resolves, 2);
        let last_blit = calls
            .iter()
            .rposition(|c| matches!(c, GlCall::BlitFramebuffer { .. }))
            .expect("resolve blit");
        let restored = calls[last_blit..].iter().find_map(|c| match c {
            GlCall::DrawBuffers(buffers) => Some(buffers.clone()),
            _ => None,
        });
        assert_eq!(
            restored,
            Some(vec![glow::COLOR_ATTACHMENT0, glow::COLOR_ATTACHMENT1])
        );
    }

    #[test]
    fn depth_resolves_blit_into_the_resolve_target() {
        let mut fixture = Fixture::new();
        let attachments = vec![
            fixture.attachment(TextureFormat::Rgba8Unorm, SampleCount::X4),
            fixture.attachment(TextureFormat::Depth24PlusStencil8, SampleCount::X4),
            fixture.attachment(TextureFormat::Rgba8Unorm, SampleCount::X1),
            fixture.attachment(TextureFormat::Depth24PlusStencil8, SampleCount::X1),
        ];
        let pass = RenderPassDescriptor {
            attachments,
            subpasses: vec![SubpassDescriptor {
                color_attachments: vec![0],
                resolve_attachments: vec![Some(2)],
                depth_attachment: Some(1),
                depth_resolve_attachment: Some(3),
                ..Default::default()
            }],
            render_area: Rect2D::from_extent(64, 32),
        };
        fixture.gl.clear_calls();

        fixture.run(&[Command::BeginRenderPass(pass), Command::EndRenderPass]);

        let depth_blits: Vec<(BlitRect, BlitRect, u32)> = fixture
            .gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::BlitFramebuffer {
                    src,
                    dst,
                    mask,
                    filter,
                } if mask & glow::DEPTH_BUFFER_BIT != 0 => Some((*src, *dst, *filter)),
                _ => None,
            })
            .collect();
        let area = BlitRect {
            x0: 0,
            y0: 0,
            x1: 64,
            y1: 32,
        };
        assert_eq!(depth_blits, vec![(area, area, glow::NEAREST)]);
    }

    #[test]
    fn push_constants_pad_partial_members() {
        let mut fixture = Fixture::new();
        let fragment = "uniform vec4 tint;\nuniform float scale;\nvoid main() {}\n";
        let program = fixture
            .shaders
            .cache_program(&fixture.gl, [Some(VERTEX), Some(fragment), None]);
        let member = |name: &str, offset, size, ty| PushConstantReflection {
            name: name.to_string(),
            offset,
            size,
            ty,
        };
        let reflection = ShaderReflection {
            push_constants: vec![
                member("tint", 0, 16, PushConstantType::Vec4),
                member("scale", 16, 4, PushConstantType::Float),
            ],
            ..Default::default()
        };
        let bindings =
            ProgramBindings::build(&fixture.gl, &mut fixture.state, program, &reflection, 16)
                .expect("bindings");
        let data: Vec<u8> = [1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        fixture.gl.clear_calls();

        upload_push_constants(&fixture.gl, &bindings, &data, (0, 20));

        let uploads: Vec<Vec<u32>> = fixture
            .gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                GlCall::UniformWords { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect();
        let tint = vec![1.0f32.to_bits(), 2.0f32.to_bits(), 3.0f32.to_bits(), 0];
        assert_eq!(uploads, vec![tint, vec![0]]);
    }
}
