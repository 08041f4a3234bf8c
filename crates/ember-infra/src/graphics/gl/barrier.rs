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

//! Translation of declared access transitions into memory barrier calls.

use super::native::GlApi;
use ember_core::renderer::{AccessFlags, BarrierPoint, PipelineStageFlags};

/// Bits `glMemoryBarrierByRegion` accepts.
const BY_REGION_BITS: u32 = glow::ATOMIC_COUNTER_BARRIER_BIT
    | glow::FRAMEBUFFER_BARRIER_BIT
    | glow::SHADER_IMAGE_ACCESS_BARRIER_BIT
    | glow::SHADER_STORAGE_BARRIER_BIT
    | glow::TEXTURE_FETCH_BARRIER_BIT
    | glow::UNIFORM_BARRIER_BIT;

/// Native writes the GL does not order by itself.
const INCOHERENT_WRITES: AccessFlags = AccessFlags::SHADER_WRITE.union(AccessFlags::MEMORY_WRITE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Buffer,
    Image,
    Any,
}

fn access_bits(access: AccessFlags, subject: Subject) -> u32 {
    if access.intersects(AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE) {
        return glow::ALL_BARRIER_BITS;
    }
    let buffers = subject != Subject::Image;
    let images = subject != Subject::Buffer;
    let mut bits = 0;
    if access.contains(AccessFlags::INDIRECT_COMMAND_READ) {
        bits |= glow::COMMAND_BARRIER_BIT;
    }
    if access.contains(AccessFlags::INDEX_READ) {
        bits |= glow::ELEMENT_ARRAY_BARRIER_BIT;
    }
    if access.contains(AccessFlags::VERTEX_ATTRIBUTE_READ) {
        bits |= glow::VERTEX_ATTRIB_ARRAY_BARRIER_BIT;
    }
    if access.contains(AccessFlags::UNIFORM_READ) {
        bits |= glow::UNIFORM_BARRIER_BIT;
    }
    if access.intersects(AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE) {
        if buffers {
            bits |= glow::SHADER_STORAGE_BARRIER_BIT;
        }
        if images {
            bits |= glow::SHADER_IMAGE_ACCESS_BARRIER_BIT;
        }
    }
    if images && access.intersects(AccessFlags::SHADER_READ | AccessFlags::INPUT_ATTACHMENT_READ) {
        bits |= glow::TEXTURE_FETCH_BARRIER_BIT;
    }
    if access.intersects(
        AccessFlags::COLOR_ATTACHMENT_READ
            | AccessFlags::COLOR_ATTACHMENT_WRITE
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    ) {
        bits |= glow::FRAMEBUFFER_BARRIER_BIT;
    }
    if access.intersects(AccessFlags::TRANSFER_READ | AccessFlags::TRANSFER_WRITE) {
        if buffers {
            bits |= glow::BUFFER_UPDATE_BARRIER_BIT | glow::PIXEL_BUFFER_BARRIER_BIT;
        }
        if images {
            bits |= glow::TEXTURE_UPDATE_BARRIER_BIT;
        }
    }
    if buffers && access.intersects(AccessFlags::HOST_READ | AccessFlags::HOST_WRITE) {
        bits |= glow::BUFFER_UPDATE_BARRIER_BIT;
    }
    bits
}

/// The barrier bits a point needs, split into (by-region, global).
pub fn barrier_bits(point: &BarrierPoint) -> (u32, u32) {
    let mut bits = 0;
    let transitions = point
        .memory_barriers
        .iter()
        .map(|b| (b.src_access, b.dst_access, Subject::Any))
        .chain(
            point
                .buffer_barriers
                .iter()
                .map(|b| (b.src_access, b.dst_access, Subject::Buffer)),
        )
        .chain(
            point
                .image_barriers
                .iter()
                .map(|b| (b.src_access, b.dst_access, Subject::Image)),
        );
    for (src, dst, subject) in transitions {
        if src.intersects(INCOHERENT_WRITES) {
            bits |= access_bits(dst, subject);
        }
    }

    let fragment_local = |stages: PipelineStageFlags| {
        !stages.is_empty() && PipelineStageFlags::FRAGMENT_ONLY.contains(stages)
    };
    if fragment_local(point.src_stage) && fragment_local(point.dst_stage) && bits != glow::ALL_BARRIER_BITS {
        (bits & BY_REGION_BITS, bits & !BY_REGION_BITS)
    } else {
        (0, bits)
    }
}

/// Issues the barriers of `point`: at most one by-region and one global call.
///
/// ## Returns
/// The number of native calls made.
pub fn issue<G: GlApi + ?Sized>(gl: &G, point: &BarrierPoint) -> u32 {
    let (by_region, global) = barrier_bits(point);
    let mut issued = 0;
    if by_region != 0 {
        gl.memory_barrier_by_region(by_region);
        issued += 1;
    }
    if global != 0 {
        gl.memory_barrier(global);
        issued += 1;
    }
    issued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use ember_core::renderer::{BufferBarrier, BufferId, ImageBarrier, ImageId};

    #[test]
    fn compute_to_vertex_uses_a_global_barrier() {
        let point = BarrierPoint {
            src_stage: PipelineStageFlags::COMPUTE_SHADER,
            dst_stage: PipelineStageFlags::VERTEX_INPUT,
            buffer_barriers: vec![BufferBarrier {
                buffer: BufferId(0),
                src_access: AccessFlags::SHADER_WRITE,
                dst_access: AccessFlags::VERTEX_ATTRIBUTE_READ | AccessFlags::INDIRECT_COMMAND_READ,
            }],
            ..Default::default()
        };
        assert_eq!(
            barrier_bits(&point),
            (0, glow::VERTEX_ATTRIB_ARRAY_BARRIER_BIT | glow::COMMAND_BARRIER_BIT)
        );
    }

    #[test]
    fn fragment_to_fragment_goes_by_region() {
        let gl = HeadlessGl::new();
        let point = BarrierPoint {
            src_stage: PipelineStageFlags::FRAGMENT_SHADER,
            dst_stage: PipelineStageFlags::FRAGMENT_SHADER,
            image_barriers: vec![ImageBarrier {
                image: ImageId(0),
                src_access: AccessFlags::SHADER_WRITE,
                dst_access: AccessFlags::SHADER_READ | AccessFlags::TRANSFER_READ,
            }],
            ..Default::default()
        };
        assert_eq!(issue(&gl, &point), 2);
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::MemoryBarrierByRegion(
                    glow::SHADER_IMAGE_ACCESS_BARRIER_BIT | glow::TEXTURE_FETCH_BARRIER_BIT
                ),
                GlCall::MemoryBarrier(glow::TEXTURE_UPDATE_BARRIER_BIT),
            ]
        );
    }

    #[test]
    fn coherent_writes_need_no_barrier() {
        let gl = HeadlessGl::new();
        let point = BarrierPoint {
            src_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: PipelineStageFlags::FRAGMENT_SHADER,
            image_barriers: vec![ImageBarrier {
                image: ImageId(0),
                src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_access: AccessFlags::SHADER_READ,
            }],
            ..Default::default()
        };
        assert_eq!(issue(&gl, &point), 0);
        assert!(gl.calls().is_empty());
    }
}
