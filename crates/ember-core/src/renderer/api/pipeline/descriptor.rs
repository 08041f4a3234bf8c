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

//! Main pipeline descriptors.

use super::layout::PipelineLayoutId;
use super::state::*;
use crate::math::LinearRgba;
use crate::renderer::api::shader::{ShaderModuleId, SpecializationConstant};

/// A shader module plus the specialization constants baked into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStageDescriptor {
    /// The shader module.
    pub module: ShaderModuleId,
    /// Specialization constants; empty when the module is used as-is.
    pub specialization: Vec<SpecializationConstant>,
}

impl ShaderStageDescriptor {
    /// A stage without specialization.
    pub fn new(module: ShaderModuleId) -> Self {
        Self {
            module,
            specialization: Vec::new(),
        }
    }
}

/// A complete descriptor for a render pipeline.
///
/// This struct aggregates all the state needed to render primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The vertex stage.
    pub vertex: ShaderStageDescriptor,
    /// The fragment stage, if any.
    pub fragment: Option<ShaderStageDescriptor>,
    /// The layout of the vertex buffers, indexed by binding.
    pub vertex_buffers_layout: Vec<VertexBufferLayoutDescriptor>,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// The state for primitive assembly and rasterization.
    pub primitive_state: PrimitiveStateDescriptor,
    /// The state for depth and stencil testing. If `None`, these tests are disabled.
    pub depth_stencil_state: Option<DepthStencilStateDescriptor>,
    /// The states of all color targets this pipeline will render to.
    pub color_target_states: Vec<ColorTargetStateDescriptor>,
    /// The multisampling state.
    pub multisample_state: MultisampleStateDescriptor,
    /// The constant color used by `Constant` blend factors.
    pub blend_constant: LinearRgba,
}

/// A descriptor for a compute pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputePipelineDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The compute stage.
    pub compute: ShaderStageDescriptor,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
}

/// An opaque handle to a compiled render pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);

/// An opaque handle to a compiled compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub usize);

/// The pipeline selected by a `BindPipeline` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBinding {
    /// A render pipeline; enables `Draw*` commands.
    Render(RenderPipelineId),
    /// A compute pipeline; enables `Dispatch*` commands.
    Compute(ComputePipelineId),
}
