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

//! Pipeline layout descriptors.

use crate::renderer::api::descriptor::DescriptorSetLayout;

/// An opaque handle to a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineLayoutId(pub usize);

/// A descriptor for a [`PipelineLayoutId`].
///
/// Declares, per descriptor set, which resources a pipeline expects. Bound
/// descriptor-set data must match these declarations exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDescriptor {
    /// An optional debug label.
    pub label: Option<String>,
    /// The layout of each descriptor set, indexed by set number.
    pub set_layouts: Vec<DescriptorSetLayout>,
    /// Size in bytes of the push-constant block.
    pub push_constant_size: u32,
}
