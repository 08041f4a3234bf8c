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

//! Descriptor sets: the `(set, binding)` resource model.
//!
//! A [`DescriptorSetLayout`] declares what a pipeline expects; a
//! [`DescriptorSetData`] carries the handles recorded into the command
//! stream by `BindDescriptorSets`.

use crate::renderer::api::resource::{BufferId, ImageId, SamplerId};

/// The kind of resource a binding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// A standalone sampler.
    Sampler,
    /// An image paired with a sampler.
    CombinedImageSampler,
    /// A sampled image without a sampler.
    SampledImage,
    /// An image accessed with load/store operations.
    StorageImage,
    /// A uniform buffer range.
    UniformBuffer,
    /// A storage buffer range.
    StorageBuffer,
    /// A uniform buffer whose offset is supplied at bind time.
    UniformBufferDynamic,
    /// A storage buffer whose offset is supplied at bind time.
    StorageBufferDynamic,
    /// An attachment of the current render pass read by a later subpass.
    InputAttachment,
}

impl DescriptorType {
    /// Returns `true` for types that consume a dynamic offset.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBufferDynamic | DescriptorType::StorageBufferDynamic
        )
    }

    /// Returns `true` for buffer types.
    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer
                | DescriptorType::StorageBuffer
                | DescriptorType::UniformBufferDynamic
                | DescriptorType::StorageBufferDynamic
        )
    }
}

/// One binding declared by a [`DescriptorSetLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    /// The binding index.
    pub binding: u32,
    /// The resource kind.
    pub ty: DescriptorType,
    /// The number of array elements.
    pub count: u32,
}

/// The ordered list of bindings of one descriptor set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayout {
    /// Bindings, in ascending binding order.
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

/// Access mode of a storage image binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageAccess {
    /// Load only.
    ReadOnly,
    /// Store only.
    WriteOnly,
    /// Load and store.
    #[default]
    ReadWrite,
}

/// A single resource slot inside a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    /// A buffer range.
    Buffer {
        /// The buffer.
        buffer: BufferId,
        /// Byte offset of the range.
        offset: u64,
        /// Byte size of the range; `0` means "to the end of the buffer".
        size: u64,
    },
    /// An image, optionally with the sampler it is read through.
    Image {
        /// The image.
        image: ImageId,
        /// The mip level exposed (storage images) or the base level (sampled).
        mip_level: u32,
        /// Access mode, meaningful for storage images only.
        access: StorageAccess,
        /// The sampler for combined image samplers.
        sampler: Option<SamplerId>,
    },
    /// A standalone sampler.
    Sampler(SamplerId),
    /// Nothing bound; degrades to the default object.
    Empty,
}

/// The resources written to one binding of a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    /// The binding index.
    pub binding: u32,
    /// The resource kind; must match the layout.
    pub ty: DescriptorType,
    /// One entry per array element; the length must match the layout count.
    pub resources: Vec<DescriptorResource>,
}

/// The resource handles of one descriptor set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorSetData {
    /// Bindings of the set.
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetData {
    /// Returns the binding with the given index.
    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}
