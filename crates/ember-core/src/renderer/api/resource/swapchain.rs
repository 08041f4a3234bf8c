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

use crate::math::Extent2D;
use crate::renderer::api::format::TextureFormat;

/// How presented frames are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// Wait for vertical blank.
    #[default]
    Fifo,
    /// Present immediately, tearing allowed.
    Immediate,
}

/// A descriptor used to create a [`SwapchainId`].
///
/// `surface` is the platform window-surface handle understood by the
/// context provider that owns the native context.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainDescriptor {
    /// Opaque platform surface handle.
    pub surface: u64,
    /// Size of the backbuffer.
    pub extent: Extent2D,
    /// Color format of the backbuffer.
    pub format: TextureFormat,
    /// Presentation pacing.
    pub present_mode: PresentMode,
}

/// An opaque handle to a presentable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwapchainId(pub usize);
