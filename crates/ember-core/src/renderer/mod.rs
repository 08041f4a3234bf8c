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

//! Provides the public, backend-agnostic rendering contracts for Ember.
//!
//! This module defines the "common language" between the scene layer that
//! records work and the backend that executes it. It contains the abstract
//! [`GraphicsDevice`] trait, the Vulkan-style command stream ([`Command`]),
//! resource, pipeline and render-pass descriptors, and the error types that
//! form the stable, public-facing API.
//!
//! The 'how' is handled by a concrete backend in the `ember-infra` crate,
//! which emulates these semantics on top of a legacy immediate-mode API.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::traits::GraphicsDevice;
