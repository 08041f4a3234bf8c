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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`core`]**: Device settings and per-frame statistics.
//! - **[`resource`]**: GPU handles (Buffer, Image, Sampler, Semaphore) and their descriptors.
//! - **[`format`]**: Texel, index and sample-count formats.
//! - **[`shader`]**: Shader module sources, reflection tables and specialization constants.
//! - **[`pipeline`]**: Static pipeline state, layouts, and pipeline descriptors.
//! - **[`descriptor`]**: Descriptor types and the per-set resource data bound at record time.
//! - **[`render_pass`]**: Attachments, subpasses and load/store operations.
//! - **[`command`]**: The recorded command stream and barrier declarations.

pub mod command;
pub mod core;
pub mod descriptor;
pub mod format;
pub mod pipeline;
pub mod render_pass;
pub mod resource;
pub mod shader;

pub use self::command::*;
pub use self::core::*;
pub use self::descriptor::*;
pub use self::format::*;
pub use self::pipeline::*;
pub use self::render_pass::*;
pub use self::resource::*;
pub use self::shader::*;
