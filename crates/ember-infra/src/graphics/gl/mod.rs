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

//! OpenGL / OpenGL ES backend.
//!
//! The backend emulates render passes, pipeline state objects, descriptor
//! sets and barriers on top of the global binding model of OpenGL. All native
//! calls go through [`GlApi`], so the same code drives a real driver through
//! [`GlowApi`] or the recording [`HeadlessGl`] used by tests.

pub mod barrier;
pub mod context;
pub mod conversions;
pub mod descriptor;
pub mod device;
pub mod executor;
pub mod format_table;
pub mod framebuffer_cache;
pub mod glow_api;
pub mod headless;
pub mod native;
pub mod pipeline;
pub mod reflection;
pub mod render_pass;
pub mod resources;
pub mod shader_cache;
pub mod state_cache;
pub mod swapchain;

pub use self::context::{ContextActivation, ContextProvider, RawContext};
pub use self::device::GlDevice;
pub use self::glow_api::GlowApi;
pub use self::headless::{GlCall, HeadlessContext, HeadlessGl};
pub use self::native::{GlApi, GlExtensions, GlName, GlVersion};
