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

//! Error types returned by the renderer contracts.
//!
//! Errors nest from the most specific to the most general:
//! [`ShaderError`] and [`PipelineError`] convert into [`ResourceError`],
//! which converts into [`RenderError`]. Frame-level failures never cross a
//! frame boundary other than through these values.

use crate::renderer::api::format::TextureFormat;
use crate::renderer::api::pipeline::{ComputePipelineId, PipelineLayoutId, RenderPipelineId};
use crate::renderer::api::shader::{ShaderModuleId, ShaderStage};
use std::fmt;

/// A shader module could not be used.
#[derive(Debug)]
pub enum ShaderError {
    /// No module is registered under `id`.
    NotFound {
        /// The missing module.
        id: ShaderModuleId,
    },
    /// A module was given for a stage it does not implement.
    StageMismatch {
        /// The module.
        id: ShaderModuleId,
        /// The stage the pipeline slot needs.
        expected: ShaderStage,
        /// The stage of the module.
        found: ShaderStage,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::NotFound { id } => write!(f, "Unknown shader module {id:?}"),
            ShaderError::StageMismatch {
                id,
                expected,
                found,
            } => write!(
                f,
                "Shader module {id:?} implements {found:?}, expected {expected:?}"
            ),
        }
    }
}

impl std::error::Error for ShaderError {}

/// A pipeline could not be created, found or specialized.
#[derive(Debug)]
pub enum PipelineError {
    /// No linked program could be produced for the pipeline.
    CompilationFailed {
        /// The pipeline label, if any.
        label: Option<String>,
        /// Compiler and linker diagnostics.
        details: String,
    },
    /// No render pipeline is registered under `id`.
    InvalidRenderPipeline {
        /// The missing pipeline.
        id: RenderPipelineId,
    },
    /// No compute pipeline is registered under `id`.
    InvalidComputePipeline {
        /// The missing pipeline.
        id: ComputePipelineId,
    },
    /// No pipeline layout is registered under `id`.
    InvalidPipelineLayout {
        /// The missing layout.
        id: PipelineLayoutId,
    },
    /// The context lacks a capability the pipeline needs.
    FeatureNotSupported(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CompilationFailed { label, details } => write!(
                f,
                "No program for pipeline '{}': {details}",
                label.as_deref().unwrap_or("<unnamed>")
            ),
            PipelineError::InvalidRenderPipeline { id } => write!(f, "Unknown render pipeline {id:?}"),
            PipelineError::InvalidComputePipeline { id } => {
                write!(f, "Unknown compute pipeline {id:?}")
            }
            PipelineError::InvalidPipelineLayout { id } => write!(f, "Unknown pipeline layout {id:?}"),
            PipelineError::FeatureNotSupported(what) => write!(f, "Unsupported by this context: {what}"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// A GPU resource could not be created, found or used.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader module error.
    Shader(ShaderError),
    /// A pipeline error.
    Pipeline(PipelineError),
    /// No resource is registered under the given handle.
    NotFound,
    /// The native API refused the request.
    BackendError(String),
    /// A range reaches past the end of a resource.
    OutOfBounds,
    /// A `(set, binding)` pair exceeds the fixed binding table.
    BindingOutOfRange {
        /// The descriptor set index.
        set: u32,
        /// The binding index inside the set.
        binding: u32,
    },
    /// The texture format is not available on this context.
    UnsupportedFormat(TextureFormat),
    /// The operation needs the native context, but the device is not active.
    ContextNotActive,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline: {err}"),
            ResourceError::NotFound => write!(f, "No resource with this handle"),
            ResourceError::BackendError(msg) => write!(f, "Native API error: {msg}"),
            ResourceError::OutOfBounds => write!(f, "Range exceeds the resource size"),
            ResourceError::BindingOutOfRange { set, binding } => {
                write!(f, "Binding (set {set}, binding {binding}) is out of range")
            }
            ResourceError::UnsupportedFormat(format) => {
                write!(f, "Texture format {format:?} is unavailable on this context")
            }
            ResourceError::ContextNotActive => write!(f, "The context is not active"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A device-level failure.
#[derive(Debug)]
pub enum RenderError {
    /// A frame operation ran while the context was not active.
    ContextNotActive,
    /// `deactivate` was called more times than `activate`.
    UnbalancedActivation,
    /// The platform refused to make a context current.
    ContextSwitchFailed(String),
    /// A frame operation could not complete.
    RenderingFailed(String),
    /// A resource operation failed.
    Resource(ResourceError),
    /// Presenting failed; the device must be recreated.
    DeviceLost,
    /// An internal invariant broke.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ContextNotActive => write!(f, "The context is not active"),
            RenderError::UnbalancedActivation => {
                write!(f, "Deactivation without a matching activation")
            }
            RenderError::ContextSwitchFailed(msg) => write!(f, "Context switch failed: {msg}"),
            RenderError::RenderingFailed(msg) => write!(f, "Rendering failed: {msg}"),
            RenderError::Resource(err) => write!(f, "Resource: {err}"),
            RenderError::DeviceLost => write!(f, "The device is lost"),
            RenderError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn compilation_failure_names_the_pipeline() {
        let err = PipelineError::CompilationFailed {
            label: Some("lit".to_string()),
            details: "0:12: 'colour' : undeclared identifier".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No program for pipeline 'lit': 0:12: 'colour' : undeclared identifier"
        );
    }

    #[test]
    fn shader_errors_nest_into_resource_errors() {
        let res_err: ResourceError = ShaderError::NotFound {
            id: ShaderModuleId(42),
        }
        .into();
        assert_eq!(res_err.to_string(), "Shader: Unknown shader module ShaderModuleId(42)");
        assert!(res_err.source().is_some());
    }

    #[test]
    fn binding_errors_nest_into_render_errors() {
        let render_err: RenderError = ResourceError::BindingOutOfRange { set: 5, binding: 2 }.into();
        assert_eq!(
            render_err.to_string(),
            "Resource: Binding (set 5, binding 2) is out of range"
        );
        assert!(render_err.source().is_some());
    }
}
