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

//! Reentrant activation of the native context.
//!
//! OpenGL keeps one current context per thread. The device makes its
//! context current on the first [`ContextActivation::activate`] and restores
//! whatever was current before on the matching last
//! [`ContextActivation::deactivate`]. Nested pairs only move a counter.

use ember_core::renderer::RenderError;
use std::sync::Mutex;

/// An opaque handle to a native context, as the window system reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawContext(pub u64);

/// The window-system side of a context: making it current and presenting.
pub trait ContextProvider {
    /// The context current on this thread, if any.
    fn current(&self) -> Option<RawContext>;

    /// The context owned by the device.
    fn own(&self) -> RawContext;

    /// Makes `context` current on this thread, or releases the current one
    /// when `None`.
    fn make_current(&mut self, context: Option<RawContext>) -> Result<(), String>;

    /// Presents the default framebuffer of `surface`.
    fn swap_buffers(&mut self, surface: u64) -> Result<(), String>;
}

/// Serializes context transitions across every device in the process.
static TRANSITIONS: Mutex<()> = Mutex::new(());

/// Tracks nested activations of one device's context.
#[derive(Debug, Default)]
pub struct ContextActivation {
    depth: u32,
    saved: Option<RawContext>,
}

impl ContextActivation {
    /// Enters the context.
    ///
    /// The outermost call saves the current context and makes the device's
    /// own context current. Inner calls only increase the depth.
    pub fn activate<P: ContextProvider>(&mut self, provider: &mut P) -> Result<(), RenderError> {
        if self.depth == 0 {
            let _guard = TRANSITIONS.lock().map_err(|_| {
                RenderError::Internal("context transition lock poisoned".to_string())
            })?;
            let previous = provider.current();
            let own = provider.own();
            if previous != Some(own) {
                provider
                    .make_current(Some(own))
                    .map_err(RenderError::ContextSwitchFailed)?;
            }
            self.saved = previous;
            log::trace!("ContextActivation: Entered {own:?}, saved {previous:?}");
        }
        self.depth += 1;
        Ok(())
    }

    /// Leaves the context.
    ///
    /// The call matching the outermost [`activate`](Self::activate) restores
    /// the context that was current before it.
    ///
    /// ## Returns
    /// [`RenderError::UnbalancedActivation`] if there is no activation to
    /// close.
    pub fn deactivate<P: ContextProvider>(&mut self, provider: &mut P) -> Result<(), RenderError> {
        if self.depth == 0 {
            log::error!("ContextActivation: Deactivate called without a matching activate.");
            return Err(RenderError::UnbalancedActivation);
        }
        if self.depth == 1 {
            let _guard = TRANSITIONS.lock().map_err(|_| {
                RenderError::Internal("context transition lock poisoned".to_string())
            })?;
            let saved = self.saved.take();
            if saved != Some(provider.own()) {
                provider
                    .make_current(saved)
                    .map_err(RenderError::ContextSwitchFailed)?;
            }
            log::trace!("ContextActivation: Restored {saved:?}");
        }
        self.depth -= 1;
        Ok(())
    }

    /// Returns `true` while at least one activation is open.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// The number of open activations.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::HeadlessContext;

    #[test]
    fn nested_activation_switches_once_and_restores() {
        let foreign = RawContext(77);
        let mut provider = HeadlessContext::with_current(foreign);
        let mut activation = ContextActivation::default();

        activation.activate(&mut provider).unwrap();
        activation.activate(&mut provider).unwrap();
        assert_eq!(provider.current(), Some(provider.own()));
        assert_eq!(activation.depth(), 2);

        activation.deactivate(&mut provider).unwrap();
        assert_eq!(
            provider.current(),
            Some(provider.own()),
            "inner deactivate must keep the context current"
        );
        activation.deactivate(&mut provider).unwrap();
        assert_eq!(provider.current(), Some(foreign));
        assert_eq!(provider.switches(), 2, "one switch in, one switch out");
    }

    #[test]
    fn already_current_context_is_not_switched() {
        let mut provider = HeadlessContext::new();
        let own = provider.own();
        provider.make_current(Some(own)).unwrap();
        let before = provider.switches();

        let mut activation = ContextActivation::default();
        activation.activate(&mut provider).unwrap();
        activation.deactivate(&mut provider).unwrap();

        assert_eq!(provider.switches(), before);
        assert_eq!(provider.current(), Some(own));
    }

    #[test]
    fn unbalanced_deactivate_is_an_error() {
        let mut provider = HeadlessContext::new();
        let mut activation = ContextActivation::default();
        let result = activation.deactivate(&mut provider);
        assert!(matches!(result, Err(RenderError::UnbalancedActivation)));
        assert!(!activation.is_active());
    }
}
