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

//! Attachment lifetimes inside a render pass.
//!
//! [`PassPlan`] records, for every attachment, the first and last subpass that
//! references it. The executor uses it to clear on first use, invalidate
//! don't-care contents and skip resolves nobody reads.

use ember_core::renderer::{
    AttachmentTarget, LoadOp, RenderPassDescriptor, StoreOp, SubpassDescriptor, TextureFormat,
};

bitflags::bitflags! {
    /// The aspects of an attachment an operation touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Aspects: u8 {
        /// Color.
        const COLOR = 1 << 0;
        /// Depth.
        const DEPTH = 1 << 1;
        /// Stencil.
        const STENCIL = 1 << 2;
    }
}

impl Aspects {
    /// The aspects a format carries.
    pub fn of(format: TextureFormat) -> Self {
        let mut aspects = Aspects::empty();
        if format.has_depth() {
            aspects |= Aspects::DEPTH;
        }
        if format.has_stencil() {
            aspects |= Aspects::STENCIL;
        }
        if aspects.is_empty() {
            aspects = Aspects::COLOR;
        }
        aspects
    }

    /// The native attachment enums to invalidate for these aspects.
    ///
    /// ## Arguments
    /// * `color_index` - The draw-buffer index of a color attachment.
    /// * `default_framebuffer` - `true` when the attachment belongs to
    ///   framebuffer 0, which uses the `COLOR`/`DEPTH`/`STENCIL` names.
    pub fn invalidation_targets(self, color_index: u32, default_framebuffer: bool) -> Vec<u32> {
        let mut targets = Vec::with_capacity(2);
        if default_framebuffer {
            if self.contains(Aspects::COLOR) {
                targets.push(glow::COLOR);
            }
            if self.contains(Aspects::DEPTH) {
                targets.push(glow::DEPTH);
            }
            if self.contains(Aspects::STENCIL) {
                targets.push(glow::STENCIL);
            }
            return targets;
        }
        if self.contains(Aspects::COLOR) {
            targets.push(glow::COLOR_ATTACHMENT0 + color_index);
        }
        match (self.contains(Aspects::DEPTH), self.contains(Aspects::STENCIL)) {
            (true, true) => targets.push(glow::DEPTH_STENCIL_ATTACHMENT),
            (true, false) => targets.push(glow::DEPTH_ATTACHMENT),
            (false, true) => targets.push(glow::STENCIL_ATTACHMENT),
            (false, false) => {}
        }
        targets
    }
}

/// The first and last subpass referencing an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentSpan {
    /// First subpass index.
    pub first: Option<u32>,
    /// Last subpass index.
    pub last: Option<u32>,
}

/// An attachment operation at a subpass boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentOp {
    /// Index into the pass' attachments.
    pub attachment: u32,
    /// Draw-buffer index for color attachments.
    pub color_index: Option<u32>,
    /// The aspects concerned.
    pub aspects: Aspects,
}

fn rendered(subpass: &SubpassDescriptor) -> impl Iterator<Item = (u32, Option<u32>)> + '_ {
    subpass
        .color_attachments
        .iter()
        .enumerate()
        .map(|(i, &a)| (a, Some(i as u32)))
        .chain(subpass.depth_attachment.map(|a| (a, None)))
}

/// Checks that a pass only references attachments it declares.
pub fn validate(pass: &RenderPassDescriptor) -> Result<(), String> {
    if pass.subpasses.is_empty() {
        return Err("render pass has no subpasses".to_string());
    }
    let count = pass.attachments.len() as u32;
    for (index, subpass) in pass.subpasses.iter().enumerate() {
        if let Some(bad) = RenderPassDescriptor::subpass_references(subpass).find(|&a| a >= count) {
            return Err(format!(
                "subpass {index} references attachment {bad} of {count}"
            ));
        }
        if !subpass.resolve_attachments.is_empty()
            && subpass.resolve_attachments.len() != subpass.color_attachments.len()
        {
            return Err(format!(
                "subpass {index} has {} resolve targets for {} color attachments",
                subpass.resolve_attachments.len(),
                subpass.color_attachments.len()
            ));
        }
        let backbuffer_color = subpass
            .color_attachments
            .iter()
            .any(|&a| pass.attachments[a as usize].target == AttachmentTarget::Backbuffer);
        if backbuffer_color {
            if subpass.color_attachments.len() != 1 {
                return Err(format!(
                    "subpass {index} mixes the backbuffer with other color attachments"
                ));
            }
            if let Some(depth) = subpass.depth_attachment {
                if pass.attachments[depth as usize].target != AttachmentTarget::Backbuffer {
                    return Err(format!(
                        "subpass {index} pairs the backbuffer with an image depth attachment"
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Per-attachment lifetimes of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPlan {
    spans: Vec<AttachmentSpan>,
}

impl PassPlan {
    /// Computes the first/last use of every attachment. The pass must have
    /// passed [`validate`].
    pub fn new(pass: &RenderPassDescriptor) -> Self {
        let mut spans = vec![AttachmentSpan::default(); pass.attachments.len()];
        for (index, subpass) in pass.subpasses.iter().enumerate() {
            let index = index as u32;
            for attachment in RenderPassDescriptor::subpass_references(subpass) {
                if let Some(span) = spans.get_mut(attachment as usize) {
                    span.first.get_or_insert(index);
                    span.last = Some(index);
                }
            }
        }
        Self { spans }
    }

    /// The lifetime of one attachment.
    pub fn span(&self, attachment: u32) -> AttachmentSpan {
        self.spans
            .get(attachment as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Rendered attachments first used by `subpass` whose load op is `op`.
    pub fn first_use_loads(
        &self,
        pass: &RenderPassDescriptor,
        subpass: u32,
        op: LoadOp,
    ) -> Vec<AttachmentOp> {
        let Some(desc) = pass.subpasses.get(subpass as usize) else {
            return Vec::new();
        };
        rendered(desc)
            .filter(|&(a, _)| self.span(a).first == Some(subpass))
            .filter_map(|(a, color_index)| {
                let attachment = &pass.attachments[a as usize];
                let all = Aspects::of(attachment.format);
                let mut aspects = Aspects::empty();
                if attachment.load_op == op {
                    aspects |= all & (Aspects::COLOR | Aspects::DEPTH);
                }
                if attachment.stencil_load_op == op {
                    aspects |= all & Aspects::STENCIL;
                }
                (!aspects.is_empty()).then_some(AttachmentOp {
                    attachment: a,
                    color_index,
                    aspects,
                })
            })
            .collect()
    }

    /// Rendered attachments last used by `subpass` whose store op is `op`.
    pub fn last_use_stores(
        &self,
        pass: &RenderPassDescriptor,
        subpass: u32,
        op: StoreOp,
    ) -> Vec<AttachmentOp> {
        let Some(desc) = pass.subpasses.get(subpass as usize) else {
            return Vec::new();
        };
        rendered(desc)
            .filter(|&(a, _)| self.span(a).last == Some(subpass))
            .filter_map(|(a, color_index)| {
                let attachment = &pass.attachments[a as usize];
                let all = Aspects::of(attachment.format);
                let mut aspects = Aspects::empty();
                if attachment.store_op == op {
                    aspects |= all & (Aspects::COLOR | Aspects::DEPTH);
                }
                if attachment.stencil_store_op == op {
                    aspects |= all & Aspects::STENCIL;
                }
                (!aspects.is_empty()).then_some(AttachmentOp {
                    attachment: a,
                    color_index,
                    aspects,
                })
            })
            .collect()
    }

    /// Returns `false` when resolving into `target` at the end of `subpass`
    /// would produce content nobody reads.
    pub fn resolve_needed(&self, pass: &RenderPassDescriptor, subpass: u32, target: u32) -> bool {
        let Some(attachment) = pass.attachments.get(target as usize) else {
            return false;
        };
        !(attachment.store_op == StoreOp::DontCare && self.span(target).last == Some(subpass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::Rect2D;
    use ember_core::renderer::{AttachmentDescriptor, ClearValue, ImageId};

    fn deferred_pass() -> RenderPassDescriptor {
        RenderPassDescriptor {
            attachments: vec![
                AttachmentDescriptor::new(AttachmentTarget::Image(ImageId(0)), TextureFormat::Rgba8Unorm)
                    .with_clear(ClearValue::default())
                    .with_store(StoreOp::DontCare),
                AttachmentDescriptor::new(AttachmentTarget::Image(ImageId(1)), TextureFormat::Depth24PlusStencil8)
                    .with_clear(ClearValue::DepthStencil { depth: 1.0, stencil: 0 })
                    .with_store(StoreOp::DontCare),
                AttachmentDescriptor::new(AttachmentTarget::Backbuffer, TextureFormat::Rgba8Unorm),
            ],
            subpasses: vec![
                SubpassDescriptor {
                    color_attachments: vec![0],
                    depth_attachment: Some(1),
                    ..Default::default()
                },
                SubpassDescriptor {
                    input_attachments: vec![0],
                    color_attachments: vec![2],
                    ..Default::default()
                },
            ],
            render_area: Rect2D::from_extent(64, 64),
        }
    }

    #[test]
    fn spans_cover_input_reads() {
        let pass = deferred_pass();
        let plan = PassPlan::new(&pass);
        assert_eq!(plan.span(0), AttachmentSpan { first: Some(0), last: Some(1) });
        assert_eq!(plan.span(1), AttachmentSpan { first: Some(0), last: Some(0) });
        assert_eq!(plan.span(2), AttachmentSpan { first: Some(1), last: Some(1) });
    }

    #[test]
    fn clears_and_invalidations_follow_lifetimes() {
        let pass = deferred_pass();
        let plan = PassPlan::new(&pass);

        let clears = plan.first_use_loads(&pass, 0, LoadOp::Clear);
        assert_eq!(clears.len(), 2);
        assert_eq!(clears[0].color_index, Some(0));
        assert_eq!(clears[1].aspects, Aspects::DEPTH | Aspects::STENCIL);

        // The G-buffer is still read by subpass 1, so only depth dies here.
        let dropped = plan.last_use_stores(&pass, 0, StoreOp::DontCare);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].attachment, 1);
        assert_eq!(
            dropped[0].aspects.invalidation_targets(0, false),
            vec![glow::DEPTH_STENCIL_ATTACHMENT]
        );
        assert!(plan.last_use_stores(&pass, 1, StoreOp::DontCare).is_empty());
    }

    #[test]
    fn resolve_into_discarded_target_is_elided() {
        let mut pass = deferred_pass();
        pass.subpasses[0].resolve_attachments = vec![Some(0)];
        pass.subpasses.truncate(1);
        let plan = PassPlan::new(&pass);
        assert!(!plan.resolve_needed(&pass, 0, 0));

        pass.attachments[0].store_op = StoreOp::Store;
        assert!(plan.resolve_needed(&pass, 0, 0));
    }

    #[test]
    fn validation_rejects_bad_references() {
        let mut pass = deferred_pass();
        assert!(validate(&pass).is_ok());
        pass.subpasses[1].color_attachments = vec![2, 0];
        assert!(validate(&pass).is_err());
        pass.subpasses[1].color_attachments = vec![7];
        assert!(validate(&pass).is_err());
    }
}
