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

//! Framebuffer objects built on demand from render passes.
//!
//! Entries are keyed by an xxh3 hash of the pass' attachment identities and
//! subpass structure, handed out as generation-checked handles and evicted
//! once they have been unused for longer than the frames in flight.

use super::native::{GlApi, GlName};
use super::resources::{GlImage, ResourceRegistry};
use super::state_cache::StateCache;
use ember_core::math::Extent2D;
use ember_core::renderer::{
    AttachmentTarget, ImageId, ImageKind, RenderPassDescriptor, SubpassDescriptor,
};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Attaches one level and layer of `image` to the framebuffer bound at
/// `target`. Cube faces are addressed by layer.
pub(crate) fn attach_image<G: GlApi + ?Sized>(
    gl: &G,
    target: u32,
    point: u32,
    image: &GlImage,
    level: u32,
    layer: u32,
) {
    let level = level as i32;
    if image.descriptor.kind == ImageKind::Cube {
        gl.framebuffer_texture_2d(
            target,
            point,
            glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
            image.name,
            level,
        );
    } else if image.descriptor.is_layered() {
        gl.framebuffer_texture_layer(target, point, image.name, level, layer as i32);
    } else {
        gl.framebuffer_texture_2d(target, point, image.target, image.name, level);
    }
}

/// A generation-checked reference to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferHandle {
    index: u32,
    generation: u32,
}

/// What one subpass renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassTarget {
    /// The draw framebuffer, `0` for the backbuffer.
    pub framebuffer: GlName,
    /// The framebuffer resolves are blitted into.
    pub resolve_framebuffer: Option<GlName>,
    /// `true` if rendering goes to the default framebuffer and the vertical
    /// axis and winding must be flipped.
    pub flip_y: bool,
    /// `true` if the resolve framebuffer is the default framebuffer.
    pub resolve_flip_y: bool,
    /// Number of color attachments.
    pub color_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PassIdentity {
    attachments: Vec<(AttachmentTarget, u32, u32)>,
    subpasses: Vec<SubpassDescriptor>,
}

impl PassIdentity {
    fn of(pass: &RenderPassDescriptor) -> Self {
        Self {
            attachments: pass
                .attachments
                .iter()
                .map(|a| (a.target, a.layer, a.mip_level))
                .collect(),
            subpasses: pass.subpasses.clone(),
        }
    }

    fn hash_value(&self) -> u64 {
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// The native objects of one render pass.
#[derive(Debug)]
pub struct FramebufferEntry {
    identity: PassIdentity,
    /// Targets per subpass; empty when the entry is invalid.
    pub subpasses: Vec<SubpassTarget>,
    owned: Vec<GlName>,
    images: Vec<ImageId>,
    /// The largest area every attachment covers.
    pub extent: Extent2D,
    /// `false` if an attachment was missing or a framebuffer incomplete.
    pub valid: bool,
    last_used: u64,
}

impl FramebufferEntry {
    fn release<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache) {
        for framebuffer in self.owned.drain(..) {
            state.forget_framebuffer(framebuffer);
            gl.delete_framebuffer(framebuffer);
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<FramebufferEntry>,
}

/// The draw buffers of a framebuffer holding `colors` at consecutive
/// attachment points. Never empty.
pub fn draw_buffer_list(colors: &[Option<u32>]) -> Vec<u32> {
    let mut buffers: Vec<u32> = colors
        .iter()
        .enumerate()
        .map(|(index, color)| match color {
            Some(_) => glow::COLOR_ATTACHMENT0 + index as u32,
            None => glow::NONE,
        })
        .collect();
    if buffers.is_empty() {
        buffers.push(glow::NONE);
    }
    buffers
}

struct Builder<'a, G: GlApi + ?Sized> {
    gl: &'a G,
    state: &'a mut StateCache,
    registry: &'a ResourceRegistry,
    pass: &'a RenderPassDescriptor,
    owned: Vec<GlName>,
    reuse: Vec<(Vec<u32>, Option<u32>, GlName)>,
}

impl<G: GlApi + ?Sized> Builder<'_, G> {
    fn image(&self, attachment: u32) -> Result<&GlImage, String> {
        let desc = &self.pass.attachments[attachment as usize];
        let AttachmentTarget::Image(id) = desc.target else {
            return Err(format!("attachment {attachment} is the backbuffer"));
        };
        let image = self
            .registry
            .image(id)
            .ok_or_else(|| format!("attachment {attachment} uses destroyed image {id:?}"))?;
        if image.is_external() {
            return Err(format!("attachment {attachment} is an external image"));
        }
        Ok(image)
    }

    fn attach(&self, point: u32, attachment: u32) -> Result<(), String> {
        let desc = &self.pass.attachments[attachment as usize];
        let image = self.image(attachment)?;
        attach_image(self.gl, glow::DRAW_FRAMEBUFFER, point, image, desc.mip_level, desc.layer);
        Ok(())
    }

    /// Builds (or reuses) a framebuffer holding `colors` at consecutive
    /// draw buffers plus an optional depth attachment.
    fn framebuffer(
        &mut self,
        colors: &[Option<u32>],
        depth: Option<u32>,
    ) -> Result<GlName, String> {
        let key: Vec<u32> = colors.iter().map(|c| c.unwrap_or(u32::MAX)).collect();
        if let Some((_, _, fbo)) = self.reuse.iter().find(|(c, d, _)| *c == key && *d == depth) {
            return Ok(*fbo);
        }
        let fbo = self.gl.create_framebuffer();
        if fbo == 0 {
            return Err("glGenFramebuffers returned no name".to_string());
        }
        self.owned.push(fbo);
        self.state.bind_framebuffer(self.gl, glow::DRAW_FRAMEBUFFER, fbo);

        for (index, color) in colors.iter().enumerate() {
            if let Some(attachment) = color {
                self.attach(glow::COLOR_ATTACHMENT0 + index as u32, *attachment)?;
            }
        }
        if let Some(attachment) = depth {
            let image = self.image(attachment)?;
            let point = image.format.attachment_point(0);
            self.attach(point, attachment)?;
        }
        self.gl.draw_buffers(&draw_buffer_list(colors));

        let status = self.gl.check_framebuffer_status(glow::DRAW_FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(format!("framebuffer {fbo} incomplete (status {status:#x})"));
        }
        self.reuse.push((key, depth, fbo));
        Ok(fbo)
    }

    fn is_backbuffer(&self, attachment: u32) -> bool {
        self.pass.attachments[attachment as usize].target == AttachmentTarget::Backbuffer
    }

    fn subpass(
        &mut self,
        subpass: &SubpassDescriptor,
        flip_default: bool,
    ) -> Result<SubpassTarget, String> {
        let backbuffer = match subpass.color_attachments.as_slice() {
            [only] => self.is_backbuffer(*only),
            [] => subpass.depth_attachment.is_some_and(|d| self.is_backbuffer(d)),
            _ => false,
        };
        let mut target = if backbuffer {
            SubpassTarget {
                framebuffer: 0,
                resolve_framebuffer: None,
                flip_y: flip_default,
                resolve_flip_y: false,
                color_count: subpass.color_attachments.len() as u32,
            }
        } else {
            let colors: Vec<Option<u32>> =
                subpass.color_attachments.iter().map(|&c| Some(c)).collect();
            SubpassTarget {
                framebuffer: self.framebuffer(&colors, subpass.depth_attachment)?,
                resolve_framebuffer: None,
                flip_y: false,
                resolve_flip_y: false,
                color_count: colors.len() as u32,
            }
        };

        let resolves: Vec<Option<u32>> = subpass.resolve_attachments.clone();
        if resolves.iter().any(Option::is_some) || subpass.depth_resolve_attachment.is_some() {
            let to_backbuffer = resolves.iter().flatten().any(|&r| self.is_backbuffer(r));
            if to_backbuffer {
                let alone = resolves.iter().flatten().count() == 1;
                if !alone || subpass.depth_resolve_attachment.is_some() {
                    return Err("a backbuffer resolve must be the only resolve target".to_string());
                }
                target.resolve_framebuffer = Some(0);
                target.resolve_flip_y = flip_default;
            } else {
                target.resolve_framebuffer =
                    Some(self.framebuffer(&resolves, subpass.depth_resolve_attachment)?);
            }
        }
        Ok(target)
    }

    fn extent(&self, backbuffer: Extent2D) -> Extent2D {
        let mut extent = Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        for desc in &self.pass.attachments {
            let size = match desc.target {
                AttachmentTarget::Backbuffer => backbuffer,
                AttachmentTarget::Image(id) => match self.registry.image(id) {
                    Some(image) => {
                        let level = image.descriptor.size.mip_level(desc.mip_level);
                        Extent2D {
                            width: level.width,
                            height: level.height,
                        }
                    }
                    None => continue,
                },
            };
            extent.width = extent.width.min(size.width);
            extent.height = extent.height.min(size.height);
        }
        if extent.width == u32::MAX {
            extent = Extent2D::default();
        }
        extent
    }
}

/// Render-pass framebuffers indexed by attachment identity.
#[derive(Debug, Default)]
pub struct FramebufferCache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    index: HashMap<u64, u32>,
    created: u32,
    evicted: u32,
}

impl FramebufferCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached passes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The entry behind `handle`, if it is still alive.
    pub fn get(&self, handle: FramebufferHandle) -> Option<&FramebufferEntry> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Returns the framebuffers of `pass`, building them on a miss.
    ///
    /// A pass whose framebuffers cannot be built yields an invalid entry for
    /// the rest of `frame`; it is rebuilt when requested in a later frame.
    ///
    /// ## Arguments
    /// * `backbuffer` - Extent of the default framebuffer.
    /// * `flip_default` - Whether rendering to the default framebuffer flips
    ///   the vertical axis.
    #[allow(clippy::too_many_arguments)]
    pub fn get_framebuffer<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        registry: &ResourceRegistry,
        pass: &RenderPassDescriptor,
        frame: u64,
        backbuffer: Extent2D,
        flip_default: bool,
    ) -> FramebufferHandle {
        let identity = PassIdentity::of(pass);
        let key = identity.hash_value();

        if let Some(&index) = self.index.get(&key) {
            let slot = &mut self.slots[index as usize];
            let handle = FramebufferHandle {
                index,
                generation: slot.generation,
            };
            let reusable = slot
                .entry
                .as_ref()
                .is_some_and(|e| e.identity == identity && (e.valid || e.last_used == frame));
            if reusable {
                if let Some(entry) = slot.entry.as_mut() {
                    entry.last_used = frame;
                }
                return handle;
            }
            log::debug!("FramebufferCache: Rebuilding entry {index}");
            self.remove(gl, state, index);
        }

        let mut builder = Builder {
            gl,
            state,
            registry,
            pass,
            owned: Vec::new(),
            reuse: Vec::new(),
        };
        let built: Result<Vec<SubpassTarget>, String> = pass
            .subpasses
            .iter()
            .map(|subpass| builder.subpass(subpass, flip_default))
            .collect();
        let extent = builder.extent(backbuffer);
        let owned = std::mem::take(&mut builder.owned);

        let mut entry = FramebufferEntry {
            identity,
            subpasses: Vec::new(),
            owned,
            images: pass
                .attachments
                .iter()
                .filter_map(|a| match a.target {
                    AttachmentTarget::Image(id) => Some(id),
                    AttachmentTarget::Backbuffer => None,
                })
                .collect(),
            extent,
            valid: false,
            last_used: frame,
        };
        match built {
            Ok(subpasses) => {
                self.created += 1;
                entry.subpasses = subpasses;
                entry.valid = true;
                log::debug!(
                    "FramebufferCache: Built {} framebuffer(s) for a {}-subpass pass",
                    entry.owned.len(),
                    pass.subpasses.len()
                );
            }
            Err(reason) => {
                log::error!("FramebufferCache: Render pass invalid this frame: {reason}");
                entry.release(gl, state);
            }
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        self.index.insert(key, index);
        FramebufferHandle {
            index,
            generation: slot.generation,
        }
    }

    fn remove<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache, index: u32) {
        let slot = &mut self.slots[index as usize];
        if let Some(mut entry) = slot.entry.take() {
            entry.release(gl, state);
            self.index.remove(&entry.identity.hash_value());
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
    }

    /// Destroys every entry unused for more than `max_age` frames.
    ///
    /// ## Returns
    /// The number of entries evicted.
    pub fn evict<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        frame: u64,
        max_age: u64,
    ) -> u32 {
        let stale: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let entry = slot.entry.as_ref()?;
                (frame.saturating_sub(entry.last_used) > max_age).then_some(index as u32)
            })
            .collect();
        for &index in &stale {
            self.remove(gl, state, index);
        }
        if !stale.is_empty() {
            log::debug!("FramebufferCache: Evicted {} entries at frame {frame}", stale.len());
        }
        self.evicted += stale.len() as u32;
        stale.len() as u32
    }

    /// Destroys every entry that renders to `image`.
    pub fn purge_image<G: GlApi + ?Sized>(
        &mut self,
        gl: &G,
        state: &mut StateCache,
        image: ImageId,
    ) {
        let doomed: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.as_ref().is_some_and(|e| e.images.contains(&image)))
            .map(|(index, _)| index as u32)
            .collect();
        for index in doomed {
            self.remove(gl, state, index);
        }
    }

    /// Destroys every entry.
    pub fn destroy_all<G: GlApi + ?Sized>(&mut self, gl: &G, state: &mut StateCache) {
        for index in 0..self.slots.len() as u32 {
            self.remove(gl, state, index);
        }
    }

    /// Returns and resets the (framebuffers created, entries evicted) counters.
    pub fn take_counters(&mut self) -> (u32, u32) {
        (std::mem::take(&mut self.created), std::mem::take(&mut self.evicted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::gl::headless::{GlCall, HeadlessGl};
    use ember_core::math::Rect2D;
    use ember_core::renderer::{
        AttachmentDescriptor, ImageDescriptor, ImageUsage, TextureFormat,
    };

    const BACKBUFFER: Extent2D = Extent2D {
        width: 800,
        height: 600,
    };

    fn color_pass(image: ImageId) -> RenderPassDescriptor {
        RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor::new(
                AttachmentTarget::Image(image),
                TextureFormat::Rgba8Unorm,
            )],
            subpasses: vec![SubpassDescriptor {
                color_attachments: vec![0],
                ..Default::default()
            }],
            render_area: Rect2D::from_extent(64, 64),
        }
    }

    fn setup() -> (HeadlessGl, StateCache, ResourceRegistry, ImageId, ImageId) {
        let gl = HeadlessGl::new();
        let mut state = StateCache::new(16);
        let mut registry = ResourceRegistry::new();
        let usage = ImageUsage::COLOR_ATTACHMENT;
        let desc = ImageDescriptor::new_2d(TextureFormat::Rgba8Unorm, 64, 32, usage);
        let a = registry.create_image(&gl, &mut state, &desc).expect("image a");
        let b = registry.create_image(&gl, &mut state, &desc).expect("image b");
        (gl, state, registry, a, b)
    }

    #[test]
    fn identical_passes_share_a_handle() {
        let (gl, mut state, registry, a, b) = setup();
        let mut cache = FramebufferCache::new();

        let first =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 0, BACKBUFFER, true);
        let again =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 1, BACKBUFFER, true);
        assert_eq!(first, again);
        assert_eq!(gl.count(|c| matches!(c, GlCall::CreateFramebuffer(_))), 1);

        let other =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(b), 1, BACKBUFFER, true);
        assert_ne!(first, other);
        assert_eq!(gl.count(|c| matches!(c, GlCall::CreateFramebuffer(_))), 2);

        let entry = cache.get(first).expect("entry");
        assert!(entry.valid);
        assert_eq!(entry.extent, Extent2D { width: 64, height: 32 });
        assert_eq!(cache.take_counters(), (2, 0));
    }

    #[test]
    fn stale_entries_are_released_once() {
        let (gl, mut state, registry, a, _) = setup();
        let mut cache = FramebufferCache::new();
        let handle =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 0, BACKBUFFER, true);

        assert_eq!(cache.evict(&gl, &mut state, 4, 4), 0);
        assert_eq!(cache.evict(&gl, &mut state, 5, 4), 1);
        assert_eq!(cache.evict(&gl, &mut state, 6, 4), 0);
        assert_eq!(gl.count(|c| matches!(c, GlCall::DeleteFramebuffer(_))), 1);
        assert!(cache.get(handle).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn backbuffer_subpass_uses_the_default_framebuffer() {
        let (gl, mut state, registry, _, _) = setup();
        let mut cache = FramebufferCache::new();
        let pass = RenderPassDescriptor {
            attachments: vec![AttachmentDescriptor::new(
                AttachmentTarget::Backbuffer,
                TextureFormat::Rgba8Unorm,
            )],
            subpasses: vec![SubpassDescriptor {
                color_attachments: vec![0],
                ..Default::default()
            }],
            render_area: Rect2D::from_extent(800, 600),
        };
        let handle = cache.get_framebuffer(&gl, &mut state, &registry, &pass, 0, BACKBUFFER, true);
        let entry = cache.get(handle).expect("entry");
        assert_eq!(entry.subpasses[0].framebuffer, 0);
        assert!(entry.subpasses[0].flip_y);
        assert_eq!(entry.extent, BACKBUFFER);
        assert_eq!(gl.count(|c| matches!(c, GlCall::CreateFramebuffer(_))), 0);
    }

    #[test]
    fn incomplete_framebuffers_retry_next_frame() {
        let (gl, mut state, registry, a, _) = setup();
        let mut cache = FramebufferCache::new();
        gl.set_framebuffer_complete(false);
        let handle =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 0, BACKBUFFER, true);
        assert!(!cache.get(handle).expect("entry").valid);
        assert_eq!(gl.count(|c| matches!(c, GlCall::DeleteFramebuffer(_))), 1);

        // Same frame: the failure sticks.
        let same =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 0, BACKBUFFER, true);
        assert_eq!(handle, same);

        gl.set_framebuffer_complete(true);
        let retried =
            cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 1, BACKBUFFER, true);
        assert_ne!(handle, retried);
        assert!(cache.get(retried).expect("entry").valid);
    }

    #[test]
    fn purging_an_image_drops_its_entries() {
        let (gl, mut state, registry, a, b) = setup();
        let mut cache = FramebufferCache::new();
        cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(a), 0, BACKBUFFER, true);
        cache.get_framebuffer(&gl, &mut state, &registry, &color_pass(b), 0, BACKBUFFER, true);
        cache.purge_image(&gl, &mut state, a);
        assert_eq!(cache.len(), 1);
    }
}
