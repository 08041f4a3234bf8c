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

//! Provides structs for representing extents (sizes), origins (offsets) and
//! rectangles in 2D and 3D.
//!
//! Components are integers, suitable for texel coordinates, attachment sizes
//! and copy regions.

/// A two-dimensional extent, typically representing width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

/// A three-dimensional extent, representing width, height, and depth.
///
/// For 2D images the third component is `1`; array layers are described
/// separately by the image descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth component of the extent.
    pub depth: u32,
}

impl Extent3D {
    /// Creates a 2D extent with a depth of one.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Returns the extent of the given mip level, never smaller than one texel.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }
}

/// A two-dimensional origin, typically representing an (x, y) offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin2D {
    /// The x-coordinate of the origin.
    pub x: i32,
    /// The y-coordinate of the origin.
    pub y: i32,
}

/// A three-dimensional origin, representing an (x, y, z) offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: i32,
    /// The y-coordinate of the origin.
    pub y: i32,
    /// The z-coordinate of the origin.
    pub z: i32,
}

/// An axis-aligned rectangle with a signed origin, used for render areas and scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    /// The top-left corner.
    pub offset: Origin2D,
    /// The size of the rectangle.
    pub extent: Extent2D,
}

impl Rect2D {
    /// Creates a rectangle anchored at the origin.
    pub const fn from_extent(width: u32, height: u32) -> Self {
        Self {
            offset: Origin2D { x: 0, y: 0 },
            extent: Extent2D { width, height },
        }
    }

    /// Returns this rectangle with its vertical origin mirrored inside a
    /// surface of the given height (top-left to bottom-left conventions).
    pub fn flipped_y(&self, surface_height: u32) -> Self {
        let y = surface_height as i32 - (self.offset.y + self.extent.height as i32);
        Self {
            offset: Origin2D {
                x: self.offset.x,
                y,
            },
            extent: self.extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_extents_clamp_to_one() {
        let extent = Extent3D::new_2d(256, 64);
        assert_eq!(extent.mip_level(2), Extent3D::new_2d(64, 16));
        assert_eq!(extent.mip_level(8), Extent3D::new_2d(1, 1));
    }

    #[test]
    fn flipped_rect_mirrors_vertical_origin() {
        let rect = Rect2D {
            offset: Origin2D { x: 10, y: 20 },
            extent: Extent2D {
                width: 100,
                height: 50,
            },
        };
        let flipped = rect.flipped_y(600);
        assert_eq!(flipped.offset, Origin2D { x: 10, y: 530 });
        assert_eq!(flipped.extent, rect.extent);
    }
}
