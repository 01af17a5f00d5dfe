//! Vertex and uniform data shared with the shaders

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Interleaved vertex consumed by the MVP shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a vertex
    #[must_use]
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, color, tex_coord }
    }
}

/// Uniform block at set 0, binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MvpBlock {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to view, already in Vulkan view orientation
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
}

impl MvpBlock {
    /// Pack column-major matrices
    #[must_use]
    pub fn new(model: &Mat4, view: &Mat4, projection: &Mat4) -> Self {
        Self {
            model: (*model).into(),
            view: (*view).into(),
            projection: (*projection).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::size_of::<MvpBlock>(), 192);
    }

    #[test]
    fn test_mvp_block_is_column_major() {
        let model = Mat4::new_translation(&Vec3::new(2.0, 3.0, 4.0));
        let block = MvpBlock::new(&model, &Mat4::identity(), &Mat4::identity());

        assert_eq!(block.model[3], [2.0, 3.0, 4.0, 1.0]);
    }
}
