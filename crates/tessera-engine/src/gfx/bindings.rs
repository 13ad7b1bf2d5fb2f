use super::config::{MAX_SHADERSTAGE_BUFFERS, MAX_SHADERSTAGE_IMAGES};
use super::id::{Buffer, Image};
use super::types::ShaderStage;

/// Resources feeding the next draw calls.
///
/// Unused slots hold the invalid handle. Offsets select the byte position a
/// buffer is read from, typically one returned by an append.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Bindings {
    pub vertex_buffers: [Buffer; MAX_SHADERSTAGE_BUFFERS],
    pub vertex_buffer_offsets: [usize; MAX_SHADERSTAGE_BUFFERS],
    pub index_buffer: Buffer,
    pub index_buffer_offset: usize,
    pub vs_images: [Image; MAX_SHADERSTAGE_IMAGES],
    pub fs_images: [Image; MAX_SHADERSTAGE_IMAGES],
}

impl Bindings {
    pub fn images(&self, stage: ShaderStage) -> &[Image; MAX_SHADERSTAGE_IMAGES] {
        match stage {
            ShaderStage::Vertex => &self.vs_images,
            ShaderStage::Fragment => &self.fs_images,
        }
    }
}
