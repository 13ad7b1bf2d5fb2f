use super::error::{GfxError, Result};
use super::id::ResourceKind;
use super::pool::MAX_POOL_SIZE;

pub const NUM_SHADER_STAGES: usize = 2;
pub const NUM_INFLIGHT_FRAMES: usize = 2;
pub const MAX_COLOR_ATTACHMENTS: usize = 4;
pub const MAX_SHADERSTAGE_BUFFERS: usize = 8;
pub const MAX_SHADERSTAGE_IMAGES: usize = 12;
pub const MAX_SHADERSTAGE_UBS: usize = 4;
pub const MAX_UB_MEMBERS: usize = 16;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_MIPMAPS: usize = 16;
pub const MAX_TEXTUREARRAY_LAYERS: usize = 128;
pub const NUM_CUBE_FACES: usize = 6;

/// Byte alignment of offsets returned by buffer appends.
pub const APPEND_ALIGNMENT: usize = 4;

pub const DEFAULT_BUFFER_POOL_SIZE: usize = 128;
pub const DEFAULT_IMAGE_POOL_SIZE: usize = 128;
pub const DEFAULT_SHADER_POOL_SIZE: usize = 32;
pub const DEFAULT_PIPELINE_POOL_SIZE: usize = 64;
pub const DEFAULT_PASS_POOL_SIZE: usize = 16;
pub const DEFAULT_CONTEXT_POOL_SIZE: usize = 16;
pub const DEFAULT_UNIFORM_BUFFER_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_SAMPLER_CACHE_SIZE: usize = 64;

/// Device setup parameters.
///
/// Every size left at 0 resolves to the matching `DEFAULT_*` constant.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GfxConfig {
    pub buffer_pool_size: usize,
    pub image_pool_size: usize,
    pub shader_pool_size: usize,
    pub pipeline_pool_size: usize,
    pub pass_pool_size: usize,
    pub context_pool_size: usize,
    /// Per-frame uniform staging size used by backends that batch uniforms.
    pub uniform_buffer_size: usize,
    /// Number of distinct samplers a backend may cache.
    pub sampler_cache_size: usize,
}

impl GfxConfig {
    /// Replaces zero fields with defaults and range-checks the pool sizes.
    pub fn resolved(&self) -> Result<Self> {
        fn or(v: usize, d: usize) -> usize {
            if v == 0 { d } else { v }
        }

        let cfg = Self {
            buffer_pool_size: or(self.buffer_pool_size, DEFAULT_BUFFER_POOL_SIZE),
            image_pool_size: or(self.image_pool_size, DEFAULT_IMAGE_POOL_SIZE),
            shader_pool_size: or(self.shader_pool_size, DEFAULT_SHADER_POOL_SIZE),
            pipeline_pool_size: or(self.pipeline_pool_size, DEFAULT_PIPELINE_POOL_SIZE),
            pass_pool_size: or(self.pass_pool_size, DEFAULT_PASS_POOL_SIZE),
            context_pool_size: or(self.context_pool_size, DEFAULT_CONTEXT_POOL_SIZE),
            uniform_buffer_size: or(self.uniform_buffer_size, DEFAULT_UNIFORM_BUFFER_SIZE),
            sampler_cache_size: or(self.sampler_cache_size, DEFAULT_SAMPLER_CACHE_SIZE),
        };

        let pools = [
            (ResourceKind::Buffer, cfg.buffer_pool_size),
            (ResourceKind::Image, cfg.image_pool_size),
            (ResourceKind::Shader, cfg.shader_pool_size),
            (ResourceKind::Pipeline, cfg.pipeline_pool_size),
            (ResourceKind::Pass, cfg.pass_pool_size),
            (ResourceKind::Context, cfg.context_pool_size),
        ];
        for (kind, size) in pools {
            if size > MAX_POOL_SIZE {
                return Err(GfxError::PoolSize {
                    kind,
                    size,
                    max: MAX_POOL_SIZE,
                });
            }
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_resolve_to_defaults() {
        let cfg = GfxConfig::default().resolved().unwrap();
        assert_eq!(cfg.buffer_pool_size, DEFAULT_BUFFER_POOL_SIZE);
        assert_eq!(cfg.pass_pool_size, DEFAULT_PASS_POOL_SIZE);
        assert_eq!(cfg.uniform_buffer_size, DEFAULT_UNIFORM_BUFFER_SIZE);
    }

    #[test]
    fn explicit_sizes_are_kept() {
        let cfg = GfxConfig {
            shader_pool_size: 3,
            ..Default::default()
        }
        .resolved()
        .unwrap();
        assert_eq!(cfg.shader_pool_size, 3);
    }

    #[test]
    fn oversized_pool_is_rejected() {
        let err = GfxConfig {
            image_pool_size: MAX_POOL_SIZE + 1,
            ..Default::default()
        }
        .resolved()
        .unwrap_err();
        assert!(matches!(err, GfxError::PoolSize { kind: ResourceKind::Image, .. }));
    }
}
