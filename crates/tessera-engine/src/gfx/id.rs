//! Typed resource handles.
//!
//! A handle is a `u32` packing `(generation << 16) | slot_index`. Slot index 0
//! is never handed out, so a live handle is never 0 and `0` always means
//! "invalid". Handles are plain values: copying one does not keep the
//! resource alive, and a handle outliving `destroy` simply stops resolving.

use std::fmt;

/// Number of bits used for the slot index inside a handle.
pub(crate) const SLOT_SHIFT: u32 = 16;
pub(crate) const SLOT_MASK: u32 = (1 << SLOT_SHIFT) - 1;

/// Lifecycle state of a pooled resource.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ResourceState {
    /// Slot not allocated (never used, or destroyed).
    #[default]
    Initial,
    /// Slot reserved, native object not yet constructed.
    Alloc,
    /// Fully constructed.
    Valid,
    /// Construction attempted and rejected.
    Failed,
    /// The handle itself is malformed.
    Invalid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
    Shader,
    Pipeline,
    Pass,
    Context,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Image => "image",
            ResourceKind::Shader => "shader",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::Pass => "pass",
            ResourceKind::Context => "context",
        };
        f.write_str(name)
    }
}

/// Common behavior of all typed handles.
pub trait ResourceId: Copy + Eq + fmt::Debug {
    const KIND: ResourceKind;

    fn from_raw(raw: u32) -> Self;
    fn raw(self) -> u32;

    fn is_invalid(self) -> bool {
        self.raw() == 0
    }

    /// Slot index inside the owning pool (1-based; 0 for the invalid handle).
    fn slot_index(self) -> usize {
        (self.raw() & SLOT_MASK) as usize
    }

    fn generation(self) -> u16 {
        (self.raw() >> SLOT_SHIFT) as u16
    }
}

pub(crate) fn pack(generation: u16, slot_index: usize) -> u32 {
    debug_assert!(slot_index > 0 && slot_index <= SLOT_MASK as usize);
    ((generation as u32) << SLOT_SHIFT) | slot_index as u32
}

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            pub const INVALID: Self = Self(0);

            pub fn id(self) -> u32 {
                self.0
            }
        }

        impl ResourceId for $name {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0 == 0 {
                    write!(f, "{}(invalid)", stringify!($name))
                } else {
                    write!(
                        f,
                        "{}({}v{})",
                        stringify!($name),
                        self.slot_index(),
                        self.generation()
                    )
                }
            }
        }
    };
}

resource_id!(
    /// Vertex or index buffer.
    Buffer => Buffer
);
resource_id!(
    /// Texture, render target or depth-stencil image.
    Image => Image
);
resource_id!(
    /// Vertex + fragment program with its declared interface.
    Shader => Shader
);
resource_id!(
    /// Shader plus fixed-function state.
    Pipeline => Pipeline
);
resource_id!(
    /// Offscreen render pass (a set of attachments).
    Pass => Pass
);
resource_id!(
    /// Resource ownership scope.
    Context => Context
);

/// Slot data common to every resource kind.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SlotInfo {
    pub state: ResourceState,
    /// Raw handle value, 0 when the slot is not live.
    pub res_id: u32,
    /// Raw handle of the context the resource was created in.
    pub ctx_id: u32,
    pub generation: u16,
    pub slot_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_is_zero() {
        assert!(Buffer::INVALID.is_invalid());
        assert_eq!(Buffer::default(), Buffer::INVALID);
        assert_eq!(Buffer::INVALID.slot_index(), 0);
    }

    #[test]
    fn pack_round_trips_slot_and_generation() {
        let img = Image::from_raw(pack(7, 42));
        assert_eq!(img.slot_index(), 42);
        assert_eq!(img.generation(), 7);
        assert!(!img.is_invalid());
    }

    #[test]
    fn generation_zero_is_still_valid() {
        let buf = Buffer::from_raw(pack(0, 1));
        assert_eq!(buf.id(), 1);
        assert!(!buf.is_invalid());
    }

    #[test]
    fn debug_shows_slot_and_generation() {
        let pip = Pipeline::from_raw(pack(3, 9));
        assert_eq!(format!("{pip:?}"), "Pipeline(9v3)");
        assert_eq!(format!("{:?}", Pipeline::INVALID), "Pipeline(invalid)");
    }
}
