//! Frame-scoped bookkeeping for dynamic and stream resources.
//!
//! Frame indices start at 1, so a counter at 0 means "never written".

use super::config::{APPEND_ALIGNMENT, NUM_INFLIGHT_FRAMES};
use super::error::{GfxError, Result};
use super::id::ResourceKind;
use super::types::Usage;

fn slot_count(usage: Usage) -> usize {
    match usage {
        Usage::Immutable => 1,
        Usage::Dynamic | Usage::Stream => NUM_INFLIGHT_FRAMES,
    }
}

/// Result of reserving space for an append.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct AppendSlot {
    /// Byte offset the data starts at (or would have started at).
    pub offset: usize,
    /// False when the append overflowed and nothing may be written.
    pub write: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct BufferStream {
    pub size: usize,
    pub usage: Usage,
    pub num_slots: usize,
    pub active_slot: usize,
    pub update_frame_index: u32,
    pub append_frame_index: u32,
    pub append_pos: usize,
    pub append_overflow: bool,
}

impl BufferStream {
    pub fn new(size: usize, usage: Usage) -> Self {
        Self {
            size,
            usage,
            num_slots: slot_count(usage),
            active_slot: 0,
            update_frame_index: 0,
            append_frame_index: 0,
            append_pos: 0,
            append_overflow: false,
        }
    }

    fn rotate(&mut self) {
        self.active_slot = (self.active_slot + 1) % self.num_slots;
    }

    /// Checks the once-per-frame update contract and records the update.
    pub fn begin_update(&mut self, frame: u32, len: usize) -> Result<()> {
        if self.usage == Usage::Immutable {
            return Err(GfxError::Immutable {
                kind: ResourceKind::Buffer,
            });
        }
        if len > self.size {
            return Err(GfxError::DataTooLarge {
                len,
                size: self.size,
            });
        }
        if self.update_frame_index == frame {
            return Err(GfxError::AlreadyUpdated {
                kind: ResourceKind::Buffer,
            });
        }
        if self.append_frame_index == frame {
            return Err(GfxError::UpdateAndAppend);
        }

        self.rotate();
        self.update_frame_index = frame;
        Ok(())
    }

    /// Reserves `len` bytes at the current append position.
    ///
    /// The first append of a frame rewinds to 0 and clears overflow. An
    /// append that does not fit marks the buffer overflown and returns the
    /// unchanged position with `write == false`.
    pub fn begin_append(&mut self, frame: u32, len: usize) -> Result<AppendSlot> {
        if self.usage == Usage::Immutable {
            return Err(GfxError::Immutable {
                kind: ResourceKind::Buffer,
            });
        }
        if self.update_frame_index == frame {
            return Err(GfxError::UpdateAndAppend);
        }

        if self.append_frame_index != frame {
            self.append_frame_index = frame;
            self.append_pos = 0;
            self.append_overflow = false;
            self.rotate();
        }

        let offset = self.append_pos;
        let padded = len.next_multiple_of(APPEND_ALIGNMENT);
        if self.append_overflow || offset + len > self.size {
            self.append_overflow = true;
            return Ok(AppendSlot { offset, write: false });
        }

        // Padding past the end of an unaligned buffer is not capacity.
        self.append_pos = (offset + padded).min(self.size);
        Ok(AppendSlot {
            offset,
            write: len > 0,
        })
    }

    pub fn is_overflown(&self, frame: u32) -> bool {
        self.append_overflow && self.append_frame_index == frame
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ImageStream {
    pub usage: Usage,
    pub num_slots: usize,
    pub active_slot: usize,
    pub update_frame_index: u32,
}

impl ImageStream {
    pub fn new(usage: Usage) -> Self {
        Self {
            usage,
            num_slots: slot_count(usage),
            active_slot: 0,
            update_frame_index: 0,
        }
    }

    pub fn begin_update(&mut self, frame: u32) -> Result<()> {
        if self.usage == Usage::Immutable {
            return Err(GfxError::Immutable {
                kind: ResourceKind::Image,
            });
        }
        if self.update_frame_index == frame {
            return Err(GfxError::AlreadyUpdated {
                kind: ResourceKind::Image,
            });
        }
        self.active_slot = (self.active_slot + 1) % self.num_slots;
        self.update_frame_index = frame;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(size: usize) -> BufferStream {
        BufferStream::new(size, Usage::Stream)
    }

    // ── update ────────────────────────────────────────────────────────────

    #[test]
    fn update_once_per_frame() {
        let mut s = stream(64);
        assert!(s.begin_update(1, 64).is_ok());
        assert_eq!(
            s.begin_update(1, 16),
            Err(GfxError::AlreadyUpdated { kind: ResourceKind::Buffer })
        );
        assert!(s.begin_update(2, 16).is_ok());
    }

    #[test]
    fn update_rejects_oversized_data() {
        let mut s = stream(8);
        assert_eq!(s.begin_update(1, 9), Err(GfxError::DataTooLarge { len: 9, size: 8 }));
        // A rejected update does not consume the frame's update.
        assert!(s.begin_update(1, 8).is_ok());
    }

    #[test]
    fn immutable_buffers_reject_writes() {
        let mut s = BufferStream::new(8, Usage::Immutable);
        assert!(s.begin_update(1, 4).is_err());
        assert!(s.begin_append(1, 4).is_err());
        assert_eq!(s.num_slots, 1);
    }

    #[test]
    fn update_and_append_exclude_each_other() {
        let mut s = stream(64);
        s.begin_update(1, 4).unwrap();
        assert_eq!(s.begin_append(1, 4), Err(GfxError::UpdateAndAppend));

        s.begin_append(2, 4).unwrap();
        assert_eq!(s.begin_update(2, 4), Err(GfxError::UpdateAndAppend));
    }

    #[test]
    fn active_slot_rotates_per_frame() {
        let mut s = stream(64);
        assert_eq!(s.num_slots, NUM_INFLIGHT_FRAMES);
        s.begin_update(1, 4).unwrap();
        assert_eq!(s.active_slot, 1);
        s.begin_append(2, 4).unwrap();
        s.begin_append(2, 4).unwrap();
        assert_eq!(s.active_slot, 0);
    }

    // ── append ────────────────────────────────────────────────────────────

    #[test]
    fn append_offsets_are_aligned_and_increasing() {
        let mut s = stream(64);
        let a = s.begin_append(1, 3).unwrap();
        let b = s.begin_append(1, 8).unwrap();
        let c = s.begin_append(1, 1).unwrap();
        assert_eq!((a.offset, b.offset, c.offset), (0, 4, 12));
        assert!(a.write && b.write && c.write);
        assert!(!s.is_overflown(1));
    }

    #[test]
    fn append_exactly_to_capacity_does_not_overflow() {
        let mut s = stream(8);
        s.begin_append(1, 4).unwrap();
        let last = s.begin_append(1, 4).unwrap();
        assert!(last.write);
        assert!(!s.is_overflown(1));
    }

    #[test]
    fn exact_fill_of_unaligned_buffer_does_not_overflow() {
        // Three u16 indices into a six byte index stream.
        let mut s = stream(6);
        let slot = s.begin_append(1, 6).unwrap();
        assert_eq!(slot, AppendSlot { offset: 0, write: true });
        assert!(!s.is_overflown(1));
        assert_eq!(s.append_pos, 6);

        let mut s = stream(10);
        s.begin_append(1, 4).unwrap();
        let tail = s.begin_append(1, 6).unwrap();
        assert_eq!(tail, AppendSlot { offset: 4, write: true });
        assert!(!s.is_overflown(1));

        // The buffer is now full; one more byte overflows.
        assert!(!s.begin_append(1, 1).unwrap().write);
        assert!(s.is_overflown(1));
    }

    #[test]
    fn append_past_capacity_overflows_until_next_frame() {
        let mut s = stream(8);
        s.begin_append(1, 8).unwrap();
        let over = s.begin_append(1, 1).unwrap();
        assert_eq!(over, AppendSlot { offset: 8, write: false });
        assert!(s.is_overflown(1));

        // Even a small append stays rejected for the rest of the frame.
        s.append_pos = 0;
        assert!(!s.begin_append(1, 1).unwrap().write);

        // Next frame: flag is not observable before, and cleared by, the first append.
        assert!(!s.is_overflown(2));
        let fresh = s.begin_append(2, 4).unwrap();
        assert_eq!(fresh, AppendSlot { offset: 0, write: true });
        assert!(!s.is_overflown(2));
    }

    #[test]
    fn empty_append_reserves_nothing() {
        let mut s = stream(8);
        let a = s.begin_append(1, 0).unwrap();
        assert_eq!(a, AppendSlot { offset: 0, write: false });
        assert_eq!(s.begin_append(1, 4).unwrap().offset, 0);
    }

    // ── images ────────────────────────────────────────────────────────────

    #[test]
    fn image_update_once_per_frame() {
        let mut s = ImageStream::new(Usage::Dynamic);
        s.begin_update(3).unwrap();
        assert!(s.begin_update(3).is_err());
        s.begin_update(4).unwrap();
        assert_eq!(s.update_frame_index, 4);
    }

    #[test]
    fn immutable_image_rejects_update() {
        let mut s = ImageStream::new(Usage::Immutable);
        assert_eq!(
            s.begin_update(1),
            Err(GfxError::Immutable { kind: ResourceKind::Image })
        );
    }
}
