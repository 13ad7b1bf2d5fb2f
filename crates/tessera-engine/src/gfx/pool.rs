use std::marker::PhantomData;

use super::id::{pack, ResourceId, ResourceState, SlotInfo};

/// Largest pool size a handle can address (slot 0 is reserved).
pub const MAX_POOL_SIZE: usize = (1 << 16) - 2;

/// One pool entry.
#[derive(Debug)]
pub(crate) struct Slot<T> {
    pub generation: u16,
    pub state: ResourceState,
    /// Raw context handle the slot was allocated under.
    pub ctx: u32,
    /// Backend-independent bookkeeping, present once the resource is `Valid`.
    pub item: Option<T>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            generation: 0,
            state: ResourceState::Initial,
            ctx: 0,
            item: None,
        }
    }
}

/// Fixed-capacity generational pool.
///
/// Slots are recycled through a LIFO free list. Every allocation bumps the
/// slot generation, so handles to a previous occupant stop resolving.
#[derive(Debug)]
pub(crate) struct Pool<H, T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    _handle: PhantomData<H>,
}

impl<H: ResourceId, T> Pool<H, T> {
    pub fn new(size: usize) -> Self {
        debug_assert!(size >= 1 && size <= MAX_POOL_SIZE);
        let slots = (0..=size).map(|_| Slot::empty()).collect();
        Self {
            slots,
            free: (1..=size).rev().collect(),
            _handle: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn live_count(&self) -> usize {
        self.capacity() - self.free.len()
    }

    /// Reserves a slot in `Alloc` state. Returns `None` when exhausted.
    pub fn alloc(&mut self, ctx: u32) -> Option<H> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = ResourceState::Alloc;
        slot.ctx = ctx;
        slot.item = None;
        Some(H::from_raw(pack(slot.generation, index)))
    }

    /// Returns the slot to the free list. No-op for handles that do not resolve.
    pub fn free(&mut self, handle: H) -> Option<T> {
        let index = self.resolve(handle)?;
        let slot = &mut self.slots[index];
        slot.state = ResourceState::Initial;
        slot.ctx = 0;
        let item = slot.item.take();
        self.free.push(index);
        item
    }

    fn resolve(&self, handle: H) -> Option<usize> {
        let index = handle.slot_index();
        if index == 0 {
            return None;
        }
        let slot = self.slots.get(index)?;
        (slot.generation == handle.generation() && slot.state != ResourceState::Initial)
            .then_some(index)
    }

    pub fn get(&self, handle: H) -> Option<&Slot<T>> {
        self.resolve(handle).map(|i| &self.slots[i])
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut Slot<T>> {
        self.resolve(handle).map(|i| &mut self.slots[i])
    }

    /// Bookkeeping of a `Valid` resource.
    pub fn item(&self, handle: H) -> Option<&T> {
        self.get(handle).and_then(|s| s.item.as_ref())
    }

    pub fn item_mut(&mut self, handle: H) -> Option<&mut T> {
        self.get_mut(handle).and_then(|s| s.item.as_mut())
    }

    pub fn state(&self, handle: H) -> ResourceState {
        if handle.is_invalid() || handle.slot_index() > self.capacity() {
            return ResourceState::Invalid;
        }
        self.get(handle)
            .map_or(ResourceState::Initial, |slot| slot.state)
    }

    pub fn slot_info(&self, handle: H) -> SlotInfo {
        let state = self.state(handle);
        match self.get(handle) {
            Some(slot) => SlotInfo {
                state,
                res_id: handle.raw(),
                ctx_id: slot.ctx,
                generation: slot.generation,
                slot_index: handle.slot_index(),
            },
            None => SlotInfo {
                state,
                ..SlotInfo::default()
            },
        }
    }

    /// Handles of every non-free slot, optionally restricted to one context.
    pub fn live_handles(&self, ctx: Option<u32>) -> Vec<H> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, s)| s.state != ResourceState::Initial)
            .filter(|(_, s)| ctx.is_none_or(|c| s.ctx == c))
            .map(|(i, s)| H::from_raw(pack(s.generation, i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::id::Buffer;

    fn pool(size: usize) -> Pool<Buffer, u32> {
        Pool::new(size)
    }

    // ── alloc ─────────────────────────────────────────────────────────────

    #[test]
    fn alloc_starts_in_alloc_state() {
        let mut p = pool(4);
        let h = p.alloc(1).unwrap();
        assert_eq!(p.state(h), ResourceState::Alloc);
        assert_eq!(h.slot_index(), 1);
        assert_eq!(h.generation(), 1);
    }

    #[test]
    fn alloc_exhausts_at_capacity() {
        let mut p = pool(2);
        assert!(p.alloc(1).is_some());
        assert!(p.alloc(1).is_some());
        assert!(p.alloc(1).is_none());
        assert_eq!(p.live_count(), 2);
    }

    // ── free / reuse ──────────────────────────────────────────────────────

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut p = pool(1);
        let a = p.alloc(1).unwrap();
        p.free(a);
        let b = p.alloc(1).unwrap();
        assert_eq!(a.slot_index(), b.slot_index());
        assert_ne!(a, b);
        assert_eq!(p.state(a), ResourceState::Initial);
        assert_eq!(p.state(b), ResourceState::Alloc);
    }

    #[test]
    fn double_free_is_noop() {
        let mut p = pool(2);
        let a = p.alloc(1).unwrap();
        p.free(a);
        p.free(a);
        assert_eq!(p.live_count(), 0);
        // The free list must not contain the slot twice.
        assert!(p.alloc(1).is_some());
        assert!(p.alloc(1).is_some());
        assert!(p.alloc(1).is_none());
    }

    #[test]
    fn free_returns_item() {
        let mut p = pool(1);
        let a = p.alloc(1).unwrap();
        p.get_mut(a).unwrap().item = Some(99);
        assert_eq!(p.free(a), Some(99));
    }

    // ── state queries ─────────────────────────────────────────────────────

    #[test]
    fn invalid_and_out_of_range_handles() {
        let p = pool(2);
        assert_eq!(p.state(Buffer::INVALID), ResourceState::Invalid);
        assert_eq!(p.state(Buffer::from_raw(pack(1, 3))), ResourceState::Invalid);
        assert_eq!(p.state(Buffer::from_raw(pack(1, 2))), ResourceState::Initial);
    }

    #[test]
    fn live_handles_filters_by_context() {
        let mut p = pool(4);
        let a = p.alloc(1).unwrap();
        let b = p.alloc(2).unwrap();
        assert_eq!(p.live_handles(None).len(), 2);
        assert_eq!(p.live_handles(Some(1)), vec![a]);
        assert_eq!(p.live_handles(Some(2)), vec![b]);
    }

    #[test]
    fn slot_info_reports_context_and_generation() {
        let mut p = pool(2);
        let a = p.alloc(5).unwrap();
        let info = p.slot_info(a);
        assert_eq!(info.ctx_id, 5);
        assert_eq!(info.res_id, a.id());
        assert_eq!(info.generation, 1);
        assert_eq!(info.slot_index, 1);
    }
}
