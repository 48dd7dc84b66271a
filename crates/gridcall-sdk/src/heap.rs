//! Handle heap
//!
//! The heap gives native values stable, revocable integer handles so the
//! host can hold opaque references to them across calls. Handles are
//! generational: a slot freed by `release` bumps its generation before it is
//! reused, so a stale handle can never alias a newer occupant of the same
//! slot — it reports not-found instead.
//!
//! The heap is the only mutable shared structure in the engine core. It
//! owns its own synchronization; callers never lock around it.

use std::fmt;

use parking_lot::RwLock;

use crate::native::NativeValue;

/// Opaque handle into the [`Heap`].
///
/// Encodes a slot index in the low 32 bits and the slot generation in the
/// high 32 bits. The combined value is always a non-negative integer when
/// carried as `i64`/`f64` by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Reconstruct a handle from its raw transport bits.
    pub fn from_bits(bits: u64) -> Self {
        Handle(bits)
    }

    /// Raw transport bits.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    fn new(index: u32, generation: u32) -> Self {
        Handle(((generation as u64) << 32) | index as u64)
    }

    fn index(self) -> u32 {
        self.0 as u32
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Slot {
    generation: u32,
    value: Option<NativeValue>,
}

/// Table mapping handles to live native values.
///
/// Concurrent-safe: `allocate`, `get` and `release` may be called from any
/// number of host calculation threads without external locking. Allocation
/// never dedupes — two allocations of equal values yield distinct handles.
pub struct Heap {
    inner: RwLock<HeapInner>,
}

struct HeapInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Heap {
            inner: RwLock::new(HeapInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Store `value` and return a handle to it.
    ///
    /// Freed slots are reused with a bumped generation; never-freed slots
    /// are appended. Handles are unique for the life of the heap.
    pub fn allocate(&self, value: NativeValue) -> Handle {
        let mut inner = self.inner.write();
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.value = Some(value);
            Handle::new(index, slot.generation)
        } else {
            let index = inner.slots.len() as u32;
            inner.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle::new(index, 0)
        }
    }

    /// Look up the value behind `handle`.
    ///
    /// Returns `None` for handles that were never issued, were released, or
    /// whose slot has since been reused under a newer generation. A `None`
    /// must be treated as an explicit stale-handle error by callers.
    pub fn get(&self, handle: Handle) -> Option<NativeValue> {
        let inner = self.inner.read();
        let slot = inner.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.clone()
    }

    /// Drop the value behind `handle`, making the handle stale.
    ///
    /// Returns `false` if the handle was already stale. The slot is recycled
    /// for later allocations under a new generation.
    pub fn release(&self, handle: Handle) -> bool {
        let mut inner = self.inner.write();
        let index = handle.index();
        let Some(slot) = inner.slots.get_mut(index as usize) else {
            return false;
        };
        if slot.generation != handle.generation() || slot.value.is_none() {
            return false;
        }
        slot.value = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(index);
        true
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.slots.len() - inner.free.len()
    }

    /// Whether the heap holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_allocated_value() {
        let heap = Heap::new();
        let h = heap.allocate(NativeValue::I32(42));
        assert_eq!(heap.get(h), Some(NativeValue::I32(42)));
    }

    #[test]
    fn distinct_allocations_get_distinct_handles() {
        let heap = Heap::new();
        let a = heap.allocate(NativeValue::Str("x".to_string()));
        let b = heap.allocate(NativeValue::Str("x".to_string()));
        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn never_issued_handle_is_not_found() {
        let heap = Heap::new();
        assert_eq!(heap.get(Handle::from_bits(7)), None);
    }

    #[test]
    fn released_handle_is_stale_even_after_slot_reuse() {
        let heap = Heap::new();
        let old = heap.allocate(NativeValue::I32(1));
        assert!(heap.release(old));
        assert!(!heap.release(old));
        assert_eq!(heap.get(old), None);

        // Reuses the freed slot under a new generation.
        let new = heap.allocate(NativeValue::I32(2));
        assert_ne!(old, new);
        assert_eq!(heap.get(old), None);
        assert_eq!(heap.get(new), Some(NativeValue::I32(2)));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn concurrent_allocations_yield_unique_handles() {
        use std::sync::Arc;

        let heap = Arc::new(Heap::new());
        let mut joins = Vec::new();
        for t in 0..4 {
            let heap = Arc::clone(&heap);
            joins.push(std::thread::spawn(move || {
                (0..100)
                    .map(|i| heap.allocate(NativeValue::I32(t * 100 + i)))
                    .collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<Handle> = joins
            .into_iter()
            .flat_map(|j| j.join().unwrap())
            .collect();
        let before = all.len();
        all.sort_by_key(|h| h.to_bits());
        all.dedup();
        assert_eq!(all.len(), before);
        assert_eq!(heap.len(), 400);
    }
}
