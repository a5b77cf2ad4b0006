//! Task stacks: fixed-size, self-aligned virtual memory regions allocated
//! through a per-CPU magazine over a central bump pointer, per spec §3/§4.1.
//!
//! Grounded in `original_source/libos/mm/stack.c`. Two provisioning modes
//! are named in spec §4.1 ("per-CPU mode" vs. "shared mode"); this crate
//! implements the per-CPU mode (central slab + per-CPU magazines), since
//! the shared mode exists in the source to support a no-syscall
//! cross-process allocator (`smalloc.c`) that is out of scope for a single
//! host process (spec §1's NIC/iokernel boundary).

use std::cell::Cell;
use std::sync::Mutex;

use crate::config::DEFAULT_STACK_SIZE;
use crate::error::{Result, SkyloftError};
use crate::platform::mmap::MappedRegion;

/// An owned, self-aligned stack.
pub struct Stack {
    region: MappedRegion,
}

impl Stack {
    fn new(size: usize) -> Result<Self> {
        let region =
            MappedRegion::new_aligned(size).map_err(|_| SkyloftError::OutOfMemory("stack"))?;
        Ok(Self { region })
    }

    pub fn size(&self) -> usize {
        self.region.len()
    }

    pub fn base(&self) -> usize {
        self.region.as_ptr() as usize
    }

    pub fn top(&self) -> usize {
        self.base() + self.size()
    }

    /// Lazily returns the stack's physical pages to the OS without giving
    /// up its virtual address range (spec §3).
    pub fn discard(&self) {
        self.region.discard();
    }
}

/// A per-CPU cache of ready-to-use stacks ("magazine") backed by a shared
/// central free list, mirroring `libos/mm/stack.c`'s `stack_alloc`.
///
/// `task_create` is wait-free whenever the calling CPU's magazine is
/// non-empty (spec §4.1's allocator contract); only a magazine refill or
/// drain touches the central, mutex-protected free list.
pub struct StackAllocator {
    stack_size: usize,
    magazine_capacity: usize,
    central: Mutex<Vec<Stack>>,
}

thread_local! {
    static LOCAL_MAGAZINE: Cell<Option<Vec<Stack>>> = const { Cell::new(None) };
}

impl StackAllocator {
    pub fn new(stack_size: usize, magazine_capacity: usize) -> Self {
        Self {
            stack_size,
            magazine_capacity,
            central: Mutex::new(Vec::new()),
        }
    }

    fn with_local<R>(&self, f: impl FnOnce(&mut Vec<Stack>) -> R) -> R {
        LOCAL_MAGAZINE.with(|cell| {
            let mut mag = cell.take().unwrap_or_default();
            let result = f(&mut mag);
            cell.set(Some(mag));
            result
        })
    }

    pub fn alloc(&self) -> Result<Stack> {
        if let Some(stack) = self.with_local(|mag| mag.pop()) {
            return Ok(stack);
        }

        // Local magazine empty: refill from the central free list.
        {
            let mut central = self.central.lock().unwrap();
            if !central.is_empty() {
                let take = self.magazine_capacity.min(central.len());
                let split_at = central.len() - take;
                let drained: Vec<Stack> = central.split_off(split_at);
                drop(central);
                self.with_local(|mag| mag.extend(drained));
                if let Some(stack) = self.with_local(|mag| mag.pop()) {
                    return Ok(stack);
                }
            }
        }

        Stack::new(self.stack_size)
    }

    pub fn free(&self, stack: Stack) {
        stack.discard();
        let overflowed = self.with_local(|mag| {
            if mag.len() < self.magazine_capacity {
                mag.push(stack);
                None
            } else {
                Some(stack)
            }
        });
        if let Some(stack) = overflowed {
            self.central.lock().unwrap().push(stack);
        }
    }
}

impl Default for StackAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_SIZE, crate::config::DEFAULT_MAGAZINE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_free_round_trip() {
        let alloc = StackAllocator::new(64 * 1024, 4);
        let s = alloc.alloc().unwrap();
        let base = s.base();
        assert_eq!(base % s.size(), 0, "stack must be self-aligned");
        alloc.free(s);
        let s2 = alloc.alloc().unwrap();
        assert_eq!(s2.base(), base, "freed stack should be reused from the magazine");
    }
}
