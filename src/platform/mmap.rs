//! Anonymous memory mapping for task stacks and shared-memory regions.
//!
//! Grounded in `original_source/libos/platform/mem.c`'s `mem_map`, which
//! tries `MAP_HUGETLB` first and retries without it on failure, and
//! `libos/mm/stack.c`, which returns freed stack memory to the OS with
//! `madvise(MADV_DONTNEED)` rather than unmapping it.

use std::io;
use std::ptr::NonNull;

/// An anonymous mapping, aligned to its own size, with optional huge pages.
///
/// The mapping is never unmapped while the handle lives: callers that want
/// to release memory back to the OS without losing the virtual address
/// range call [`MappedRegion::discard`], mirroring the stack allocator's
/// "freed stacks go back to the central free list after their contents are
/// discarded" contract (spec §3).
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for MappedRegion {}

impl MappedRegion {
    /// Maps `len` bytes, aligned to `len` (must be a power of two), trying
    /// huge pages first and falling back to regular pages.
    pub fn new_aligned(len: usize) -> io::Result<Self> {
        assert!(len.is_power_of_two());

        // Over-allocate by `len` extra bytes so we can carve out an
        // aligned sub-range, then trim the unused head/tail. This mirrors
        // the "reserved virtual range" bump allocator of spec §4.1.
        let raw_len = len * 2;
        let raw = Self::map_raw(raw_len, true).or_else(|_| Self::map_raw(raw_len, false))?;

        let raw_addr = raw as usize;
        let aligned_addr = (raw_addr + len - 1) & !(len - 1);
        let head_slack = aligned_addr - raw_addr;
        let tail_slack = raw_len - head_slack - len;

        unsafe {
            if head_slack > 0 {
                libc::munmap(raw, head_slack);
            }
            if tail_slack > 0 {
                libc::munmap((aligned_addr + len) as *mut libc::c_void, tail_slack);
            }
        }

        Ok(Self {
            ptr: NonNull::new(aligned_addr as *mut u8).unwrap(),
            len,
        })
    }

    fn map_raw(len: usize, huge: bool) -> io::Result<*mut libc::c_void> {
        let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        #[cfg(target_os = "linux")]
        if huge {
            flags |= libc::MAP_HUGETLB;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = huge;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(ptr)
        }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Advises the kernel the contents are no longer needed, without giving
    /// up the virtual address range (spec §3: "lazily returned to the OS on
    /// free via 'don't need' advice").
    pub fn discard(&self) {
        unsafe {
            libc::madvise(self.ptr.as_ptr().cast(), self.len, libc::MADV_DONTNEED);
        }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}
