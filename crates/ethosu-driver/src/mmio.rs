//! Memory-mapped register access.
//!
//! [`RegisterIo`] is the seam between the driver and the register window.
//! [`MappedRegion`] implements it with volatile loads and stores against a
//! real mapping; [`SimulatedNpu`](crate::sim::SimulatedNpu) implements it in
//! software.
//!
//! A region is obtained either from a raw base pointer (bare-metal style,
//! the window is already mapped at a fixed address) or by mapping a
//! physical window through `/dev/mem` or a UIO node.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cast_possible_truncation)]

use crate::error::Result;
use rustix::fs::{Mode, OFlags};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;

/// 32-bit register window.
///
/// Offsets are byte offsets from the window base. Implementations may
/// assume `offset` is 4-byte aligned; [`Device`](crate::Device) checks it
/// before every access.
pub trait RegisterIo: Send + Sync + fmt::Debug {
    /// Read the register at `offset`.
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write32(&self, offset: usize, value: u32);
}

/// How a [`MappedRegion`] came to exist, and so how it is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Borrowed from the platform; never unmapped.
    Fixed,
    /// Our own `mmap`; `map_base`/`map_len` cover the page-aligned span.
    Mapped { map_base: NonNull<u8>, map_len: usize },
}

/// Register window backed by real memory.
pub struct MappedRegion {
    base: NonNull<u8>,
    size: usize,
    origin: Origin,
}

// SAFETY: the region is only accessed through volatile 32-bit loads and
// stores, which the NPU register interface defines for any caller. The
// pointer itself is never handed out.
unsafe impl Send for MappedRegion {}
// SAFETY: see `Send`; `&MappedRegion` exposes no interior references.
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Wrap an already-mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must point at a register window at least `size` bytes long
    /// that stays mapped for the lifetime of the returned value, and no
    /// other code may create references into it.
    pub unsafe fn from_raw(base: NonNull<u8>, size: usize) -> Self {
        Self {
            base,
            size,
            origin: Origin::Fixed,
        }
    }

    /// Map `size` bytes of physical address space starting at `phys`.
    ///
    /// `path` is `/dev/mem` or a UIO node (`/dev/uio0`); for UIO, `phys`
    /// is the map offset (`N * page_size` for map `N`).
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be opened or mapped.
    pub fn map_physical(path: impl AsRef<Path>, phys: u64, size: usize) -> Result<Self> {
        let path = path.as_ref();
        let page = rustix::param::page_size() as u64;
        let page_offset = (phys % page) as usize;
        let map_len = size + page_offset;

        let fd = rustix::fs::open(
            path,
            OFlags::RDWR | OFlags::SYNC | OFlags::CLOEXEC,
            Mode::empty(),
        )?;

        // SAFETY: mmap necessary for MMIO - maps the register window into our
        // address space. Invariants: (1) fd open read/write; (2) offset is
        // page aligned; (3) the mapping is private to this value and released
        // in Drop; (4) ptr valid for map_len bytes or Err.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                phys - page_offset as u64,
            )?
        };

        let map_base = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| std::io::Error::other("mmap returned null"))?;
        // SAFETY: page_offset < page size <= map_len, so the result stays
        // inside the mapping.
        let base = unsafe { NonNull::new_unchecked(map_base.as_ptr().add(page_offset)) };

        tracing::info!(
            path = %path.display(),
            phys = format_args!("{phys:#x}"),
            size = format_args!("{size:#x}"),
            "Mapped register window at {:p}",
            base
        );

        Ok(Self {
            base,
            size,
            origin: Origin::Mapped { map_base, map_len },
        })
    }

    /// Window size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    fn check(&self, offset: usize) {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        assert!(offset % 4 == 0, "Register offset {offset:#x} not 4-byte aligned");
    }
}

impl RegisterIo for MappedRegion {
    /// # Panics
    ///
    /// Panics if `offset` is misaligned or `offset + 4` exceeds the window.
    fn read32(&self, offset: usize) -> u32 {
        self.check(offset);
        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) base valid for self.size; (2) offset+4 <= size;
        // (3) u32 aligned. Checked above.
        unsafe { std::ptr::read_volatile(self.base.as_ptr().add(offset).cast::<u32>()) }
    }

    /// # Panics
    ///
    /// Panics if `offset` is misaligned or `offset + 4` exceeds the window.
    fn write32(&self, offset: usize, value: u32) {
        self.check(offset);
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: (1) base valid for self.size; (2) offset+4 <= size;
        // (3) u32 aligned. Checked above.
        unsafe {
            std::ptr::write_volatile(self.base.as_ptr().add(offset).cast::<u32>(), value);
        }
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("base", &self.base)
            .field("size", &format_args!("{:#x}", self.size))
            .finish_non_exhaustive()
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Origin::Mapped { map_base, map_len } = self.origin {
            // SAFETY: munmap necessary - releases the mapping made in
            // map_physical. Invariants: (1) map_base/map_len are exactly what
            // mmap returned; (2) Drop runs at most once; (3) no references
            // into the window outlive self.
            if let Err(e) = unsafe { munmap(map_base.as_ptr().cast(), map_len) } {
                tracing::warn!("munmap failed: {e}");
            }
            tracing::debug!("Unmapped register window");
        }
    }
}
