//! Memory backends for the control interface.
//!
//! The READ_FROM / WRITE_TO commands address memory by a 32-bit address
//! taken straight from the wire. [`MemoryMap`] confines them to an explicit
//! allow-list of regions owned by the map. [`RawMemory`] (feature
//! `raw-memory`) dereferences the addresses in this process, which is only
//! sound under the contract of its `unsafe` constructor.
//!
//! The application and the control interface may touch the same region
//! between ticks. Nothing here serializes those accesses beyond `&mut`;
//! values wider than one byte can be observed half-written by the peer if
//! the application updates them across several writes.

use crate::error::MemoryError;

/// Backing store for memory range commands.
pub trait MemoryAccess {
    /// Fill `dst` with the bytes starting at `address`.
    fn read(&self, address: u32, dst: &mut [u8]) -> Result<(), MemoryError>;

    /// Copy `src` to memory starting at `address`.
    fn write(&mut self, address: u32, src: &[u8]) -> Result<(), MemoryError>;
}

/// Region access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// A named, contiguous block of addressable memory.
#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    base: u32,
    bytes: Vec<u8>,
    access: Access,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// One past the last address, widened so a region may end at 2^32.
    fn end(&self) -> u64 {
        u64::from(self.base) + self.bytes.len() as u64
    }

    /// Offset of `address` if `[address, address + len)` lies inside.
    fn offset_of(&self, address: u32, len: usize) -> Option<usize> {
        let start = u64::from(address);
        let end = start + len as u64;
        if start >= u64::from(self.base) && end <= self.end() {
            Some((address - self.base) as usize)
        } else {
            None
        }
    }
}

/// Allow-list of memory regions reachable from the wire.
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `bytes` at `base`. Regions may not overlap.
    pub fn add_region(
        &mut self,
        name: impl Into<String>,
        base: u32,
        bytes: impl Into<Vec<u8>>,
        access: Access,
    ) -> Result<&mut Region, MemoryError> {
        let region = Region {
            name: name.into(),
            base,
            bytes: bytes.into(),
            access,
        };

        if region.end() > u64::from(u32::MAX) + 1 {
            return Err(MemoryError::OutOfRange {
                address: base,
                len: region.len(),
            });
        }
        let overlaps = self.regions.iter().any(|existing| {
            u64::from(region.base) < existing.end() && u64::from(existing.base) < region.end()
        });
        if overlaps {
            return Err(MemoryError::Overlap { name: region.name });
        }

        self.regions.push(region);
        let index = self.regions.len() - 1;
        Ok(&mut self.regions[index])
    }

    /// Remove a region by name, returning it.
    pub fn remove_region(&mut self, name: &str) -> Option<Region> {
        let index = self.regions.iter().position(|r| r.name == name)?;
        Some(self.regions.remove(index))
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn region_mut(&mut self, name: &str) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.name == name)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    fn locate(&self, address: u32, len: usize) -> Result<(usize, usize), MemoryError> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.offset_of(address, len).map(|offset| (i, offset)))
            .ok_or(MemoryError::OutOfRange { address, len })
    }
}

impl MemoryAccess for MemoryMap {
    fn read(&self, address: u32, dst: &mut [u8]) -> Result<(), MemoryError> {
        if dst.is_empty() {
            return Ok(());
        }
        let (index, offset) = self.locate(address, dst.len())?;
        dst.copy_from_slice(&self.regions[index].bytes[offset..offset + dst.len()]);
        Ok(())
    }

    fn write(&mut self, address: u32, src: &[u8]) -> Result<(), MemoryError> {
        if src.is_empty() {
            return Ok(());
        }
        let (index, offset) = self.locate(address, src.len())?;
        let region = &mut self.regions[index];
        if region.access == Access::ReadOnly {
            return Err(MemoryError::ReadOnly {
                address: region.base,
            });
        }
        region.bytes[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}

/// Direct access to this process's address space.
///
/// Wire addresses are added to a fixed offset and dereferenced as-is.
#[cfg(feature = "raw-memory")]
#[derive(Debug)]
pub struct RawMemory {
    offset: usize,
}

#[cfg(feature = "raw-memory")]
impl RawMemory {
    /// Dereference wire addresses unchanged.
    ///
    /// # Safety
    ///
    /// Every range a peer can request must be valid for reads (READ_FROM)
    /// and writes (WRITE_TO) for as long as this value is in use, and must
    /// not be concurrently accessed through a Rust reference.
    pub unsafe fn new() -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::with_offset(0) }
    }

    /// Dereference `offset + address`.
    ///
    /// # Safety
    ///
    /// Same contract as [`RawMemory::new`], applied to the translated
    /// addresses.
    pub unsafe fn with_offset(offset: usize) -> Self {
        Self { offset }
    }

    fn translate(&self, address: u32, len: usize) -> Result<usize, MemoryError> {
        let start = self
            .offset
            .checked_add(address as usize)
            .ok_or(MemoryError::OutOfRange { address, len })?;
        start
            .checked_add(len)
            .ok_or(MemoryError::OutOfRange { address, len })?;
        Ok(start)
    }
}

#[cfg(feature = "raw-memory")]
impl MemoryAccess for RawMemory {
    fn read(&self, address: u32, dst: &mut [u8]) -> Result<(), MemoryError> {
        let start = self.translate(address, dst.len())?;
        // SAFETY: the constructor contract guarantees the translated range is
        // readable, and `dst` is a distinct exclusive borrow.
        unsafe {
            std::ptr::copy_nonoverlapping(start as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn write(&mut self, address: u32, src: &[u8]) -> Result<(), MemoryError> {
        let start = self.translate(address, src.len())?;
        // SAFETY: the constructor contract guarantees the translated range is
        // writable and not aliased by a live reference.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), start as *mut u8, src.len());
        }
        Ok(())
    }
}
