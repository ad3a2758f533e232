/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Memory-mapped storage: on-chip RAM, ROM or a preloaded DDR window.

use super::{
    interface::BlockDevice, BlockSpec, DeviceCaps, DeviceType, FileSlot, FileState,
    InitParams, IoError, Result, SeekMode,
};

/// A window of the bus address space.
pub struct MemoryRegion<'a> {
    base: usize,
    bytes: &'a mut [u8],
}

pub struct Memmap<'a> {
    region: MemoryRegion<'a>,
    slot: FileSlot<FileState>,
}

impl<'a> MemoryRegion<'a> {
    /// `bytes` as seen at bus address `base`.
    pub fn new(base: usize, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset into the backing bytes of `length` bytes at bus address `address`.
    fn local(&self, address: usize, length: usize) -> Option<usize> {
        let start = address.checked_sub(self.base)?;
        let end = start.checked_add(length)?;
        (end <= self.bytes.len()).then_some(start)
    }
}

impl MemoryRegion<'static> {
    /// The region `[base, base + length)` of the physical address space.
    ///
    /// # Safety
    ///
    /// The range must be mapped, readable (and writable if written to) and not used
    /// through any other reference for the lifetime of the program.
    pub unsafe fn from_raw(base: usize, length: usize) -> Self {
        Self {
            base,
            bytes: core::slice::from_raw_parts_mut(base as *mut u8, length),
        }
    }
}

impl<'a> Memmap<'a> {
    pub fn new(region: MemoryRegion<'a>) -> Self {
        Self {
            region,
            slot: FileSlot::new(),
        }
    }

    pub fn region(&self) -> &MemoryRegion<'a> {
        &self.region
    }
}

impl BlockDevice for Memmap<'_> {
    fn device_type(&self) -> DeviceType {
        DeviceType::Memmap
    }

    fn capabilities(&self) -> DeviceCaps {
        DeviceCaps::SEEK | DeviceCaps::SIZE | DeviceCaps::READ | DeviceCaps::WRITE
    }

    fn dev_init(&mut self, params: InitParams) -> Result<()> {
        match params {
            InitParams::None => Ok(()),
            _ => Err(IoError::NotSupported),
        }
    }

    fn open(&mut self, spec: &BlockSpec) -> Result<()> {
        if self.slot.is_in_use() {
            warn!("memmap: a file is already open, close it first");
            return Err(IoError::ResourcesExhausted);
        }
        if self.region.local(spec.offset, spec.length).is_none() {
            warn!(
                "memmap: {:#x}+{:#x} is outside {:#x}+{:#x}",
                spec.offset,
                spec.length,
                self.region.base,
                self.region.len()
            );
            return Err(IoError::OutOfBounds);
        }
        self.slot.install(FileState::new(spec.offset, spec.length))
    }

    fn seek(&mut self, mode: SeekMode, offset: isize) -> Result<()> {
        self.slot.current().seek(mode, offset)
    }

    fn size(&mut self) -> Result<usize> {
        Ok(self.slot.current().length)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let address = self.slot.current().transfer_address(buffer.len())?;
        let start = self
            .region
            .local(address, buffer.len())
            .ok_or(IoError::OutOfBounds)?;
        buffer.copy_from_slice(&self.region.bytes[start..start + buffer.len()]);
        self.slot.current().advance(buffer.len());
        Ok(buffer.len())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        let address = self.slot.current().transfer_address(buffer.len())?;
        let start = self
            .region
            .local(address, buffer.len())
            .ok_or(IoError::OutOfBounds)?;
        self.region.bytes[start..start + buffer.len()].copy_from_slice(buffer);
        self.slot.current().advance(buffer.len());
        Ok(buffer.len())
    }

    fn close(&mut self) -> Result<()> {
        self.slot.release();
        Ok(())
    }

    fn current_file(&self) -> Option<&FileState> {
        self.slot.get()
    }
}
