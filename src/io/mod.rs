/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Boot media I/O layer.
//!
//! Every device exposes the same small file interface: `open` a spec, `seek`, `read`,
//! `write`, `close`. Each driver holds at most one open file at a time and nothing here
//! allocates.

use {self::registry::DeviceHandle, bitflags::bitflags, core::result::Result as CoreResult, snafu::Snafu};

pub mod fip;
pub mod memmap;
pub mod mmc;
pub mod policy;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use mmc::{MmcError, Partition};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Errors reported by the I/O layer.
///
/// Precondition violations (unknown handles, I/O on a device with no open file) are not
/// errors: callers are boot code from the same build, those panic.
#[derive(Snafu, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    #[snafu(display("I/O failure"))]
    Fail,
    #[snafu(display("A file is already open on this device, close it first"))]
    ResourcesExhausted,
    #[snafu(display("Not found"))]
    NotFound,
    #[snafu(display("Operation not supported by this device"))]
    NotSupported,
    #[snafu(display("Access past the end of the open extent"))]
    OutOfBounds,
    #[snafu(display("Malformed firmware image package"))]
    InvalidContainer,
    #[snafu(display("Device is already registered"))]
    AlreadyRegistered,
    #[snafu(display("Device table is full"))]
    TableFull,
    #[snafu(display("Medium failure: {}", source))]
    Medium { source: MmcError },
}

pub type Result<T> = CoreResult<T, IoError>;

/// Driver kinds known to the registry. One device of each kind may be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Memmap,
    Mmc,
    Fip,
}

bitflags! {
    /// File operations a driver implements beyond open/close.
    pub struct DeviceCaps: u8 {
        const SEEK = 0b0001;
        const SIZE = 0b0010;
        const READ = 0b0100;
        const WRITE = 0b1000;
    }
}

/// Seek origin. Only [`SeekMode::Set`] is implemented by the drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Set,
    Current,
    End,
}

/// Extent of a raw medium to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    /// Start of the extent, in the medium's address space.
    pub offset: usize,
    /// Length of the extent in bytes.
    pub length: usize,
    /// eMMC hardware partition. `None` uses the partition picked at `dev_init` time.
    pub partition: Option<Partition>,
}

/// What to open on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spec {
    /// A byte extent on a memory-mapped or block device.
    Block(BlockSpec),
    /// A named image inside a firmware image package.
    File(&'static str),
}

/// Parameters for `dev_init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitParams {
    None,
    /// eMMC partition that later opens default to.
    Partition(Partition),
    /// Policy name of the image holding a firmware image package.
    Container(&'static str),
}

/// An open file on a registered device.
///
/// Returned by `open` and given back to `close`; it cannot be copied, so only its
/// holder can do I/O on the file.
#[derive(Debug, PartialEq, Eq)]
pub struct Entity {
    device: DeviceHandle,
}

/// Position of an open file within its extent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    /// Start of the extent in the device's address space.
    pub base: usize,
    /// Length of the extent.
    pub length: usize,
    /// Offset from `base` of the next transfer.
    pub cursor: usize,
}

/// The single file slot of a driver.
#[derive(Debug)]
pub struct FileSlot<S> {
    file: Option<S>,
}

/// Driver interfaces.
pub mod interface {
    use super::{BlockSpec, DeviceCaps, DeviceType, FileState, InitParams, Result, SeekMode};

    /// Operations of a driver over a raw medium.
    ///
    /// A driver keeps one open file. `seek`, `size`, `read` and `write` act on it and
    /// panic when nothing is open.
    pub trait BlockDevice {
        fn device_type(&self) -> DeviceType;

        fn capabilities(&self) -> DeviceCaps;

        /// Bring up the medium. Calling it again must not redo the bring-up.
        fn dev_init(&mut self, _params: InitParams) -> Result<()> {
            Ok(())
        }

        fn dev_close(&mut self) -> Result<()> {
            Ok(())
        }

        fn open(&mut self, spec: &BlockSpec) -> Result<()>;

        fn seek(&mut self, mode: SeekMode, offset: isize) -> Result<()>;

        fn size(&mut self) -> Result<usize> {
            Err(super::IoError::NotSupported)
        }

        fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

        fn write(&mut self, buffer: &[u8]) -> Result<usize>;

        fn close(&mut self) -> Result<()>;

        /// Position of the open file, `None` if the slot is free.
        fn current_file(&self) -> Option<&FileState>;
    }
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl From<MmcError> for IoError {
    fn from(source: MmcError) -> Self {
        IoError::Medium { source }
    }
}

impl BlockSpec {
    pub const fn new(offset: usize, length: usize) -> Self {
        Self {
            offset,
            length,
            partition: None,
        }
    }

    pub const fn on_partition(offset: usize, length: usize, partition: Partition) -> Self {
        Self {
            offset,
            length,
            partition: Some(partition),
        }
    }

    /// One past the last address of the extent.
    pub fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }
}

impl Entity {
    pub(crate) fn new(device: DeviceHandle) -> Self {
        Self { device }
    }

    /// Device the file is open on.
    pub fn device(&self) -> DeviceHandle {
        self.device
    }
}

impl FileState {
    /// A file at the start of `length` bytes beginning at `base`.
    pub const fn new(base: usize, length: usize) -> Self {
        Self {
            base,
            length,
            cursor: 0,
        }
    }

    /// Bytes between the cursor and the end of the extent.
    pub fn remaining(&self) -> usize {
        self.length - self.cursor
    }

    /// Move the cursor. Offsets from `0` up to and including `length` are valid.
    pub fn seek(&mut self, mode: SeekMode, offset: isize) -> Result<()> {
        if mode != SeekMode::Set {
            return Err(IoError::Fail);
        }
        let offset = usize::try_from(offset).map_err(|_| IoError::OutOfBounds)?;
        if offset > self.length {
            return Err(IoError::OutOfBounds);
        }
        self.cursor = offset;
        Ok(())
    }

    /// Device address of a `length`-byte transfer at the cursor.
    ///
    /// Fails if the transfer would run past the end of the extent.
    pub fn transfer_address(&self, length: usize) -> Result<usize> {
        if length > self.remaining() {
            return Err(IoError::OutOfBounds);
        }
        self.base.checked_add(self.cursor).ok_or(IoError::OutOfBounds)
    }

    /// Account for a completed transfer. Only call after `transfer_address` accepted it.
    pub fn advance(&mut self, length: usize) {
        debug_assert!(length <= self.remaining());
        self.cursor += length;
    }
}

impl<S> FileSlot<S> {
    pub const fn new() -> Self {
        Self { file: None }
    }

    pub fn is_in_use(&self) -> bool {
        self.file.is_some()
    }

    /// Take the slot for a new file. Leaves an already open file untouched.
    pub fn install(&mut self, file: S) -> Result<()> {
        if self.file.is_some() {
            return Err(IoError::ResourcesExhausted);
        }
        self.file = Some(file);
        Ok(())
    }

    pub fn get(&self) -> Option<&S> {
        self.file.as_ref()
    }

    /// The open file.
    ///
    /// # Panics
    ///
    /// If no file is open.
    pub fn current(&mut self) -> &mut S {
        match self.file.as_mut() {
            Some(file) => file,
            None => panic!("I/O on a device with no open file"),
        }
    }

    /// Free the slot, dropping all state of the previous file.
    pub fn release(&mut self) {
        assert!(self.file.is_some(), "close on a device with no open file");
        self.file = None;
    }
}

impl<S> Default for FileSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}
