/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! eMMC block device driver.
//!
//! Files are byte extents on one hardware partition of the card. Transfers are mapped
//! onto whole 512-byte blocks of the host controller; unaligned heads and tails go
//! through a one-block bounce buffer.

use {
    super::{
        interface::BlockDevice, BlockSpec, DeviceCaps, DeviceType, FileSlot, FileState,
        InitParams, IoError, Result, SeekMode,
    },
    core::cmp::min,
    snafu::Snafu,
    usize_conversions::FromUsize,
};

/// Card block size. Hosts are always programmed for 512-byte blocks.
pub const BLOCK_SIZE: usize = 512;

/// eMMC hardware partition, as encoded in the PARTITION_ACCESS bits of EXT_CSD.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Partition {
    /// User data area.
    #[default]
    User = 0,
    /// First boot partition, where the boot ROM looks for BL1.
    Boot1 = 1,
    Boot2 = 2,
}

/// Failures of the host controller or the card.
#[derive(Snafu, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcError {
    #[snafu(display("Timed out waiting for the card"))]
    Timeout,
    #[snafu(display("Data CRC error"))]
    Crc,
    #[snafu(display("CMD{} failed, card status {:#010x}", index, status))]
    Command { index: u8, status: u32 },
    #[snafu(display("Card transferred {} of {} bytes", actual, expected))]
    ShortTransfer { expected: usize, actual: usize },
    #[snafu(display("Block address {} is past the end of the partition", lba))]
    AddressRange { lba: u64 },
    #[snafu(display("Invalid partition number {}", value))]
    InvalidPartition { value: u32 },
}

/// Raw block access provided by the eMMC host controller driver.
///
/// Buffers are always a whole number of [`BLOCK_SIZE`] blocks. Implementations report a
/// card that stops responding as [`MmcError::Timeout`] rather than waiting forever.
pub trait MmcHost {
    /// Controller and card bring-up, up to the transfer state.
    fn init(&mut self) -> core::result::Result<(), MmcError>;

    fn read_blocks(
        &mut self,
        partition: Partition,
        lba: u64,
        buffer: &mut [u8],
    ) -> core::result::Result<(), MmcError>;

    fn write_blocks(
        &mut self,
        partition: Partition,
        lba: u64,
        buffer: &[u8],
    ) -> core::result::Result<(), MmcError>;
}

/// Open file on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmcFile {
    pub file: FileState,
    pub partition: Partition,
}

pub struct MmcDevice<'a> {
    host: &'a mut dyn MmcHost,
    initialised: bool,
    default_partition: Partition,
    slot: FileSlot<MmcFile>,
}

impl TryFrom<u32> for Partition {
    type Error = MmcError;

    fn try_from(value: u32) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Partition::User),
            1 => Ok(Partition::Boot1),
            2 => Ok(Partition::Boot2),
            value => Err(MmcError::InvalidPartition { value }),
        }
    }
}

fn block_of(address: usize) -> u64 {
    u64::from_usize(address / BLOCK_SIZE)
}

impl<'a> MmcDevice<'a> {
    pub fn new(host: &'a mut dyn MmcHost) -> Self {
        Self {
            host,
            initialised: false,
            default_partition: Partition::User,
            slot: FileSlot::new(),
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Partition used by opens that do not name one.
    pub fn default_partition(&self) -> Partition {
        self.default_partition
    }

    /// Partition of the open file.
    pub fn current_partition(&self) -> Option<Partition> {
        self.slot.get().map(|f| f.partition)
    }

    fn read_bytes(
        &mut self,
        partition: Partition,
        mut address: usize,
        buffer: &mut [u8],
    ) -> core::result::Result<(), MmcError> {
        let mut done = 0;
        while done < buffer.len() {
            let skew = address % BLOCK_SIZE;
            let remaining = buffer.len() - done;
            let count = if skew == 0 && remaining >= BLOCK_SIZE {
                let count = remaining - remaining % BLOCK_SIZE;
                self.host
                    .read_blocks(partition, block_of(address), &mut buffer[done..done + count])?;
                count
            } else {
                let mut bounce = [0u8; BLOCK_SIZE];
                self.host
                    .read_blocks(partition, block_of(address), &mut bounce)?;
                let count = min(BLOCK_SIZE - skew, remaining);
                buffer[done..done + count].copy_from_slice(&bounce[skew..skew + count]);
                count
            };
            done += count;
            address += count;
        }
        Ok(())
    }

    fn write_bytes(
        &mut self,
        partition: Partition,
        mut address: usize,
        buffer: &[u8],
    ) -> core::result::Result<(), MmcError> {
        let mut done = 0;
        while done < buffer.len() {
            let skew = address % BLOCK_SIZE;
            let remaining = buffer.len() - done;
            let count = if skew == 0 && remaining >= BLOCK_SIZE {
                let count = remaining - remaining % BLOCK_SIZE;
                self.host
                    .write_blocks(partition, block_of(address), &buffer[done..done + count])?;
                count
            } else {
                // Partial block: merge with what is on the card.
                let mut bounce = [0u8; BLOCK_SIZE];
                let lba = block_of(address);
                self.host.read_blocks(partition, lba, &mut bounce)?;
                let count = min(BLOCK_SIZE - skew, remaining);
                bounce[skew..skew + count].copy_from_slice(&buffer[done..done + count]);
                self.host.write_blocks(partition, lba, &bounce)?;
                count
            };
            done += count;
            address += count;
        }
        Ok(())
    }
}

impl BlockDevice for MmcDevice<'_> {
    fn device_type(&self) -> DeviceType {
        DeviceType::Mmc
    }

    fn capabilities(&self) -> DeviceCaps {
        DeviceCaps::SEEK | DeviceCaps::READ | DeviceCaps::WRITE
    }

    fn dev_init(&mut self, params: InitParams) -> Result<()> {
        let partition = match params {
            InitParams::None => Partition::User,
            InitParams::Partition(partition) => partition,
            InitParams::Container(_) => return Err(IoError::NotSupported),
        };
        info!(
            "mmc: init (done before: {}), default partition {:?}",
            self.initialised, partition
        );
        if !self.initialised {
            self.host.init()?;
            self.initialised = true;
        }
        self.default_partition = partition;
        Ok(())
    }

    fn open(&mut self, spec: &BlockSpec) -> Result<()> {
        if self.slot.is_in_use() {
            warn!("mmc: a file is already open, close it first");
            return Err(IoError::ResourcesExhausted);
        }
        if spec.end().is_none() {
            return Err(IoError::OutOfBounds);
        }
        let file = MmcFile {
            file: FileState::new(spec.offset, spec.length),
            partition: spec.partition.unwrap_or(self.default_partition),
        };
        self.slot.install(file)
    }

    fn seek(&mut self, mode: SeekMode, offset: isize) -> Result<()> {
        self.slot.current().file.seek(mode, offset)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let MmcFile { file, partition } = *self.slot.current();
        let address = file.transfer_address(buffer.len())?;
        if let Err(e) = self.read_bytes(partition, address, buffer) {
            notice!("mmc: read of {:#x} bytes at {:#x} failed: {}", buffer.len(), address, e);
            return Err(e.into());
        }
        self.slot.current().file.advance(buffer.len());
        Ok(buffer.len())
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        let MmcFile { file, partition } = *self.slot.current();
        let address = file.transfer_address(buffer.len())?;
        if let Err(e) = self.write_bytes(partition, address, buffer) {
            notice!("mmc: write of {:#x} bytes at {:#x} failed: {}", buffer.len(), address, e);
            return Err(e.into());
        }
        self.slot.current().file.advance(buffer.len());
        Ok(buffer.len())
    }

    fn close(&mut self) -> Result<()> {
        self.slot.release();
        Ok(())
    }

    fn current_file(&self) -> Option<&FileState> {
        self.slot.get().map(|f| &f.file)
    }
}
