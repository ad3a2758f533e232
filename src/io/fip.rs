/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Firmware Image Package reader.
//!
//! A FIP is a table of contents followed by the images it lists. The table starts with
//! a 16-byte header and is a run of 40-byte entries ending with an entry whose UUID is
//! all zeroes. Entry offsets are relative to the start of the package. All fields are
//! little-endian.
//!
//! ```text
//! header: name (u32) = 0xAA64_0001 | serial_number (u32) != 0 | flags (u64)
//! entry:  uuid ([u8; 16]) | offset (u64) | size (u64) | flags (u64)
//! ```
//!
//! The package lives on another registered device. `dev_init` reads the table of
//! contents once and keeps it; every read afterwards opens the backing file, seeks to
//! the image data and closes it again.

use {
    super::{
        registry::{DeviceHandle, IoContext},
        DeviceCaps, DeviceType, FileSlot, FileState, IoError, Result, SeekMode, Spec,
    },
    core::fmt,
    static_assertions::assert_eq_size,
    usize_conversions::{FromUsize, IntoUsize},
};

/// `name` field of a valid ToC header.
pub const TOC_HEADER_NAME: u32 = 0xAA64_0001;

/// Images a package may list.
pub const MAX_FIP_ENTRIES: usize = 16;

pub const TOC_HEADER_SIZE: usize = 16;
pub const TOC_ENTRY_SIZE: usize = 40;

/// RFC 4122 UUID in the byte order the package stores it.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Uuid(pub [u8; 16]);

/// Maps a logical image name to the UUID it is stored under.
#[derive(Debug, Clone, Copy)]
pub struct ImageName {
    pub name: &'static str,
    pub uuid: Uuid,
}

/// Firmware image names known to the boot loader.
pub static IMAGE_NAMES: [ImageName; 5] = [
    ImageName {
        name: "bl2.bin",
        uuid: Uuid::from_fields(0x0bec_f95f, 0x224d, 0x4d3e, 0xa5, 0x44, [0xc3, 0x9d, 0x81, 0xc7, 0x3f, 0x0a]),
    },
    ImageName {
        name: "bl30.bin",
        uuid: Uuid::from_fields(0x3dfd_6697, 0xbe89, 0x49e8, 0xae, 0x5d, [0x78, 0xa1, 0x40, 0x60, 0x82, 0x13]),
    },
    ImageName {
        name: "bl31.bin",
        uuid: Uuid::from_fields(0x6d08_d447, 0xfe4c, 0x4698, 0x9b, 0x95, [0x29, 0x50, 0xcb, 0xbd, 0x5a, 0x00]),
    },
    ImageName {
        name: "bl32.bin",
        uuid: Uuid::from_fields(0x89e1_d005, 0xdc53, 0x4713, 0x8d, 0x2b, [0x50, 0x0a, 0x4b, 0x7a, 0x3e, 0x38]),
    },
    ImageName {
        name: "bl33.bin",
        uuid: Uuid::from_fields(0xa7ee_d0d6, 0xeafc, 0x4bd5, 0x97, 0x82, [0x99, 0x34, 0xf2, 0x34, 0xb6, 0xe4]),
    },
];

/// Table of contents header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TocHeader {
    pub name: u32,
    pub serial_number: u32,
    pub flags: u64,
}

/// Table of contents entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TocEntry {
    pub uuid: Uuid,
    /// Start of the image, from the start of the package.
    pub offset: u64,
    pub size: u64,
    pub flags: u64,
}

assert_eq_size!(TocHeader, [u8; TOC_HEADER_SIZE]);
assert_eq_size!(TocEntry, [u8; TOC_ENTRY_SIZE]);

/// Where the package is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    pub device: DeviceHandle,
    pub spec: Spec,
}

/// Parsed table of contents.
#[derive(Debug, Clone, Copy)]
pub struct Directory {
    entries: [TocEntry; MAX_FIP_ENTRIES],
    len: usize,
}

pub struct FipDevice {
    backend: Option<Backend>,
    directory: Directory,
    slot: FileSlot<FileState>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Uuid {
    pub const NULL: Uuid = Uuid([0; 16]);

    /// Build from the usual textual fields; the first three are stored little-endian.
    pub const fn from_fields(
        time_low: u32,
        time_mid: u16,
        time_hi_and_version: u16,
        clock_seq_hi_and_reserved: u8,
        clock_seq_low: u8,
        node: [u8; 6],
    ) -> Self {
        let low = time_low.to_le_bytes();
        let mid = time_mid.to_le_bytes();
        let hi = time_hi_and_version.to_le_bytes();
        Uuid([
            low[0],
            low[1],
            low[2],
            low[3],
            mid[0],
            mid[1],
            hi[0],
            hi[1],
            clock_seq_hi_and_reserved,
            clock_seq_low,
            node[0],
            node[1],
            node[2],
            node[3],
            node[4],
            node[5],
        ])
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9]
        )?;
        for byte in &b[10..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// UUID an image name is stored under. Names must match exactly.
pub fn uuid_for(name: &str) -> Option<Uuid> {
    IMAGE_NAMES
        .iter()
        .find(|image| image.name == name)
        .map(|image| image.uuid)
}

fn u32_at(raw: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn u64_at(raw: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&raw[at..at + 8]);
    u64::from_le_bytes(bytes)
}

impl TocHeader {
    pub fn parse(raw: &[u8; TOC_HEADER_SIZE]) -> Self {
        Self {
            name: u32_at(raw, 0),
            serial_number: u32_at(raw, 4),
            flags: u64_at(raw, 8),
        }
    }

    pub fn to_bytes(&self) -> [u8; TOC_HEADER_SIZE] {
        let mut raw = [0u8; TOC_HEADER_SIZE];
        raw[0..4].copy_from_slice(&self.name.to_le_bytes());
        raw[4..8].copy_from_slice(&self.serial_number.to_le_bytes());
        raw[8..16].copy_from_slice(&self.flags.to_le_bytes());
        raw
    }

    pub fn is_valid(&self) -> bool {
        self.name == TOC_HEADER_NAME && self.serial_number != 0
    }
}

impl TocEntry {
    pub const EMPTY: TocEntry = TocEntry {
        uuid: Uuid::NULL,
        offset: 0,
        size: 0,
        flags: 0,
    };

    pub fn parse(raw: &[u8; TOC_ENTRY_SIZE]) -> Self {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&raw[0..16]);
        Self {
            uuid: Uuid(uuid),
            offset: u64_at(raw, 16),
            size: u64_at(raw, 24),
            flags: u64_at(raw, 32),
        }
    }

    pub fn to_bytes(&self) -> [u8; TOC_ENTRY_SIZE] {
        let mut raw = [0u8; TOC_ENTRY_SIZE];
        raw[0..16].copy_from_slice(&self.uuid.0);
        raw[16..24].copy_from_slice(&self.offset.to_le_bytes());
        raw[24..32].copy_from_slice(&self.size.to_le_bytes());
        raw[32..40].copy_from_slice(&self.flags.to_le_bytes());
        raw
    }

    /// One past the last byte of the image, from the start of the package.
    fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

impl Directory {
    pub const fn new() -> Self {
        Self {
            entries: [TocEntry::EMPTY; MAX_FIP_ENTRIES],
            len: 0,
        }
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries[..self.len]
    }

    pub fn find(&self, uuid: &Uuid) -> Option<&TocEntry> {
        self.entries().iter().find(|entry| entry.uuid == *uuid)
    }

    fn push(&mut self, entry: TocEntry) -> Result<()> {
        if self.find(&entry.uuid).is_some() {
            warn!("fip: image {:?} is listed twice", entry.uuid);
            return Err(IoError::InvalidContainer);
        }
        if self.len == MAX_FIP_ENTRIES {
            warn!("fip: more than {} images in the package", MAX_FIP_ENTRIES);
            return Err(IoError::InvalidContainer);
        }
        self.entries[self.len] = entry;
        self.len += 1;
        Ok(())
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

/// A ToC that runs off the end of the backing extent is a broken package.
fn read_toc(io: &mut IoContext<'_>, entity: &super::Entity, buffer: &mut [u8]) -> Result<()> {
    match io.read(entity, buffer) {
        Ok(count) if count == buffer.len() => Ok(()),
        Ok(_) | Err(IoError::OutOfBounds) => Err(IoError::InvalidContainer),
        Err(e) => Err(e),
    }
}

impl FipDevice {
    pub const fn new() -> Self {
        Self {
            backend: None,
            directory: Directory::new(),
            slot: FileSlot::new(),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::Fip
    }

    pub fn capabilities(&self) -> DeviceCaps {
        DeviceCaps::SEEK | DeviceCaps::SIZE | DeviceCaps::READ
    }

    pub fn is_initialised(&self) -> bool {
        self.backend.is_some()
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Read and validate the table of contents from `backend`.
    ///
    /// Only the first successful call reads anything; the directory then stays cached.
    pub fn dev_init(&mut self, io: &mut IoContext<'_>, backend: Backend) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }
        let limit = match backend.spec {
            Spec::Block(block) => u64::from_usize(block.length),
            Spec::File(_) => u64::MAX,
        };

        let entity = io.open(backend.device, &backend.spec).map_err(|e| {
            warn!("fip: failed to open the package: {}", e);
            e
        })?;
        let directory = Self::read_directory(io, &entity, limit);
        io.close(entity)?;

        self.directory = directory?;
        self.backend = Some(backend);
        info!(
            "fip: header looks OK, {} images listed",
            self.directory.entries().len()
        );
        Ok(())
    }

    fn read_directory(
        io: &mut IoContext<'_>,
        entity: &super::Entity,
        limit: u64,
    ) -> Result<Directory> {
        let mut raw_header = [0u8; TOC_HEADER_SIZE];
        read_toc(io, entity, &mut raw_header)?;
        let header = TocHeader::parse(&raw_header);
        if !header.is_valid() {
            warn!("fip: header check failed ({:#010x})", header.name);
            return Err(IoError::InvalidContainer);
        }

        let mut directory = Directory::new();
        loop {
            let mut raw_entry = [0u8; TOC_ENTRY_SIZE];
            read_toc(io, entity, &mut raw_entry)?;
            let entry = TocEntry::parse(&raw_entry);
            if entry.uuid.is_null() {
                return Ok(directory);
            }
            if entry.end().map_or(true, |end| end > limit) {
                warn!("fip: image {:?} extends past the package", entry.uuid);
                return Err(IoError::InvalidContainer);
            }
            directory.push(entry)?;
        }
    }

    /// Open the image `spec` names.
    pub fn open(&mut self, spec: &Spec) -> Result<()> {
        if self.slot.is_in_use() {
            warn!("fip: only one open file at a time");
            return Err(IoError::ResourcesExhausted);
        }
        let Spec::File(name) = *spec else {
            return Err(IoError::NotSupported);
        };
        if self.backend.is_none() {
            warn!("fip: open before the package was read");
            return Err(IoError::Fail);
        }
        let entry = uuid_for(name)
            .and_then(|uuid| self.directory.find(&uuid))
            .copied()
            .ok_or_else(|| {
                info!("fip: no image {} in the package", name);
                IoError::NotFound
            })?;
        self.slot
            .install(FileState::new(entry.offset.into_usize(), entry.size.into_usize()))
    }

    pub fn seek(&mut self, mode: SeekMode, offset: isize) -> Result<()> {
        self.slot.current().seek(mode, offset)
    }

    pub fn size(&mut self) -> Result<usize> {
        Ok(self.slot.current().length)
    }

    /// Read from the open image, never past its end.
    pub fn read(&mut self, io: &mut IoContext<'_>, buffer: &mut [u8]) -> Result<usize> {
        let file = *self.slot.current();
        let address = file.transfer_address(buffer.len())?;
        let position = isize::try_from(address).map_err(|_| IoError::OutOfBounds)?;
        let backend = match self.backend {
            Some(backend) => backend,
            None => panic!("fip: file open without a package"),
        };

        let entity = io.open(backend.device, &backend.spec)?;
        let result = io
            .seek(&entity, SeekMode::Set, position)
            .and_then(|_| io.read(&entity, buffer));
        io.close(entity)?;

        let count = result?;
        if count != buffer.len() {
            return Err(IoError::Fail);
        }
        self.slot.current().advance(count);
        Ok(count)
    }

    pub fn close(&mut self) -> Result<()> {
        self.slot.release();
        Ok(())
    }

    pub fn current_file(&self) -> Option<&FileState> {
        self.slot.get()
    }
}

impl Default for FipDevice {
    fn default() -> Self {
        Self::new()
    }
}
