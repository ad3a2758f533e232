/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Host-side test doubles.

use super::{
    fip::{uuid_for, TocEntry, TocHeader, TOC_ENTRY_SIZE, TOC_HEADER_NAME, TOC_HEADER_SIZE},
    mmc::{MmcError, MmcHost, Partition, BLOCK_SIZE},
};

/// An eMMC card held in RAM. Every block starts out erased (`0xff`).
pub struct RamCard {
    pub user: Vec<u8>,
    pub boot: Vec<u8>,
    pub boot2: Vec<u8>,
    pub init_calls: usize,
    /// Block transfers issued, reads and writes.
    pub transfers: usize,
    /// Fails the next block transfer with this error.
    pub fail_next: Option<MmcError>,
}

impl RamCard {
    pub fn new(boot_blocks: usize, user_blocks: usize) -> Self {
        Self {
            user: vec![0xff; user_blocks * BLOCK_SIZE],
            boot: vec![0xff; boot_blocks * BLOCK_SIZE],
            boot2: vec![0xff; boot_blocks * BLOCK_SIZE],
            init_calls: 0,
            transfers: 0,
            fail_next: None,
        }
    }

    fn blocks(
        &mut self,
        partition: Partition,
        lba: u64,
        length: usize,
    ) -> Result<&mut [u8], MmcError> {
        assert_eq!(length % BLOCK_SIZE, 0, "partial block transfer");
        self.transfers += 1;
        if let Some(e) = self.fail_next.take() {
            return Err(e);
        }
        let media = match partition {
            Partition::User => &mut self.user,
            Partition::Boot1 => &mut self.boot,
            Partition::Boot2 => &mut self.boot2,
        };
        let start = lba as usize * BLOCK_SIZE;
        media
            .get_mut(start..start + length)
            .ok_or(MmcError::AddressRange { lba })
    }
}

impl MmcHost for RamCard {
    fn init(&mut self) -> Result<(), MmcError> {
        self.init_calls += 1;
        Ok(())
    }

    fn read_blocks(
        &mut self,
        partition: Partition,
        lba: u64,
        buffer: &mut [u8],
    ) -> Result<(), MmcError> {
        let blocks = self.blocks(partition, lba, buffer.len())?;
        buffer.copy_from_slice(blocks);
        Ok(())
    }

    fn write_blocks(
        &mut self,
        partition: Partition,
        lba: u64,
        buffer: &[u8],
    ) -> Result<(), MmcError> {
        let blocks = self.blocks(partition, lba, buffer.len())?;
        blocks.copy_from_slice(buffer);
        Ok(())
    }
}

/// Recognisable, non-repeating-per-block bytes.
pub fn pattern<const N: usize>(seed: u8) -> [u8; N] {
    let mut data = [0u8; N];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8;
    }
    data
}

/// A valid header followed by `entries` and the terminating entry.
pub fn build_toc(entries: &[TocEntry]) -> Vec<u8> {
    let mut toc = Vec::new();
    toc.extend_from_slice(
        &TocHeader {
            name: TOC_HEADER_NAME,
            serial_number: 0x1234_5678,
            flags: 0,
        }
        .to_bytes(),
    );
    for entry in entries {
        toc.extend_from_slice(&entry.to_bytes());
    }
    toc.extend_from_slice(&TocEntry::EMPTY.to_bytes());
    toc
}

/// Pack images into a firmware image package, payloads right after the ToC.
pub fn build_fip(images: &[(&str, &[u8])]) -> Vec<u8> {
    let mut offset = TOC_HEADER_SIZE + (images.len() + 1) * TOC_ENTRY_SIZE;
    let entries: Vec<TocEntry> = images
        .iter()
        .map(|(name, payload)| {
            let entry = TocEntry {
                uuid: uuid_for(name).expect("image name without a UUID"),
                offset: offset as u64,
                size: payload.len() as u64,
                flags: 0,
            };
            offset += payload.len();
            entry
        })
        .collect();
    let mut package = build_toc(&entries);
    for (_, payload) in images {
        package.extend_from_slice(payload);
    }
    package
}
