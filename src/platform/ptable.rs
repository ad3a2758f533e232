/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Fixed eMMC partition table of the lcb board.

use {
    crate::io::{BlockSpec, Partition},
    core::cmp::min,
};

/// Significant characters of a partition name.
pub const NAME_LEN: usize = 16;

/// Entry lives in the boot partition rather than the user area.
pub const FLAG_BOOT_PARTITION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtEntry {
    pub name: &'static str,
    pub start: u32,
    pub length: u32,
    pub flags: u32,
    /// Where the partition contents get loaded, 0 if they are not.
    pub loadaddr: u32,
}

const fn entry(name: &'static str, start: u32, length: u32, flags: u32, loadaddr: u32) -> PtEntry {
    PtEntry {
        name,
        start,
        length,
        flags,
        loadaddr,
    }
}

#[rustfmt::skip]
pub static PTABLE: [PtEntry; 12] = [
    entry("fastboot1",       0x0000_0000, 0x0004_0000, 1, 0x0000_0000),
    entry("ptable",          0x0000_0000, 0x0008_0000, 0, 0x0000_0000),
    entry("mcuimage",        0x0010_0000, 0x0004_0000, 0, 0xf600_0100),
    entry("fastboot",        0x0020_0000, 0x0040_0000, 0, 0x0000_0000),
    entry("securetystorage", 0x0680_0000, 0x0200_0000, 0, 0x0000_0000),
    entry("teeos",           0x15e0_0000, 0x0040_0000, 0, 0xfff8_0000),
    entry("sensorhub",       0x1640_0000, 0x0100_0000, 0, 0x0000_0000),
    entry("boot",            0x1800_0000, 0x0180_0000, 0, 0x0000_0000),
    entry("recovery",        0x1980_0000, 0x0200_0000, 0, 0x0000_0000),
    entry("dtimage",         0x1b80_0000, 0x0200_0000, 0, 0x0000_0000),
    entry("system",          0x3780_0000, 0x7000_0000, 0, 0x0000_0000),
    entry("userdata",        0xd780_0000, 0xe880_0000, 0, 0x0000_0000),
];

fn significant(name: &str) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..min(bytes.len(), NAME_LEN)]
}

/// Look a partition up by name. Only the first [`NAME_LEN`] characters count.
pub fn find(name: &str) -> Option<&'static PtEntry> {
    PTABLE
        .iter()
        .find(|entry| significant(entry.name) == significant(name))
}

impl PtEntry {
    pub fn partition(&self) -> Partition {
        if self.flags & FLAG_BOOT_PARTITION != 0 {
            Partition::Boot1
        } else {
            Partition::User
        }
    }

    pub fn block_spec(&self) -> BlockSpec {
        BlockSpec::on_partition(self.start as usize, self.length as usize, self.partition())
    }
}
