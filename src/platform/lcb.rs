/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! lcb board layout.

use crate::io::{BlockSpec, Partition};

/// On-chip RAM the boot ROM loads BL1 into.
pub const XG2RAM0_BASE: usize = 0xF980_0000;

/// Parameter block left behind by the boot ROM.
pub const ONCHIPROM_PARAM_BASE: usize = XG2RAM0_BASE + 0x700;

pub const BL1_RO_BASE: usize = XG2RAM0_BASE + 0x1000;
pub const BL1_RO_LIMIT: usize = XG2RAM0_BASE + 0x1_0000;

pub const DDR_BASE: usize = 0x0000_0000;

/// BL1 in the first boot partition, the `fastboot1` entry of the partition table.
pub const MMC_BL1: BlockSpec = BlockSpec::on_partition(0, 0x4_0000, Partition::Boot1);

/// The FIP, stored in the `fastboot` partition of the user area.
pub const MMC_FIP: BlockSpec = BlockSpec::on_partition(0x20_0000, 0x40_0000, Partition::User);
