/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! HiKey960 board layout.

use crate::io::{BlockSpec, Partition};

pub const SRAM_BASE: usize = 0xFFF8_0000;
pub const SRAM_SIZE: usize = 0x0001_2000;

pub const ONCHIPROM_PARAM_BASE: usize = SRAM_BASE + 0x700;

pub const BL1_RO_BASE: usize = SRAM_BASE;
pub const BL1_RO_LIMIT: usize = SRAM_BASE + SRAM_SIZE;

pub const DDR_BASE: usize = 0x0000_0000;
pub const DDR_SIZE: usize = 0xC000_0000;

const UFS_BASE: usize = 0;

pub const MMC_BL1: BlockSpec = BlockSpec::on_partition(0, SRAM_SIZE, Partition::Boot1);

pub const MMC_FIP: BlockSpec =
    BlockSpec::on_partition(UFS_BASE + 0x140_0000, 12 << 20, Partition::User);
