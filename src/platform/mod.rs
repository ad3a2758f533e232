/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Board support: memory layout, boot-ROM parameters and storage setup.
//!
//! The board is picked with a cargo feature, `lcb` by default.

cfg_if::cfg_if! {
    if #[cfg(feature = "hikey960")] {
        mod hikey960;
        pub use hikey960::*;
    } else {
        mod lcb;
        pub mod ptable;
        pub use lcb::*;
    }
}

pub mod boot_mode;
mod storage;

pub use storage::{
    bl1_ro_region, flush_image, io_setup, FlashError, BL1_IMAGE_NAME, BL1_MEM_NAME,
    BL2_IMAGE_NAME, POLICIES,
};

/// Size of the BL1 code and read-only data.
pub const BL1_RO_SIZE: usize = BL1_RO_LIMIT - BL1_RO_BASE;
