/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! Boot media I/O for the BL1 first-stage loader.
//!
//! Images are located by logical name through a load policy table and read through
//! one small file interface, whatever medium holds them: a memory-mapped region, the
//! eMMC (boot or user partition), or a Firmware Image Package stored on the eMMC.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::nonstandard_macro_braces)] // https://github.com/shepmaster/snafu/issues/296

#[macro_use]
pub mod macros;

pub mod console;
pub mod io;
pub mod loader;
pub mod mmio_deref_wrapper;
pub mod platform;
mod sync;

pub use io::{
    registry::{Connector, Device, DeviceHandle, IoContext},
    Entity, IoError, Result, SeekMode, Spec,
};
