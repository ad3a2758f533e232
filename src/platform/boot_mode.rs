/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Boot mode chosen by the boot ROM.

use {
    super::ONCHIPROM_PARAM_BASE,
    crate::mmio_deref_wrapper::MMIODerefWrapper,
    snafu::Snafu,
    tock_registers::{interfaces::Readable, register_structs, registers::ReadOnly},
};

register_structs! {
    #[allow(non_snake_case)]
    RegisterBlock {
        (0x00 => BOOT_MODE: ReadOnly<u32>),
        (0x04 => @END),
    }
}

type Registers = MMIODerefWrapper<RegisterBlock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BootMode {
    Normal = 0,
    UsbDownload = 1,
    UartDownload = 2,
}

#[derive(Snafu, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootModeError {
    #[snafu(display("Invalid boot mode {}", value))]
    Invalid { value: u32 },
}

/// Parameter block the boot ROM leaves in on-chip RAM.
pub struct BootRomParams {
    registers: Registers,
}

impl TryFrom<u32> for BootMode {
    type Error = BootModeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BootMode::Normal),
            1 => Ok(BootMode::UsbDownload),
            2 => Ok(BootMode::UartDownload),
            value => Err(BootModeError::Invalid { value }),
        }
    }
}

impl BootRomParams {
    /// # Safety
    ///
    /// `base_addr` must point at the boot-ROM parameter block.
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            registers: Registers::new(base_addr),
        }
    }

    pub fn boot_mode(&self) -> Result<BootMode, BootModeError> {
        let raw = self.registers.BOOT_MODE.get();
        BootMode::try_from(raw).map_err(|e| {
            notice!("Invalid boot mode is found: {}", raw);
            e
        })
    }
}

/// Boot mode of this board.
pub fn query_boot_mode() -> Result<BootMode, BootModeError> {
    let params = unsafe { BootRomParams::new(ONCHIPROM_PARAM_BASE) };
    params.boot_mode()
}
