/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Boot storage of the board: registered devices, load policies and BL1 reflashing.

use {
    super::{BL1_RO_BASE, BL1_RO_SIZE, MMC_BL1, MMC_FIP},
    crate::io::{
        fip::FipDevice,
        memmap::{Memmap, MemoryRegion},
        mmc::{MmcDevice, MmcHost},
        policy::{open_fip, open_memmap, open_mmc, open_mmc_boot, Policy, FIP_IMAGE_NAME},
        registry::{Device, IoContext},
        BlockSpec, DeviceType, Entity, IoError, SeekMode, Spec,
    },
    snafu::Snafu,
};

/// The running BL1, as seen in on-chip RAM.
pub const BL1_MEM_NAME: &str = "bl1_mem";
/// The BL1 copy the boot ROM loads from eMMC.
pub const BL1_IMAGE_NAME: &str = "bl1.bin";
pub const BL2_IMAGE_NAME: &str = "bl2.bin";

/// Where every boot image of this board comes from.
pub static POLICIES: [Policy; 4] = [
    Policy {
        image: BL1_MEM_NAME,
        device: DeviceType::Memmap,
        spec: Spec::Block(BlockSpec::new(BL1_RO_BASE, BL1_RO_SIZE)),
        check: open_memmap,
    },
    Policy {
        image: BL1_IMAGE_NAME,
        device: DeviceType::Mmc,
        spec: Spec::Block(MMC_BL1),
        check: open_mmc_boot,
    },
    Policy {
        image: FIP_IMAGE_NAME,
        device: DeviceType::Mmc,
        spec: Spec::Block(MMC_FIP),
        check: open_mmc,
    },
    Policy {
        image: BL2_IMAGE_NAME,
        device: DeviceType::Fip,
        spec: Spec::File(BL2_IMAGE_NAME),
        check: open_fip,
    },
];

#[derive(Snafu, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    #[snafu(display("BL1 flush failed: {}", source))]
    Io { source: IoError },
    #[snafu(display(
        "BL1 read back from eMMC does not match: expected {:#018x}, got {:#018x}",
        expected,
        actual
    ))]
    Verify { expected: u64, actual: u64 },
    #[snafu(display(
        "Staging buffer of {:#x} bytes cannot hold BL1 ({:#x} bytes)",
        available,
        needed
    ))]
    StagingTooSmall { needed: usize, available: usize },
}

impl From<IoError> for FlashError {
    fn from(source: IoError) -> Self {
        FlashError::Io { source }
    }
}

/// The BL1 read-only range of on-chip RAM.
///
/// # Safety
///
/// Hands out the range as a mutable slice; nothing else may access it through
/// another reference while the region is in use.
pub unsafe fn bl1_ro_region() -> MemoryRegion<'static> {
    MemoryRegion::from_raw(BL1_RO_BASE, BL1_RO_SIZE)
}

/// Register the FIP, eMMC and memory devices and install the board's load policies.
pub fn io_setup<'a>(
    region: MemoryRegion<'a>,
    host: &'a mut dyn MmcHost,
) -> crate::io::Result<IoContext<'a>> {
    let mut io = IoContext::new(&POLICIES);

    let fip = io.register(Device::Fip(FipDevice::new()))?;
    let mmc = io.register(Device::Mmc(MmcDevice::new(host)))?;
    let memmap = io.register(Device::Memmap(Memmap::new(region)))?;

    for connector in [&fip, &mmc, &memmap] {
        let handle = io.open_connector(connector)?;
        info!(
            "io: {:?} device at handle {}",
            connector.device_type(),
            handle.index()
        );
    }
    Ok(io)
}

/// Copy the running BL1 into the eMMC boot partition and check the copy.
///
/// `staging` must hold the BL1 read-only range; it is overwritten.
pub fn flush_image(io: &mut IoContext<'_>, staging: &mut [u8]) -> Result<usize, FlashError> {
    let available = staging.len();
    let staging = staging
        .get_mut(..BL1_RO_SIZE)
        .ok_or(FlashError::StagingTooSmall {
            needed: BL1_RO_SIZE,
            available,
        })?;

    let (memory, spec) = io.resolve_image_source(BL1_MEM_NAME)?;
    let entity = io.open(memory, &spec)?;
    let result = io.read(&entity, staging);
    io.close(entity)?;
    io.dev_close(memory)?;
    result.map_err(|e| {
        warn!("Failed to load '{}' file ({})", BL1_MEM_NAME, e);
        e
    })?;
    let expected = seahash::hash(staging);

    let (mmc, spec) = io.resolve_image_source(BL1_IMAGE_NAME)?;
    let entity = io.open(mmc, &spec)?;
    let result = write_and_read_back(io, &entity, staging);
    io.close(entity)?;
    result.map_err(|e| {
        warn!("Failed to flush '{}' ({})", BL1_IMAGE_NAME, e);
        e
    })?;

    let actual = seahash::hash(staging);
    if actual != expected {
        warn!(
            "BL1 on eMMC is corrupt: hash {:#018x}, expected {:#018x}",
            actual, expected
        );
        return Err(FlashError::Verify { expected, actual });
    }
    info!("BL1 flushed to eMMC ({:#x} bytes)", staging.len());
    Ok(staging.len())
}

fn write_and_read_back(
    io: &mut IoContext<'_>,
    entity: &Entity,
    staging: &mut [u8],
) -> crate::io::Result<()> {
    io.write(entity, staging)?;
    io.seek(entity, SeekMode::Set, 0)?;
    io.read(entity, staging)?;
    Ok(())
}
