/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Load policies: where each boot image comes from.
//!
//! A policy entry names an image, the kind of device that holds it, what to open
//! there and a procedure that checks the image can actually be opened. Several entries
//! may name the same image; they are tried in table order, so later ones act as
//! fallbacks.

use super::{
    registry::{DeviceHandle, IoContext},
    DeviceType, InitParams, IoError, Partition, Result, Spec,
};

/// Name the FIP itself is listed under in policy tables.
pub const FIP_IMAGE_NAME: &str = "fip.bin";

/// Brings up the device and checks that `spec` opens on it.
pub type OpenProcedure = fn(&mut IoContext<'_>, DeviceHandle, &Spec) -> Result<()>;

#[derive(Clone, Copy)]
pub struct Policy {
    pub image: &'static str,
    pub device: DeviceType,
    pub spec: Spec,
    pub check: OpenProcedure,
}

impl core::fmt::Debug for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Policy")
            .field("image", &self.image)
            .field("device", &self.device)
            .field("spec", &self.spec)
            .finish()
    }
}

impl IoContext<'_> {
    /// Device and spec to load `name` from.
    ///
    /// Runs the open procedure of each entry for `name` until one succeeds. With no
    /// entry for `name` nothing is touched and the result is `NotFound`; when every
    /// entry fails the last failure is returned.
    pub fn resolve_image_source(&mut self, name: &str) -> Result<(DeviceHandle, Spec)> {
        let mut outcome = Err(IoError::NotFound);
        for policy in self.policies().iter().filter(|p| p.image == name) {
            let handle = match self.handle_of(policy.device) {
                Some(handle) => handle,
                None => {
                    notice!("io: no {:?} device for {}", policy.device, name);
                    outcome = Err(IoError::NotFound);
                    continue;
                }
            };
            match (policy.check)(self, handle, &policy.spec) {
                Ok(()) => return Ok((handle, policy.spec)),
                Err(e) => {
                    notice!("io: {} not available on {:?}: {}", name, policy.device, e);
                    outcome = Err(e);
                }
            }
        }
        if outcome == Err(IoError::NotFound) {
            warn!("io: no source for image {}", name);
        }
        outcome
    }
}

fn probe(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
    let entity = io.open(handle, spec)?;
    io.close(entity)
}

/// Open procedure for memory-mapped images.
pub fn open_memmap(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
    io.dev_init(handle, InitParams::None)?;
    probe(io, handle, spec)
}

/// Open procedure for images in the eMMC user area.
pub fn open_mmc(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
    io.dev_init(handle, InitParams::Partition(Partition::User))?;
    probe(io, handle, spec)
}

/// Open procedure for images in the first eMMC boot partition.
pub fn open_mmc_boot(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
    io.dev_init(handle, InitParams::Partition(Partition::Boot1))?;
    probe(io, handle, spec)
}

/// Open procedure for images inside the FIP.
pub fn open_fip(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
    io.dev_init(handle, InitParams::Container(FIP_IMAGE_NAME))?;
    probe(io, handle, spec)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::io::{
            fip::FipDevice,
            memmap::{Memmap, MemoryRegion},
            mmc::MmcDevice,
            registry::Device,
            testing::{build_fip, pattern, RamCard},
            BlockSpec,
        },
        core::sync::atomic::{AtomicUsize, Ordering},
    };

    const RAM: BlockSpec = BlockSpec::new(0x100, 0x40);

    static FIRST_CALLS: AtomicUsize = AtomicUsize::new(0);
    static SECOND_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counted_first(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
        FIRST_CALLS.fetch_add(1, Ordering::SeqCst);
        open_memmap(io, handle, spec)
    }

    fn counted_second(io: &mut IoContext<'_>, handle: DeviceHandle, spec: &Spec) -> Result<()> {
        SECOND_CALLS.fetch_add(1, Ordering::SeqCst);
        open_memmap(io, handle, spec)
    }

    fn refuse(_: &mut IoContext<'_>, _: DeviceHandle, _: &Spec) -> Result<()> {
        Err(IoError::Fail)
    }

    static COUNTED: [Policy; 3] = [
        Policy {
            image: "bl1.bin",
            device: DeviceType::Memmap,
            spec: Spec::Block(RAM),
            check: counted_first,
        },
        Policy {
            image: "bl1.bin",
            device: DeviceType::Memmap,
            spec: Spec::Block(BlockSpec::new(0x140, 0x40)),
            check: counted_second,
        },
        Policy {
            image: "bl2.bin",
            device: DeviceType::Mmc,
            spec: Spec::Block(BlockSpec::new(0, 0x200)),
            check: open_mmc,
        },
    ];

    #[test]
    fn first_working_entry_wins_and_runs_once() {
        let mut ram = [0u8; 0x100];
        let mut io = IoContext::new(&COUNTED);
        io.register(Device::Memmap(Memmap::new(MemoryRegion::new(0x100, &mut ram))))
            .unwrap();

        let (handle, spec) = io.resolve_image_source("bl1.bin").unwrap();
        assert_eq!(io.device_type(handle), DeviceType::Memmap);
        assert_eq!(spec, Spec::Block(RAM));
        assert_eq!(FIRST_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(SECOND_CALLS.load(Ordering::SeqCst), 0);
        // The probe leaves nothing open.
        assert_eq!(io.current_file(handle), None);
    }

    #[test]
    fn unknown_names_touch_no_device() {
        let mut card = RamCard::new(1, 4);
        {
            let mut io = IoContext::new(&COUNTED);
            io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();
            for name in ["bl31.bin", "bl1", "bl1.bin ", "", "BL2.BIN"] {
                assert_eq!(io.resolve_image_source(name), Err(IoError::NotFound));
            }
        }
        assert_eq!(card.init_calls, 0);
        assert_eq!(card.transfers, 0);
    }

    static FALLBACK: [Policy; 3] = [
        Policy {
            image: "bl1.bin",
            device: DeviceType::Memmap,
            spec: Spec::Block(RAM),
            check: refuse,
        },
        Policy {
            image: "bl1.bin",
            device: DeviceType::Mmc,
            spec: Spec::Block(BlockSpec::on_partition(0, 0x400, Partition::Boot1)),
            check: open_mmc_boot,
        },
        Policy {
            image: "bl2.bin",
            device: DeviceType::Memmap,
            spec: Spec::Block(BlockSpec::new(0x1000, 0x10)),
            check: open_memmap,
        },
    ];

    #[test]
    fn later_entries_are_fallbacks() {
        let mut ram = [0u8; 0x100];
        let mut card = RamCard::new(2, 2);
        let mut io = IoContext::new(&FALLBACK);
        io.register(Device::Memmap(Memmap::new(MemoryRegion::new(0x100, &mut ram))))
            .unwrap();
        io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();

        let (handle, spec) = io.resolve_image_source("bl1.bin").unwrap();
        assert_eq!(io.device_type(handle), DeviceType::Mmc);
        assert_eq!(spec, FALLBACK[1].spec);
    }

    #[test]
    fn last_failure_is_reported() {
        let mut ram = [0u8; 0x100];
        let mut io = IoContext::new(&FALLBACK);
        io.register(Device::Memmap(Memmap::new(MemoryRegion::new(0x100, &mut ram))))
            .unwrap();
        // No eMMC registered: the fallback cannot be reached.
        assert_eq!(io.resolve_image_source("bl1.bin"), Err(IoError::NotFound));
        // Spec outside the mapped window.
        assert_eq!(
            io.resolve_image_source("bl2.bin"),
            Err(IoError::OutOfBounds)
        );
    }

    static FIP_ON_CARD: [Policy; 2] = [
        Policy {
            image: FIP_IMAGE_NAME,
            device: DeviceType::Mmc,
            spec: Spec::Block(BlockSpec::new(0x400, 0x800)),
            check: open_mmc,
        },
        Policy {
            image: "bl2.bin",
            device: DeviceType::Fip,
            spec: Spec::File("bl2.bin"),
            check: open_fip,
        },
    ];

    #[test]
    fn images_resolve_through_the_package() {
        let bl2 = pattern::<300>(8);
        let package = build_fip(&[("bl2.bin", &bl2[..])]);
        let mut card = RamCard::new(1, 8);
        card.user[0x400..0x400 + package.len()].copy_from_slice(&package);

        let mut io = IoContext::new(&FIP_ON_CARD);
        let fip = io.register(Device::Fip(FipDevice::new())).unwrap();
        let fip = io.open_connector(&fip).unwrap();
        io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();

        let (handle, spec) = io.resolve_image_source("bl2.bin").unwrap();
        assert_eq!(handle, fip);
        let entity = io.open(handle, &spec).unwrap();
        let mut back = [0u8; 300];
        io.read(&entity, &mut back).unwrap();
        assert_eq!(back, bl2);
        io.close(entity).unwrap();
    }

    #[test]
    fn broken_package_is_reported_as_such() {
        let mut card = RamCard::new(1, 8);
        let mut io = IoContext::new(&FIP_ON_CARD);
        io.register(Device::Fip(FipDevice::new())).unwrap();
        io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();
        assert_eq!(
            io.resolve_image_source("bl2.bin"),
            Err(IoError::InvalidContainer)
        );
    }
}
