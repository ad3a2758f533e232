/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Device registry.
//!
//! Holds every registered driver in a fixed table and routes file operations to them.
//! The table lives in an [`IoContext`] owned by the boot code, no globals are involved.

use {
    super::{
        fip::{Backend, FipDevice},
        interface::BlockDevice,
        memmap::Memmap,
        mmc::MmcDevice,
        policy::Policy,
        DeviceCaps, DeviceType, Entity, FileState, InitParams, IoError, Result, SeekMode, Spec,
    },
    core::fmt,
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Size of the device table.
pub const MAX_IO_DEVICES: usize = 4;

/// A registered driver.
pub enum Device<'a> {
    Memmap(Memmap<'a>),
    Mmc(MmcDevice<'a>),
    Fip(FipDevice),
}

/// Index of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(usize);

/// Proof of registration, handed out by [`IoContext::register`].
#[derive(Debug, PartialEq, Eq)]
pub struct Connector {
    handle: DeviceHandle,
    device_type: DeviceType,
}

/// Registered devices and the load policy table.
pub struct IoContext<'a> {
    devices: [Option<Device<'a>>; MAX_IO_DEVICES],
    next_index: usize,
    policies: &'static [Policy],
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl Device<'_> {
    pub fn device_type(&self) -> DeviceType {
        match self {
            Device::Memmap(d) => d.device_type(),
            Device::Mmc(d) => d.device_type(),
            Device::Fip(d) => d.device_type(),
        }
    }

    pub fn capabilities(&self) -> DeviceCaps {
        match self {
            Device::Memmap(d) => d.capabilities(),
            Device::Mmc(d) => d.capabilities(),
            Device::Fip(d) => d.capabilities(),
        }
    }

    pub fn current_file(&self) -> Option<FileState> {
        match self {
            Device::Memmap(d) => d.current_file().copied(),
            Device::Mmc(d) => d.current_file().copied(),
            Device::Fip(d) => d.current_file().copied(),
        }
    }
}

impl fmt::Debug for Device<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Device")
            .field("type", &self.device_type())
            .field("file", &self.current_file())
            .finish()
    }
}

impl DeviceHandle {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Connector {
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
}

impl<'a> IoContext<'a> {
    pub fn new(policies: &'static [Policy]) -> Self {
        Self {
            devices: core::array::from_fn(|_| None),
            next_index: 0,
            policies,
        }
    }

    pub fn policies(&self) -> &'static [Policy] {
        self.policies
    }

    /// Add a driver to the table. One driver of each kind may be registered.
    pub fn register(&mut self, device: Device<'a>) -> Result<Connector> {
        let device_type = device.device_type();
        if self.handle_of(device_type).is_some() {
            warn!("io: {:?} device registered twice", device_type);
            return Err(IoError::AlreadyRegistered);
        }
        if self.next_index >= MAX_IO_DEVICES {
            warn!("io: no room for the {:?} device", device_type);
            return Err(IoError::TableFull);
        }
        let handle = DeviceHandle(self.next_index);
        self.devices[self.next_index] = Some(device);
        self.next_index += 1;
        Ok(Connector {
            handle,
            device_type,
        })
    }

    pub fn open_connector(&self, connector: &Connector) -> Result<DeviceHandle> {
        Ok(connector.handle)
    }

    /// Handle of the registered driver of a given kind.
    pub fn handle_of(&self, device_type: DeviceType) -> Option<DeviceHandle> {
        self.devices[..self.next_index]
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .map_or(false, |device| device.device_type() == device_type)
            })
            .map(DeviceHandle)
    }

    pub fn device(&self, handle: DeviceHandle) -> &Device<'a> {
        match self.devices.get(handle.0).and_then(Option::as_ref) {
            Some(device) => device,
            None => panic!("io: unknown device handle {}", handle.0),
        }
    }

    pub fn device_type(&self, handle: DeviceHandle) -> DeviceType {
        self.device(handle).device_type()
    }

    /// Position of the open file on a device, `None` if nothing is open.
    pub fn current_file(&self, handle: DeviceHandle) -> Option<FileState> {
        self.device(handle).current_file()
    }

    /// Bring a device up. Drivers only do the bring-up work once.
    ///
    /// A FIP device takes `InitParams::Container(name)`: `name` is looked up in the
    /// policy table to find the storage holding the package.
    pub fn dev_init(&mut self, handle: DeviceHandle, params: InitParams) -> Result<()> {
        if !self.is_container(handle) {
            return self.leaf(handle).dev_init(params);
        }
        let name = match params {
            InitParams::Container(name) => name,
            _ => return Err(IoError::NotSupported),
        };
        if let Device::Fip(fip) = self.device(handle) {
            if fip.is_initialised() {
                return Ok(());
            }
        }
        let (device, spec) = self.resolve_image_source(name)?;
        self.init_container(handle, Backend { device, spec })
    }

    /// Read the table of contents of a FIP device from `backend`.
    pub fn init_container(&mut self, handle: DeviceHandle, backend: Backend) -> Result<()> {
        self.with_container(handle, |fip, io| fip.dev_init(io, backend))
    }

    pub fn dev_close(&mut self, handle: DeviceHandle) -> Result<()> {
        if self.is_container(handle) {
            return Ok(());
        }
        self.leaf(handle).dev_close()
    }

    /// Open a file on a device. The returned entity must be given back to [`close`].
    ///
    /// [`close`]: IoContext::close
    pub fn open(&mut self, handle: DeviceHandle, spec: &Spec) -> Result<Entity> {
        if self.is_container(handle) {
            self.with_container(handle, |fip, _| fip.open(spec))?;
        } else {
            let device = self.leaf(handle);
            match spec {
                Spec::Block(block) => device.open(block)?,
                Spec::File(_) if device.current_file().is_some() => {
                    return Err(IoError::ResourcesExhausted)
                }
                Spec::File(_) => return Err(IoError::NotSupported),
            }
        }
        Ok(Entity::new(handle))
    }

    pub fn seek(&mut self, entity: &Entity, mode: SeekMode, offset: isize) -> Result<()> {
        let handle = self.require(entity, DeviceCaps::SEEK)?;
        if self.is_container(handle) {
            return self.with_container(handle, |fip, _| fip.seek(mode, offset));
        }
        self.leaf(handle).seek(mode, offset)
    }

    /// Length of the open file.
    pub fn size(&mut self, entity: &Entity) -> Result<usize> {
        let handle = self.require(entity, DeviceCaps::SIZE)?;
        if self.is_container(handle) {
            return self.with_container(handle, |fip, _| fip.size());
        }
        self.leaf(handle).size()
    }

    /// Fill `buffer` from the cursor on. Reads are never short: on success the whole
    /// buffer was filled.
    pub fn read(&mut self, entity: &Entity, buffer: &mut [u8]) -> Result<usize> {
        let handle = self.require(entity, DeviceCaps::READ)?;
        if self.is_container(handle) {
            return self.with_container(handle, |fip, io| fip.read(io, buffer));
        }
        self.leaf(handle).read(buffer)
    }

    pub fn write(&mut self, entity: &Entity, buffer: &[u8]) -> Result<usize> {
        let handle = self.require(entity, DeviceCaps::WRITE)?;
        self.leaf(handle).write(buffer)
    }

    /// Cursor of the open file.
    pub fn tell(&self, entity: &Entity) -> usize {
        match self.current_file(entity.device()) {
            Some(file) => file.cursor,
            None => panic!("io: entity without an open file"),
        }
    }

    pub fn close(&mut self, entity: Entity) -> Result<()> {
        let handle = entity.device();
        if self.is_container(handle) {
            return self.with_container(handle, |fip, _| fip.close());
        }
        self.leaf(handle).close()
    }

    //----------------------------------------------------------------------------------------------
    // Private Code
    //----------------------------------------------------------------------------------------------

    fn require(&self, entity: &Entity, capability: DeviceCaps) -> Result<DeviceHandle> {
        let handle = entity.device();
        if !self.device(handle).capabilities().contains(capability) {
            return Err(IoError::NotSupported);
        }
        Ok(handle)
    }

    fn is_container(&self, handle: DeviceHandle) -> bool {
        matches!(self.device(handle), Device::Fip(_))
    }

    fn leaf(&mut self, handle: DeviceHandle) -> &mut dyn BlockDevice {
        match self.devices.get_mut(handle.0).and_then(Option::as_mut) {
            Some(Device::Memmap(device)) => device,
            Some(Device::Mmc(device)) => device,
            Some(Device::Fip(_)) => panic!("io: FIP device used as a raw medium"),
            None => panic!("io: unknown device handle {}", handle.0),
        }
    }

    /// Run `f` on a FIP device while the rest of the table stays usable for reaching
    /// its backing storage.
    fn with_container<R>(
        &mut self,
        handle: DeviceHandle,
        f: impl FnOnce(&mut FipDevice, &mut IoContext<'a>) -> Result<R>,
    ) -> Result<R> {
        let mut fip = match self.devices[handle.0].take() {
            Some(Device::Fip(fip)) => fip,
            other => {
                self.devices[handle.0] = other;
                panic!("io: device {} is not a FIP", handle.0);
            }
        };
        let result = f(&mut fip, self);
        self.devices[handle.0] = Some(Device::Fip(fip));
        result
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::io::{
            memmap::MemoryRegion,
            testing::{pattern, RamCard},
            BlockSpec, Partition,
        },
    };

    static NO_POLICIES: [Policy; 0] = [];

    #[test]
    fn one_device_per_kind() {
        let mut ram = [0u8; 16];
        let mut other = [0u8; 16];
        let mut io = IoContext::new(&NO_POLICIES);
        let connector = io
            .register(Device::Memmap(Memmap::new(MemoryRegion::new(0, &mut ram))))
            .unwrap();
        assert_eq!(connector.device_type(), DeviceType::Memmap);
        assert_eq!(
            io.register(Device::Memmap(Memmap::new(MemoryRegion::new(
                0x100, &mut other
            ))))
            .unwrap_err(),
            IoError::AlreadyRegistered
        );
        let handle = io.open_connector(&connector).unwrap();
        assert_eq!(io.handle_of(DeviceType::Memmap), Some(handle));
        assert_eq!(io.handle_of(DeviceType::Mmc), None);
    }

    #[test]
    fn table_has_fixed_capacity() {
        let mut io = IoContext::new(&NO_POLICIES);
        io.register(Device::Fip(FipDevice::new())).unwrap();
        io.next_index = MAX_IO_DEVICES;
        assert_eq!(
            io.register(Device::Fip(FipDevice::new())).unwrap_err(),
            IoError::AlreadyRegistered
        );
        let mut card = RamCard::new(1, 1);
        assert_eq!(
            io.register(Device::Mmc(MmcDevice::new(&mut card)))
                .unwrap_err(),
            IoError::TableFull
        );
    }

    #[test]
    fn operations_outside_capabilities_are_not_supported() {
        let mut card = RamCard::new(1, 4);
        let mut io = IoContext::new(&NO_POLICIES);
        let mmc = io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();
        let mmc = io.open_connector(&mmc).unwrap();
        io.dev_init(mmc, InitParams::None).unwrap();
        let entity = io.open(mmc, &Spec::Block(BlockSpec::new(0, 512))).unwrap();
        assert_eq!(io.size(&entity), Err(IoError::NotSupported));
        io.close(entity).unwrap();
        assert_eq!(
            io.open(mmc, &Spec::File("bl2.bin")),
            Err(IoError::NotSupported)
        );
    }

    #[test]
    fn single_open_file_per_device() {
        let mut ram = [0u8; 64];
        let mut io = IoContext::new(&NO_POLICIES);
        let mem = io
            .register(Device::Memmap(Memmap::new(MemoryRegion::new(0, &mut ram))))
            .unwrap();
        let mem = io.open_connector(&mem).unwrap();

        let entity = io.open(mem, &Spec::Block(BlockSpec::new(8, 32))).unwrap();
        io.seek(&entity, SeekMode::Set, 4).unwrap();
        assert_eq!(
            io.open(mem, &Spec::Block(BlockSpec::new(0, 8))),
            Err(IoError::ResourcesExhausted)
        );
        // Refused even when the new spec would not open anyway.
        for spec in [
            Spec::Block(BlockSpec::new(0x1000, 8)),
            Spec::File("bl2.bin"),
        ] {
            assert_eq!(io.open(mem, &spec), Err(IoError::ResourcesExhausted));
        }
        assert_eq!(
            io.current_file(mem),
            Some(FileState {
                base: 8,
                length: 32,
                cursor: 4
            })
        );
        io.close(entity).unwrap();
        assert_eq!(io.current_file(mem), None);
    }

    #[test]
    fn cursor_moves_by_transfer_length_and_seek_is_absolute() {
        let mut ram = pattern::<256>(3);
        let copy = ram;
        let mut io = IoContext::new(&NO_POLICIES);
        let mem = io
            .register(Device::Memmap(Memmap::new(MemoryRegion::new(0x1000, &mut ram))))
            .unwrap();
        let mem = io.open_connector(&mem).unwrap();
        let entity = io
            .open(mem, &Spec::Block(BlockSpec::new(0x1000, 256)))
            .unwrap();

        let mut buffer = [0u8; 24];
        let mut expected = 0;
        for chunk in [0usize, 7, 24, 1] {
            assert_eq!(io.read(&entity, &mut buffer[..chunk]), Ok(chunk));
            expected += chunk;
            assert_eq!(io.tell(&entity), expected);
        }
        for offset in [0, 100, 255, 256] {
            io.seek(&entity, SeekMode::Set, offset as isize).unwrap();
            assert_eq!(io.tell(&entity), offset);
        }
        assert_eq!(io.read(&entity, &mut buffer[..1]), Err(IoError::OutOfBounds));
        assert_eq!(io.tell(&entity), 256);
        io.seek(&entity, SeekMode::Set, 100).unwrap();
        io.read(&entity, &mut buffer).unwrap();
        assert_eq!(&buffer[..], &copy[100..124]);
        io.close(entity).unwrap();
    }

    #[test]
    fn write_then_read_round_trips_on_the_card() {
        let mut card = RamCard::new(4, 16);
        let data = pattern::<777>(11);
        {
            let mut io = IoContext::new(&NO_POLICIES);
            let mmc = io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();
            let mmc = io.open_connector(&mmc).unwrap();
            io.dev_init(mmc, InitParams::Partition(Partition::Boot1))
                .unwrap();
            let entity = io.open(mmc, &Spec::Block(BlockSpec::new(100, 1024))).unwrap();
            io.write(&entity, &data).unwrap();
            io.seek(&entity, SeekMode::Set, 0).unwrap();
            let mut back = [0u8; 777];
            io.read(&entity, &mut back).unwrap();
            assert_eq!(back, data);
            io.close(entity).unwrap();
            io.dev_close(mmc).unwrap();
        }
        assert_eq!(&card.boot[100..877], &data[..]);
    }

    #[test]
    fn medium_errors_keep_the_cursor() {
        let mut card = RamCard::new(1, 4);
        card.fail_next = Some(crate::io::MmcError::Timeout);
        let mut io = IoContext::new(&NO_POLICIES);
        let mmc = io.register(Device::Mmc(MmcDevice::new(&mut card))).unwrap();
        let mmc = io.open_connector(&mmc).unwrap();
        io.dev_init(mmc, InitParams::None).unwrap();
        let entity = io.open(mmc, &Spec::Block(BlockSpec::new(0, 2048))).unwrap();
        io.seek(&entity, SeekMode::Set, 512).unwrap();
        let mut buffer = [0u8; 512];
        assert!(matches!(
            io.read(&entity, &mut buffer),
            Err(IoError::Medium { .. })
        ));
        assert_eq!(io.tell(&entity), 512);
        io.close(entity).unwrap();
    }

    #[test]
    #[should_panic]
    fn unknown_handle_panics() {
        let io = IoContext::new(&NO_POLICIES);
        io.device_type(DeviceHandle(2));
    }

    #[test]
    #[should_panic]
    fn io_on_a_closed_device_panics() {
        let mut ram = [0u8; 16];
        let mut io = IoContext::new(&NO_POLICIES);
        let mem = io
            .register(Device::Memmap(Memmap::new(MemoryRegion::new(0, &mut ram))))
            .unwrap();
        let mem = io.open_connector(&mem).unwrap();
        let stale = Entity::new(mem);
        let mut buffer = [0u8; 4];
        let _ = io.read(&stale, &mut buffer);
    }
}
