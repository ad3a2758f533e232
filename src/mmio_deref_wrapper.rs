/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

use core::{marker::PhantomData, ops};

/// Typed view of a `tock-registers` register block at a fixed bus address.
pub struct MMIODerefWrapper<T> {
    base_addr: usize,
    phantom: PhantomData<fn() -> T>,
}

impl<T> MMIODerefWrapper<T> {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// `start_addr` must point at a live, suitably aligned instance of `T` for as long as
    /// the wrapper is used. No checks are done here.
    pub const unsafe fn new(start_addr: usize) -> Self {
        Self {
            base_addr: start_addr,
            phantom: PhantomData,
        }
    }

    /// Bus address of the register block.
    pub const fn base_addr(&self) -> usize {
        self.base_addr
    }
}

/// Deref to the register block, so that callers write `self.BOOT_MODE.get()`
/// instead of dereferencing a raw pointer each time.
impl<T> ops::Deref for MMIODerefWrapper<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*(self.base_addr as *const _) }
    }
}
