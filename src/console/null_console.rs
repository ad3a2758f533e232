/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

use crate::console::interface;

/// A dummy console that just ignores all output.
pub struct NullConsole;

pub static NULL_CONSOLE: NullConsole = NullConsole {};

impl interface::Write for NullConsole {
    fn write_fmt(&self, _args: core::fmt::Arguments) -> core::fmt::Result {
        Ok(())
    }
}

impl interface::All for NullConsole {}
