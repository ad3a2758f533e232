/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 */

//! Boot console used by the logging macros.
//!
//! Starts out as the [`null_console::NullConsole`]; the BL1 binary registers its UART
//! once the pins and clocks for it are up.

pub mod null_console;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Console interfaces.
pub mod interface {
    use core::fmt;

    /// Console write functions.
    pub trait Write {
        /// Write a Rust format string.
        fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result;

        /// Block until all buffered output reached the wire.
        fn flush(&self) {}
    }

    /// Trait alias for a full-fledged console.
    pub trait All: Write {}
}

//--------------------------------------------------------------------------------------------------
// Global instances
//--------------------------------------------------------------------------------------------------

static CONSOLE: NullLock<&'static (dyn interface::All + Sync)> =
    NullLock::new(&null_console::NULL_CONSOLE);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

use crate::sync::{interface::Mutex, NullLock};

/// Register a new console.
pub fn register_console(new_console: &'static (dyn interface::All + Sync)) {
    CONSOLE.lock(|con| *con = new_console);
}

/// Return a reference to the currently registered console.
///
/// This is the global console used by all printing macros.
pub fn console() -> &'static dyn interface::All {
    CONSOLE.lock(|con| *con)
}

#[cfg(test)]
mod tests {
    use {
        super::{interface::Write as _, *},
        core::{
            fmt,
            sync::atomic::{AtomicUsize, Ordering},
        },
    };

    struct CountingConsole(AtomicUsize);

    impl interface::Write for CountingConsole {
        fn write_fmt(&self, args: fmt::Arguments) -> fmt::Result {
            self.0.fetch_add(args.to_string().len(), Ordering::SeqCst);
            Ok(())
        }
    }

    impl interface::All for CountingConsole {}

    static COUNTING: CountingConsole = CountingConsole(AtomicUsize::new(0));

    #[test]
    fn registered_console_receives_output() {
        register_console(&COUNTING);
        console().write_fmt(format_args!("{}-{}", 12, "ab")).unwrap();
        assert_eq!(COUNTING.0.load(Ordering::SeqCst), 5);
        register_console(&null_console::NULL_CONSOLE);
    }
}
