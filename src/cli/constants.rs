//! Display-level infrastructure shared by the library and the binary.
//!
//! All human-readable output goes to stderr through [`displaylevel!`], gated
//! on a process-wide level: 0 = silent, 1 = errors only, 2 = normal,
//! 3+ = verbose.

use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide display level.
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(2);

/// Returns the current display level.
#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

/// Sets the display level.
#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stderr when the display level is at least `$level`.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::cli::constants::display_level() >= $level {
            eprint!($($arg)*);
        }
    };
}
