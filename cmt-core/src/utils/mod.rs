//! Utility re-exports and helper macros for the colorimeter core.
//!
//! - `shell`: console line assembly, tokenizer, resolver and the REPL
//! - `controllers`: optics, calibration, catalog, monitor and indicator
//! - `math`: filtering and distance helpers
//! - `storage`: the non-volatile store seam and record layout
//!
//! The `mk_static!` macro simplifies static initialization in no-std
//! contexts.

pub mod controllers;
pub mod math;
pub mod shell;
pub mod storage;

pub use controllers::Colorimeter;
pub use embassy_time::*;
pub use shell::repl;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and
/// initializes it with `$val`, returning a mutable reference to the stored
/// value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
