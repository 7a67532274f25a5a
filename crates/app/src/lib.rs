//! numvox application wiring: grid, console adapter, wake-lock backend and
//! runtime assembly around the core playback machinery.

pub mod console;
pub mod grid;
pub mod inhibit;
pub mod runtime;
