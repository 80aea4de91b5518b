//! Adapters implementing application ports

mod system_clock;

pub use system_clock::SystemClock;
