#![forbid(unsafe_code)]

pub mod chunker;
pub mod model;
pub mod overlap;
pub mod time;

pub use time::Clock;
