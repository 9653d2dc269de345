#![cfg_attr(not(test), no_std)]

mod fmt;

mod config;
mod consumer;
mod driver;
mod event;
mod peripherals;

pub use config::*;
pub use consumer::*;
pub use driver::*;
pub use event::*;
pub use peripherals::*;
