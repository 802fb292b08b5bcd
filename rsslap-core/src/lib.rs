mod config;
mod constants;
mod driver;
mod error;
mod histogram;
mod stats;

pub use config::*;
pub use constants::*;
pub use driver::*;
pub use error::*;
pub use histogram::*;
pub use stats::*;
