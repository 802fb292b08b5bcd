//! Concrete [`Driver`](rsslap_core::Driver) implementations.
mod print;
pub use print::{PrintConnection, PrintDriver};

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub use postgres::{PostgresConnection, PostgresDriver};
