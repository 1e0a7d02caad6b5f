pub mod api;

#[cfg(feature = "unit_test")]
mod mock;
#[cfg(not(feature = "unit_test"))]
mod postgres;

#[cfg(feature = "unit_test")]
pub use mock::{DatabaseClient, Result};
#[cfg(not(feature = "unit_test"))]
pub use postgres::{pg_connect, DatabaseClient, Error, Result};

pub use api::Database;
