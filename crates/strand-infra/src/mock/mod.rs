//! Mock infrastructure for unit testing
//!
//! In-memory implementations of the infrastructure traits so reconcilers can
//! be exercised without a database, broker or network. Each mock can be told
//! to fail so error paths are testable.

mod broker;
mod gateway;
mod migrate;
mod probe;
mod secrets;

pub use broker::MockBrokerAdmin;
pub use gateway::{MockGateway, StoredUser};
pub use migrate::MockMigrationRunner;
pub use probe::MockProbe;
pub use secrets::SequencePasswordGenerator;
