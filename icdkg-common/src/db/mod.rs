//! Case storage
//!
//! Optional relational sink for coded cases. Nothing in the knowledge
//! engine depends on it; the server only writes to it when a database
//! path is configured.

pub mod cases;
pub mod init;

pub use cases::{CaseCode, CaseRecord, CaseStore, StoredCase};
pub use init::init_database;
