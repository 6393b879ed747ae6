//! In-memory registry of peers indexed by eid, name, and (host, port); owns
//! the local estate and each remote estate.

mod error;
mod estate;
mod registry;

pub use error::{EstateError, Result};
pub use estate::{Acceptance, LocalEstate, RemoteEstate};
pub use registry::EstateRegistry;
