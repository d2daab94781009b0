// Store abstraction and the bundled implementations

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod store;

// Re-export commonly used items
pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
pub use store::{DocumentStore, FindQuery, StoreError};
