//! External collaborators: optional shared store and persistence.
//!
//! # Data Flow
//! ```text
//! lockout / revocation
//!     → StoreHandle (deadline per call)
//!     → SharedStore impl (redis_store.rs in production, memory.rs in tests)
//!
//! token engine
//!     → Persistence impl (refresh tokens, revoked jti table, accounts)
//! ```
//!
//! # Design Decisions
//! - The shared store is optional everywhere; `None` selects the in-memory path
//! - Persistence outages are distinct errors, never "not found"

pub mod memory;
pub mod persistence;
pub mod redis_store;
pub mod shared;

pub use memory::MemoryStore;
pub use persistence::{
    AccountRecord, CredentialVerifier, MemoryPersistence, Persistence, PersistenceError,
    RefreshTokenRecord,
};
pub use redis_store::RedisStore;
pub use shared::{SharedStore, StoreError, StoreHandle};
