pub mod config;
pub mod error;
pub mod stack;

pub use config::TetherConfig;
pub use error::{Result, StoreError, TetherError};
pub use stack::{
    ContextStatistics, MemoryContext, MemoryStack, ModelDescriptor, PersistentStack,
    StoreLocation,
};
