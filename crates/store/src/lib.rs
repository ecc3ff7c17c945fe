pub mod error;
pub mod memory;
pub mod subscribers;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use subscribers::{ChangeKind, Deliveries, Notification, SubscriptionId, SubscriptionTarget};
pub use traits::*;
