pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, HuddleError, MediaError, StoreError, TransportError};
pub use events::EventBus;
pub use id::{new_id, CallKey, SessionId};

pub type Result<T> = std::result::Result<T, HuddleError>;
