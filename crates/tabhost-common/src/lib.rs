pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, SurfaceError, TabhostError, ViewError};
pub use events::{EventBus, HostEvent, Visit};
pub use id::prefixed_id;
pub use types::{Rect, SurfaceId, TabId, ViewId};

pub type Result<T> = std::result::Result<T, TabhostError>;
