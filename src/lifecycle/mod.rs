pub mod callbacks;
pub mod cascade;
pub mod counters;
pub mod session;
pub mod window;

pub use callbacks::LifecycleEvent;
pub use session::Session;
pub use window::{RestoreOptions, WindowRange};
