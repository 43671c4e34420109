pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod realtime;
pub mod runtime;
pub mod session;
pub mod store;
pub mod toast;
pub mod tracing_setup;

#[cfg(test)]
pub(crate) mod testing;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use events::CoreEvent;
pub use runtime::{CoreRuntime, NotificationActions};
