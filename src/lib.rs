//! Pest control coordinator.
//!
//! A TCP server that receives site-visit reports from field clients,
//! consults a remote authority over the same binary protocol for per-site
//! target population bounds, and drives cull/conserve policies at each site
//! so every observed species population stays inside its authority-defined
//! range.

pub mod authority;
pub mod codec;
pub mod config;
pub mod error;
pub mod policy;
pub mod reconcile;
pub mod registry;
pub mod server;
pub mod supervisor;

pub use config::Config;
pub use error::CoordinatorError;
pub use supervisor::run;

#[cfg(test)]
pub(crate) mod tests {
    pub fn init_tracing_subscriber() {
        static TRACING_SUBSCRIBER_INIT: parking_lot::Once = parking_lot::Once::new();
        TRACING_SUBSCRIBER_INIT.call_once(tracing_subscriber::fmt::init);
    }
}
