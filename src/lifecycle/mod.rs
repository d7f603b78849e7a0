//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Logging → Broker → Wallet → Chain → Recovery → Tasks
//!
//! Shutdown (shutdown.rs):
//!     Token cancelled → Consumer stops taking → In-flight drains → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then infrastructure, then tasks
//! - Ordered shutdown: stop consuming, drain, stop sampler and HTTP
//! - Shutdown has a deadline: the drain timeout bounds it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{InFlight, InFlightGuard, Shutdown};
pub use signals::wait_for_signal;
pub use startup::{build_http_router, load_startup_config, run, StartupError, StartupOptions};
