//! Vigil - periodic concurrent uptime checking
//!
//! The engine probes every active target on a fixed cadence, records each
//! outcome and notifies the target's owner exactly once per up/down
//! transition. Storage and delivery are supplied by the embedding process
//! through the traits in [`collaborators`].

pub mod collaborators;
pub mod detector;
pub mod error;
pub mod executor;
pub mod memory;
pub mod probe;
pub mod scheduler;
pub mod types;

pub use collaborators::{CheckStore, NotificationGateway, TargetRegistry, UserDirectory};
pub use detector::{NotificationOutcome, Observation, TransitionDetector};
pub use error::{CycleError, NotifyError, StoreError};
pub use executor::{CycleExecutor, CycleReport};
pub use probe::{DEFAULT_PROBE_TIMEOUT, HttpProbe, Probe};
pub use scheduler::{DEFAULT_CHECK_INTERVAL, Scheduler, SchedulerHandle};
pub use types::{CheckResult, MonitoredTarget, NotificationIntent, TargetStatus, User};
