//! doze-control — decides when the instance runs and when it sleeps.
//!
//! Sits between the HTTP surface and the infrastructure clients:
//!
//! ```text
//! ControlPlane (ops)
//!   ├── InstanceService ── doze-ovh (status / unshelve / shelve)
//!   │     └── RemoteExec ── doze-exec (host cleanup before shelve)
//!   ├── ServerPinger ───── doze-ping (player-count probe)
//!   └── InstanceWatch ──── the idle timer that shelves a forgotten server
//! ```
//!
//! State conflicts (starting an active instance, stopping a shelved one)
//! are ordinary replies with a machine code, not errors; [`ControlError`]
//! is reserved for the provider API and host cleanup actually failing.

pub mod error;
pub mod instance;
pub mod ops;
pub mod status;
pub mod watch;

pub use error::{ControlError, ControlResult};
pub use instance::{CleanupCommands, InstanceService};
pub use ops::{ControlPlane, OpReply, codes};
pub use status::{InstanceState, InstanceStatus};
pub use watch::{
    CheckOutcome, InstanceWatch, ShelveTrigger, TargetFuture, WatchDelays, WatchTarget, run_check,
};
