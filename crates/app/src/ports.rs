//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the service layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod clock;
pub mod process;
pub mod worker_pool;

pub use clock::{Clock, ManualClock, SystemClock};
pub use process::{ChildProcess, ProcessSpawner};
pub use worker_pool::{WorkerCallback, WorkerPool};
