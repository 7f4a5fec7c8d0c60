//! # hubkit-app
//!
//! Application layer: service lifecycle, timing services and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `Clock`: wall-clock source for the time-event service
//!   - `WorkerPool`: isolated workers addressed by identifier
//!   - `ProcessSpawner` / `ChildProcess`: external shell commands
//! - Define the worker-side contract (`WorkerTask`, `Emitter`, `TaskRegistry`)
//! - Provide the **services**:
//!   - `ManagedService`: classic, threaded or external lifecycle
//!   - `TimeEventService`: recurring per-second triggers
//!   - `SchedulerService`: one-shot tasks with replace-on-reschedule
//!   - `ServicesManager`: bulk lifecycle and the liveness watchdog
//! - Provide **in-process infrastructure** (timer registry) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hubkit-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod api;
pub mod guard;
pub mod ports;
pub mod services;
pub mod timer_registry;
pub mod worker;
