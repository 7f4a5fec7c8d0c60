//! Application services: lifecycle, timing and bulk management.
//!
//! Collaborators (clock, timer registry, worker pool, process spawner) are
//! injected at construction, keeping this layer decoupled from concrete
//! adapters.

pub mod managed_service;
pub mod scheduler_service;
pub mod service;
pub mod services_manager;
pub mod time_event_service;

pub use managed_service::{ManagedService, ManagedServiceBuilder, ServiceBody};
pub use scheduler_service::SchedulerService;
pub use service::{Service, ServiceDelegate};
pub use services_manager::ServicesManager;
pub use time_event_service::TimeEventService;
