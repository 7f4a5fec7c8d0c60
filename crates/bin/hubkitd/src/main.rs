//! # hubkitd: hubkit daemon
//!
//! Composition root that wires the adapters into the hub's services and
//! runs them until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging
//! - Construct the timer registry, clock, worker pool and process spawner
//! - Construct the time-event and scheduler services and the services manager
//! - Declare the configured external services and the heartbeat worker
//! - Handle graceful shutdown (SIGINT/SIGTERM)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;
mod heartbeat;

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use hubkit_adapter_process::ShellSpawner;
use hubkit_adapter_workers::ThreadsManager;
use hubkit_app::ports::{Clock, ProcessSpawner, SystemClock, WorkerPool};
use hubkit_app::services::{
    ManagedService, SchedulerService, Service, ServicesManager, TimeEventService,
};
use hubkit_app::timer_registry::TimerRegistry;
use hubkit_domain::service::ServiceMode;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Infrastructure
    let runtime = Handle::current();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timers = Arc::new(TimerRegistry::new(runtime.clone()));
    let workers: Arc<dyn WorkerPool> =
        Arc::new(ThreadsManager::new(heartbeat::tasks(), runtime.clone()));
    let spawner: Arc<dyn ProcessSpawner> = Arc::new(ShellSpawner::new(runtime));

    // Timing services
    let time_events = Arc::new(TimeEventService::new(
        Arc::clone(&clock),
        Arc::clone(&timers),
    ));
    let scheduler = Arc::new(SchedulerService::new(clock, Arc::clone(&timers)));

    // Managed services
    let manager = if config.watchdog.enabled {
        ServicesManager::with_watchdog(&time_events)
    } else {
        ServicesManager::new()
    };
    let mut autostart = Vec::new();
    for declared in &config.services {
        let service = ManagedService::builder()
            .name(declared.name.trim())
            .mode(ServiceMode::External)
            .command(declared.command.as_str())
            .spawner(Arc::clone(&spawner))
            .build()?;
        if manager.add(Arc::new(service)) && declared.autostart {
            autostart.push(declared.name.trim().to_string());
        }
    }
    if config.heartbeat.enabled {
        heartbeat::install(&manager, &time_events, Arc::clone(&workers))?;
        autostart.push(heartbeat::HEARTBEAT.to_string());
    }

    time_events.start()?;
    scheduler.start()?;
    for name in &autostart {
        if let Some(service) = manager.get(name)
            && let Err(err) = service.start()
        {
            tracing::error!(service = %name, error = %err, "service failed to start");
        }
    }
    tracing::info!(
        services = manager.len(),
        watchdog = config.watchdog.enabled,
        "hubkitd started"
    );

    shutdown_signal().await?;
    tracing::info!("shutting down");

    manager.stop_all();
    scheduler.stop()?;
    time_events.stop()?;
    workers.kill_all();
    timers.shutdown();

    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
