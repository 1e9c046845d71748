//! Supervisor loop (spec.md §4.7): drives the tick, dispatches scaling
//! directives, rotates the sample ring. Grounded on
//! `services/consensus-core/src/main.rs`'s init/health-server/signal-select
//! shape and `original_source/src/autoscaler.py::marathon_poll` plus its
//! `if __name__ == "__main__"` startup block.

use anyhow::Result;
use autoscaler_core::{
    aggregate_app, evaluate_app, init_tracing, load_config, reset_sample_counts, sample_tick, start_health_server, AppId, AppSnapshot, MarathonGateway, MesosGateway,
    OrchestratorGateway, ResourceManagerGateway, SampleRing, ScalingAction, POLL_INTERVAL_SECS,
};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(config.debug)?;
    tracing::info!("starting cluster autoscaler control loop");

    start_health_server(config.port0).await?;

    let orchestrator: Arc<dyn OrchestratorGateway> =
        Arc::new(MarathonGateway::new(config.marathon_url.clone(), config.marathon_user_opt(), config.marathon_pass_opt(), !config.marathon_tls_verify));
    let resource_manager: Arc<dyn ResourceManagerGateway> =
        Arc::new(MesosGateway::new(config.mesos_url.clone(), config.mesos_user_opt(), config.mesos_pass_opt(), !config.mesos_tls_verify));

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            tracing::info!("shutdown signal received, exiting");
        }
        _ = supervise(orchestrator, resource_manager) => {}
    }

    Ok(())
}

/// Funnels `SIGINT`, `SIGTERM`, `SIGHUP` and `SIGQUIT` into one shutdown
/// path (SPEC_FULL.md §4 "multi-signal graceful shutdown"; `SIGABRT` is not
/// installed — `tokio::signal::unix::SignalKind` has no abort variant and
/// catching aborts gracefully inside an async runtime isn't meaningful).
async fn wait_for_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("sigint handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
    let mut sighup = signal(SignalKind::hangup()).expect("sighup handler");
    let mut sigquit = signal(SignalKind::quit()).expect("sigquit handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
        _ = sigquit.recv() => {}
    }
}

/// The endless tick loop (spec.md §4.7). Never returns except by the
/// process being signaled — any failure within a tick is logged and the
/// loop sleeps one more `POLL_INTERVAL` before continuing (spec.md §7:
/// never terminate the loop on transient errors).
async fn supervise(orchestrator: Arc<dyn OrchestratorGateway>, resource_manager: Arc<dyn ResourceManagerGateway>) -> ! {
    let mut ring = SampleRing::new();
    loop {
        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;

        if let Err(err) = run_tick(orchestrator.as_ref(), resource_manager.as_ref(), &mut ring).await {
            tracing::error!(error = %err, "tick failed, retrying next cycle");
            sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    }
}

async fn run_tick(orchestrator: &dyn OrchestratorGateway, resource_manager: &dyn ResourceManagerGateway, ring: &mut SampleRing) -> Result<()> {
    let mut snapshots = sample_tick(orchestrator, resource_manager, ring).await?;

    for snapshot in snapshots.values_mut() {
        aggregate_app(snapshot);
    }

    for (app, snapshot) in &snapshots {
        log_stats(app, snapshot);
    }

    ring.write(snapshots);

    let free_cpus = resource_manager.free_cpus().await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "cluster free CPU unavailable this tick, admission will block scale-up");
        0.0
    });
    let free_mem_mb = resource_manager.free_mem_mb().await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "cluster free memory unavailable this tick, admission will block scale-up");
        0.0
    });

    let apps: Vec<AppId> = ring.current_mut().map(|snapshots| snapshots.keys().cloned().collect()).unwrap_or_default();

    for app in apps {
        let action = match ring.current_mut().and_then(|snapshots| snapshots.get(&app)) {
            Some(snapshot) => evaluate_app(snapshot, free_cpus, free_mem_mb),
            None => continue,
        };

        if matches!(action, ScalingAction::None) {
            continue;
        }

        if dispatch(orchestrator, &app, action).await {
            if let Some(snapshot) = ring.current_mut().and_then(|snapshots| snapshots.get_mut(&app)) {
                reset_sample_counts(snapshot);
            }
        }
    }

    ring.advance();

    Ok(())
}

async fn dispatch(orchestrator: &dyn OrchestratorGateway, app: &AppId, action: ScalingAction) -> bool {
    let result = match action {
        ScalingAction::ScaleUpMemory { target_mem_mb } | ScalingAction::ScaleDownMemory { target_mem_mb } => orchestrator.set_memory(app, target_mem_mb).await,
        ScalingAction::ScaleUpReplicas { target_instances } | ScalingAction::ScaleDownReplicas { target_instances } => orchestrator.set_replicas(app, target_instances).await,
        ScalingAction::None => return false,
    };

    match result {
        Ok(accepted) => accepted,
        Err(err) => {
            tracing::warn!(app = app.as_str(), error = %err, "scaling directive failed");
            false
        }
    }
}

fn log_stats(app: &AppId, snapshot: &AppSnapshot) {
    tracing::info!(
        app = app.as_str(),
        instances = snapshot.task_count,
        cpu = format_pct(snapshot.cpu_util),
        avg_cpu = format_pct(snapshot.app_avg_cpu_util),
        mem = format_pct(snapshot.mem_util),
        avg_mem = format_pct(snapshot.app_avg_mem_util),
        "app stats",
    );
}

fn format_pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}
