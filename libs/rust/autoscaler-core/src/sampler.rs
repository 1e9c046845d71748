//! Sampler (spec.md §4.4): per-tick per-task counter fetch, CPU/memory
//! derivation and running-average update. Grounded on
//! `original_source/src/autoscaler.py`'s `get_cpu_util`,
//! `get_avg_resource_util`, `get_sample_count`.

use crate::error::GatewayError;
use crate::orchestrator::OrchestratorGateway;
use crate::resource_manager::{RawStats, ResourceManagerGateway};
use crate::sample_store::SampleRing;
use crate::types::{AppDefinition, AppId, AppSnapshot, TaskId, TaskRecord};
use crate::WINDOW_SIZE;
use std::collections::HashMap;

/// Fallback timestamp for a stats payload that omits one (spec.md §4.4).
fn local_wall_clock() -> f64 {
    chrono::Utc::now().timestamp() as f64
}

/// Samples every app the orchestrator currently knows about and returns the
/// freshly computed per-app snapshots for this tick. Apps whose definition
/// could not be fetched are skipped and logged; they do not abort the tick.
pub async fn sample_tick(
    orchestrator: &dyn OrchestratorGateway,
    resource_manager: &dyn ResourceManagerGateway,
    ring: &SampleRing,
) -> Result<HashMap<AppId, AppSnapshot>, GatewayError> {
    let apps = orchestrator.list_apps().await?;
    let mut snapshots = HashMap::with_capacity(apps.len());

    for app in apps {
        let definition = match orchestrator.app_definition(&app).await {
            Ok(def) => def,
            Err(err) => {
                tracing::warn!(app = app.as_str(), error = %err, "app definition unavailable this tick, skipping");
                continue;
            }
        };

        let Some(definition) = definition else {
            tracing::debug!(app = app.as_str(), "no task data from orchestrator for app");
            snapshots.insert(app, AppSnapshot::no_definition());
            continue;
        };

        let snapshot = sample_app(&app, &definition, resource_manager, ring).await;
        snapshots.insert(app, snapshot);
    }

    Ok(snapshots)
}

async fn sample_app(
    app: &AppId,
    definition: &AppDefinition,
    resource_manager: &dyn ResourceManagerGateway,
    ring: &SampleRing,
) -> AppSnapshot {
    let mut host_cache: HashMap<String, Option<HashMap<String, RawStats>>> = HashMap::new();
    let mut tasks = HashMap::with_capacity(definition.tasks.len());
    let mut cpu_sum = 0.0;
    let mut mem_sum = 0.0;
    let mut valid = 0usize;
    let mut max_samples = 0u32;

    for (task_id, host_info) in &definition.tasks {
        if !host_cache.contains_key(&host_info.host) {
            let fetched = match resource_manager.agent_task_stats(&host_info.host).await {
                Ok(map) => Some(map),
                Err(err) => {
                    tracing::warn!(host = %host_info.host, error = %err, "agent stats unavailable this tick");
                    None
                }
            };
            host_cache.insert(host_info.host.clone(), fetched);
        }

        let raw = host_cache.get(&host_info.host).and_then(|opt| opt.as_ref()).and_then(|m| m.get(task_id.as_str()));

        let Some(raw) = raw else {
            tasks.insert(task_id.clone(), None);
            continue;
        };

        let record = derive_task_record(app, task_id, raw, ring);
        cpu_sum += record.cpu_util;
        mem_sum += record.mem_util;
        valid += 1;
        max_samples = max_samples.max(record.sample_count);
        tasks.insert(task_id.clone(), Some(record));
    }

    AppSnapshot {
        task_count: definition.tasks.len(),
        cpus: definition.cpus,
        mem_mb: definition.mem_mb,
        tasks: Some(tasks),
        cpu_util: if valid > 0 { cpu_sum / valid as f64 } else { 0.0 },
        mem_util: if valid > 0 { mem_sum / valid as f64 } else { 0.0 },
        // Filled in by the aggregator once every task of this app is sampled.
        app_avg_cpu_util: 0.0,
        app_avg_mem_util: 0.0,
        max_samples_in_app: max_samples,
    }
}

fn derive_task_record(app: &AppId, task_id: &TaskId, raw: &RawStats, ring: &SampleRing) -> TaskRecord {
    let timestamp = raw.timestamp.unwrap_or_else(local_wall_clock);
    let cpus_time = raw.cpus_system_time_secs + raw.cpus_user_time_secs;
    let mem_util = (raw.mem_rss_bytes as f64 / raw.mem_limit_bytes as f64).clamp(0.0, 1.0);

    let prior = ring.prior_record(app, task_id);

    // Counter reset safety (spec.md §3): a non-monotonic counter or
    // non-advancing clock between ticks clamps cpu_util to 0 for this tick.
    let cpu_util = match prior {
        Some(p) => {
            let dt = timestamp - p.timestamp;
            let dcpu = cpus_time - p.cpus_time;
            if dt > 0.0 && dcpu >= 0.0 {
                dcpu / dt
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    let sample_count = match prior {
        Some(p) => (p.sample_count + 1).min(WINDOW_SIZE as u32),
        None => 1,
    };

    let n = f64::from(sample_count);
    let prior_avg_cpu = prior.map(|p| p.avg_cpu_util).unwrap_or(0.0);
    let prior_avg_mem = prior.map(|p| p.avg_mem_util).unwrap_or(0.0);
    let avg_cpu_util = (1.0 / n) * cpu_util + ((n - 1.0) / n) * prior_avg_cpu;
    let avg_mem_util = (1.0 / n) * mem_util + ((n - 1.0) / n) * prior_avg_mem;

    TaskRecord {
        timestamp,
        cpus_time,
        cpu_util,
        mem_rss_bytes: raw.mem_rss_bytes,
        mem_limit_bytes: raw.mem_limit_bytes,
        mem_util,
        sample_count,
        avg_cpu_util,
        avg_mem_util,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cpus_time: f64, mem_rss: u64, mem_limit: u64, timestamp: Option<f64>) -> RawStats {
        RawStats { cpus_system_time_secs: cpus_time, cpus_user_time_secs: 0.0, mem_rss_bytes: mem_rss, mem_limit_bytes: mem_limit, timestamp }
    }

    fn record(cpus_time: f64, timestamp: f64, sample_count: u32, avg_cpu: f64, avg_mem: f64) -> TaskRecord {
        TaskRecord {
            timestamp,
            cpus_time,
            cpu_util: 0.0,
            mem_rss_bytes: 0,
            mem_limit_bytes: 1,
            mem_util: 0.0,
            sample_count,
            avg_cpu_util: avg_cpu,
            avg_mem_util: avg_mem,
        }
    }

    #[test]
    fn cpu_derivation_matches_worked_example() {
        let app = AppId::new("/web");
        let task = TaskId("t1".into());
        let mut ring = SampleRing::new();
        let mut tasks = HashMap::new();
        tasks.insert(task.clone(), Some(record(10.0, 100.0, 1, 0.0, 0.0)));
        let mut snap = AppSnapshot::no_definition();
        snap.tasks = Some(tasks);
        let mut m = HashMap::new();
        m.insert(app.clone(), snap);
        ring.write(m);
        ring.advance();

        let stats = raw(13.5, 0, 1, Some(105.0));
        let rec = derive_task_record(&app, &task, &stats, &ring);
        assert!((rec.cpu_util - 0.7).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        let app = AppId::new("/web");
        let task = TaskId("t1".into());
        let mut ring = SampleRing::new();
        let mut tasks = HashMap::new();
        tasks.insert(task.clone(), Some(record(500.0, 1.0, 1, 0.0, 0.0)));
        let mut snap = AppSnapshot::no_definition();
        snap.tasks = Some(tasks);
        let mut m = HashMap::new();
        m.insert(app.clone(), snap);
        ring.write(m);
        ring.advance();

        let stats = raw(5.0, 0, 1, Some(2.0));
        let rec = derive_task_record(&app, &task, &stats, &ring);
        assert_eq!(rec.cpu_util, 0.0);
        assert_eq!(rec.sample_count, 2);
    }

    #[test]
    fn first_observation_has_zero_cpu_and_sample_count_one() {
        let app = AppId::new("/web");
        let task = TaskId("t1".into());
        let ring = SampleRing::new();
        let stats = raw(3.0, 50, 100, Some(10.0));
        let rec = derive_task_record(&app, &task, &stats, &ring);
        assert_eq!(rec.cpu_util, 0.0);
        assert_eq!(rec.sample_count, 1);
        assert!((rec.mem_util - 0.5).abs() < 1e-9);
    }

    #[test]
    fn running_average_cap_at_window_size() {
        let app = AppId::new("/web");
        let task = TaskId("t1".into());
        let mut ring = SampleRing::new();

        for tick in 0..6u32 {
            let stats = raw(tick as f64 * 1.0, 0, 1, Some(tick as f64 * 1.0 + 1.0));
            let rec = derive_task_record(&app, &task, &stats, &ring);
            assert!(rec.sample_count <= WINDOW_SIZE as u32);

            let mut tasks = HashMap::new();
            tasks.insert(task.clone(), Some(rec));
            let mut snap = AppSnapshot::no_definition();
            snap.tasks = Some(tasks);
            let mut m = HashMap::new();
            m.insert(app.clone(), snap);
            ring.write(m);
            ring.advance();
        }
    }
}
