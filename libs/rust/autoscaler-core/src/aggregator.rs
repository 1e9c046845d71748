//! Aggregator (spec.md §4.5): rolls per-task running averages up to a
//! sample-count-weighted per-app average. Grounded on
//! `original_source/src/autoscaler.py::compute_app_averages`.

use crate::types::AppSnapshot;

/// Computes `app_avg_cpu_util`/`app_avg_mem_util` for one app's snapshot,
/// in place, from its tasks' per-tick running averages.
pub fn aggregate_app(snapshot: &mut AppSnapshot) {
    let Some(tasks) = snapshot.tasks.as_ref() else {
        snapshot.app_avg_cpu_util = 0.0;
        snapshot.app_avg_mem_util = 0.0;
        return;
    };

    let mut num_cpu = 0.0;
    let mut num_mem = 0.0;
    let mut den = 0.0;

    for record in tasks.values().flatten() {
        let weight = f64::from(record.sample_count);
        num_cpu += weight * record.avg_cpu_util;
        num_mem += weight * record.avg_mem_util;
        den += weight;
    }

    snapshot.app_avg_cpu_util = if den > 0.0 { num_cpu / den } else { 0.0 };
    snapshot.app_avg_mem_util = if den > 0.0 { num_mem / den } else { 0.0 };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskId, TaskRecord};
    use std::collections::HashMap;

    fn record(sample_count: u32, avg_cpu: f64, avg_mem: f64) -> TaskRecord {
        TaskRecord {
            timestamp: 0.0,
            cpus_time: 0.0,
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
    fn weighting_matches_worked_example() {
        let mut tasks = HashMap::new();
        tasks.insert(TaskId("a".into()), Some(record(4, 1.0, 0.0)));
        tasks.insert(TaskId("b".into()), Some(record(2, 0.0, 0.0)));
        let mut snap = AppSnapshot::no_definition();
        snap.tasks = Some(tasks);

        aggregate_app(&mut snap);

        assert!((snap.app_avg_cpu_util - (4.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn no_valid_tasks_yields_zero() {
        let mut tasks = HashMap::new();
        tasks.insert(TaskId("a".into()), None);
        let mut snap = AppSnapshot::no_definition();
        snap.tasks = Some(tasks);

        aggregate_app(&mut snap);

        assert_eq!(snap.app_avg_cpu_util, 0.0);
        assert_eq!(snap.app_avg_mem_util, 0.0);
    }

    #[test]
    fn missing_task_map_yields_zero() {
        let mut snap = AppSnapshot::no_definition();
        aggregate_app(&mut snap);
        assert_eq!(snap.app_avg_cpu_util, 0.0);
    }
}
