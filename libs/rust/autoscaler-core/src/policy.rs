//! Policy / decision engine (spec.md §4.6): maps a per-app aggregate to a
//! scale-up or scale-down action, admission-checked against cluster-wide
//! free resource. Grounded on `original_source/src/autoscaler.py`'s
//! `scaleup_marathon_app`/`scaledown_marathon_app` and the threshold-struct
//! shape of `libs/rust/core/src/autoscaling.rs::AutoScaler`.

use crate::types::AppSnapshot;
use crate::WINDOW_SIZE;

pub const MIN_TASK_COUNT: u32 = 2;
pub const MIN_CPU_THRESHOLD: f64 = 0.10;
pub const MIN_MEM_THRESHOLD: f64 = 0.10;
pub const MAX_CPU_THRESHOLD: f64 = 0.90;
pub const MAX_MEM_THRESHOLD: f64 = 0.75;
pub const APP_MEM_SCALE_DOWN: f64 = 0.5;
pub const MAX_CPU_ALLOC: f64 = 0.5;
pub const MAX_MEM_ALLOC: f64 = 0.5;

/// The single scaling directive (if any) a tick's evaluation of one app
/// produces. Spec.md §5: at most one per app per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingAction {
    ScaleUpMemory { target_mem_mb: f64 },
    ScaleUpReplicas { target_instances: u32 },
    ScaleDownMemory { target_mem_mb: f64 },
    ScaleDownReplicas { target_instances: u32 },
    None,
}

/// Evaluates one app's aggregated snapshot against the threshold policy.
/// Pure and synchronous — admission uses the free-resource figures sampled
/// for this tick, but issuing the directive and resetting sample counts on
/// success is the caller's job (it requires the orchestrator gateway and the
/// sample ring).
pub fn evaluate_app(snapshot: &AppSnapshot, free_cpus: f64, free_mem_mb: f64) -> ScalingAction {
    // Warm-up gate (spec.md §4.6): only decide once the window is full for
    // at least one task of the app.
    if snapshot.max_samples_in_app < WINDOW_SIZE as u32 {
        return ScalingAction::None;
    }

    // Scale-up, memory first: evaluating this branch — triggered or not —
    // precludes scale-down this tick (spec.md §5 "scale-up precedes
    // scale-down").
    if snapshot.app_avg_mem_util >= MAX_MEM_THRESHOLD {
        let total_app_mem = snapshot.mem_mb * snapshot.task_count as f64;
        if free_mem_mb > 0.0 && total_app_mem / free_mem_mb < MAX_MEM_ALLOC {
            return ScalingAction::ScaleUpMemory { target_mem_mb: snapshot.mem_mb * 2.0 };
        }
        return ScalingAction::None;
    }

    if cpu_saturated(snapshot.app_avg_cpu_util) {
        if free_cpus > 0.0 && snapshot.cpus / free_cpus < MAX_CPU_ALLOC {
            return ScalingAction::ScaleUpReplicas { target_instances: snapshot.task_count as u32 + 1 };
        }
        return ScalingAction::None;
    }

    // Scale-down, memory first.
    if snapshot.app_avg_mem_util <= MIN_MEM_THRESHOLD && snapshot.task_count as u32 > MIN_TASK_COUNT {
        return ScalingAction::ScaleDownMemory { target_mem_mb: (snapshot.mem_mb * APP_MEM_SCALE_DOWN).floor() };
    }

    if snapshot.app_avg_cpu_util <= MIN_CPU_THRESHOLD && snapshot.task_count as u32 > MIN_TASK_COUNT {
        return ScalingAction::ScaleDownReplicas { target_instances: snapshot.task_count as u32 - 1 };
    }

    ScalingAction::None
}

/// Cores-aware saturation test (spec.md §4.6, flagged ambiguous in §9 —
/// preserved as specified rather than "fixed").
fn cpu_saturated(avg_cpu_util: f64) -> bool {
    avg_cpu_util > 0.5 && {
        let remainder = avg_cpu_util.rem_euclid(1.0);
        remainder >= MAX_CPU_THRESHOLD || remainder <= 1.0 - MAX_CPU_THRESHOLD
    }
}

/// Resets every task's `sample_count` to 0 in a snapshot whose app just had
/// a scaling action succeed (spec.md §4.6 "reset sample counts"): the old
/// window no longer represents the app's post-scale behavior.
pub fn reset_sample_counts(snapshot: &mut AppSnapshot) {
    if let Some(tasks) = snapshot.tasks.as_mut() {
        for record in tasks.values_mut().flatten() {
            record.sample_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskId, TaskRecord};
    use std::collections::HashMap;

    fn warm_snapshot(task_count: usize, mem_mb: f64, cpus: f64, app_avg_cpu: f64, app_avg_mem: f64) -> AppSnapshot {
        let mut snap = AppSnapshot::no_definition();
        snap.task_count = task_count;
        snap.mem_mb = mem_mb;
        snap.cpus = cpus;
        snap.app_avg_cpu_util = app_avg_cpu;
        snap.app_avg_mem_util = app_avg_mem;
        snap.max_samples_in_app = WINDOW_SIZE as u32;
        snap.tasks = Some(HashMap::new());
        snap
    }

    #[test]
    fn warm_up_gate_blocks_incomplete_window() {
        let mut snap = warm_snapshot(2, 100.0, 1.0, 0.95, 0.0);
        snap.max_samples_in_app = WINDOW_SIZE as u32 - 1;
        assert_eq!(evaluate_app(&snap, 10.0, 1000.0), ScalingAction::None);
    }

    #[test]
    fn mem_admission_allows_scale_up() {
        // app.mem_mb=100, task_count=3, free_mem_mb=1000 -> ratio 0.3 < 0.5
        let snap = warm_snapshot(3, 100.0, 1.0, 0.0, 0.80);
        assert_eq!(evaluate_app(&snap, 10.0, 1000.0), ScalingAction::ScaleUpMemory { target_mem_mb: 200.0 });
    }

    #[test]
    fn cpu_admission_blocks_scale_up_even_when_saturated() {
        // free_cpus=10, app.cpus=6 -> ratio 0.6 >= MAX_CPU_ALLOC
        let snap = warm_snapshot(2, 100.0, 6.0, 0.95, 0.0);
        assert_eq!(evaluate_app(&snap, 10.0, 1000.0), ScalingAction::None);
    }

    #[test]
    fn idle_shrink_respects_floor() {
        let snap = warm_snapshot(3, 100.0, 1.0, 0.02, 0.0);
        assert_eq!(evaluate_app(&snap, 10.0, 1000.0), ScalingAction::ScaleDownReplicas { target_instances: 2 });

        let floor_snap = warm_snapshot(2, 100.0, 1.0, 0.02, 0.0);
        assert_eq!(evaluate_app(&floor_snap, 10.0, 1000.0), ScalingAction::None);
    }

    #[test]
    fn reset_sample_counts_zeroes_every_task() {
        let mut tasks = HashMap::new();
        tasks.insert(
            TaskId("a".into()),
            Some(TaskRecord { timestamp: 0.0, cpus_time: 0.0, cpu_util: 0.0, mem_rss_bytes: 0, mem_limit_bytes: 1, mem_util: 0.0, sample_count: 4, avg_cpu_util: 0.0, avg_mem_util: 0.0 }),
        );
        tasks.insert(TaskId("b".into()), None);
        let mut snap = AppSnapshot::no_definition();
        snap.tasks = Some(tasks);

        reset_sample_counts(&mut snap);

        let tasks = snap.tasks.unwrap();
        assert_eq!(tasks[&TaskId("a".into())].unwrap().sample_count, 0);
        assert!(tasks[&TaskId("b".into())].is_none());
    }
}
