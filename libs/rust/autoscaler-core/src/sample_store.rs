//! Sample store (spec.md §4.3): a fixed-length ring of per-tick snapshots.
//! Single-writer, consulted only by the tick currently being filled — no
//! cross-slot merging happens here (spec.md §9 "Cycle-free ownership").

use crate::types::{AppId, AppSnapshot, TaskId, TaskRecord};
use crate::WINDOW_SIZE;
use std::collections::HashMap;

pub struct SampleRing {
    slots: [Option<HashMap<AppId, AppSnapshot>>; WINDOW_SIZE],
    current: usize,
    trailing: usize,
}

impl SampleRing {
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| None), current: 0, trailing: 0 }
    }

    /// The record written to the trailing slot for `(app, task)`, if any.
    pub fn prior_record(&self, app: &AppId, task: &TaskId) -> Option<TaskRecord> {
        self.slots[self.trailing]
            .as_ref()?
            .get(app)?
            .tasks
            .as_ref()?
            .get(task)
            .copied()
            .flatten()
    }

    /// Store the freshly computed snapshots in the current slot.
    pub fn write(&mut self, snapshots: HashMap<AppId, AppSnapshot>) {
        self.slots[self.current] = Some(snapshots);
    }

    /// Mutate the snapshot stored in the current slot in place (used by the
    /// policy engine to reset sample counts after a successful scaling
    /// action, spec.md §4.6).
    pub fn current_mut(&mut self) -> Option<&mut HashMap<AppId, AppSnapshot>> {
        self.slots[self.current].as_mut()
    }

    /// Rotate the ring: the slot just written becomes the trailing slot for
    /// the next tick.
    pub fn advance(&mut self) {
        self.trailing = self.current;
        self.current = (self.current + 1) % WINDOW_SIZE;
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cpus_time: f64, timestamp: f64, sample_count: u32) -> TaskRecord {
        TaskRecord {
            timestamp,
            cpus_time,
            cpu_util: 0.0,
            mem_rss_bytes: 0,
            mem_limit_bytes: 1,
            mem_util: 0.0,
            sample_count,
            avg_cpu_util: 0.0,
            avg_mem_util: 0.0,
        }
    }

    #[test]
    fn prior_record_round_trips_through_advance() {
        let mut ring = SampleRing::new();
        let app = AppId::new("/web");
        let task = TaskId("task-1".into());

        let mut snap = AppSnapshot::no_definition();
        snap.task_count = 1;
        let mut tasks = HashMap::new();
        tasks.insert(task.clone(), Some(record(10.0, 100.0, 1)));
        snap.tasks = Some(tasks);

        let mut m = HashMap::new();
        m.insert(app.clone(), snap);
        ring.write(m);

        assert!(ring.prior_record(&app, &task).is_none());

        ring.advance();
        let prior = ring.prior_record(&app, &task).expect("prior record present");
        assert_eq!(prior.cpus_time, 10.0);
    }

    #[test]
    fn ring_rotates_through_window_size_slots() {
        let mut ring = SampleRing::new();
        let app = AppId::new("/web");
        let task = TaskId("task-1".into());

        for tick in 0..(WINDOW_SIZE + 2) {
            let mut snap = AppSnapshot::no_definition();
            let mut tasks = HashMap::new();
            tasks.insert(task.clone(), Some(record(tick as f64, tick as f64, 1)));
            snap.tasks = Some(tasks);
            let mut m = HashMap::new();
            m.insert(app.clone(), snap);
            ring.write(m);
            if tick > 0 {
                let prior = ring.prior_record(&app, &task).expect("prior present");
                assert_eq!(prior.cpus_time, (tick - 1) as f64);
            }
            ring.advance();
        }
    }
}
