//! One registered spawner agent: capacity accounting and its task queue.

use std::collections::VecDeque;

use masterforge_peer::Peer;
use masterforge_protocol::{SpawnId, SpawnerId, SpawnerOptions};

/// A spawn-capable agent registered with the master.
pub struct RegisteredSpawner {
    id: SpawnerId,
    owner: Peer,
    options: SpawnerOptions,
    /// Processes dispatched and not yet known dead. Incremented when the
    /// spawn command goes out (not when the OS process is confirmed up),
    /// so the window between dispatch and confirmation can't be used to
    /// oversubscribe the agent.
    running: u32,
    /// Tasks waiting to be dispatched, oldest first.
    queue: VecDeque<SpawnId>,
}

impl RegisteredSpawner {
    pub(crate) fn new(
        id: SpawnerId,
        owner: Peer,
        options: SpawnerOptions,
    ) -> Self {
        Self {
            id,
            owner,
            options,
            running: 0,
            queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> SpawnerId {
        self.id
    }

    /// The agent peer that registered this spawner.
    pub fn owner(&self) -> &Peer {
        &self.owner
    }

    pub fn options(&self) -> &SpawnerOptions {
        &self.options
    }

    pub fn running(&self) -> u32 {
        self.running
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Free capacity: `max − (running + queued)`. Unlimited spawners
    /// (`max_processes == 0`) report `u64::MAX` so they always win the
    /// least-busy ordering tie.
    pub fn free_slots(&self) -> u64 {
        if self.options.max_processes == 0 {
            return u64::MAX;
        }
        (self.options.max_processes as u64)
            .saturating_sub(self.running as u64 + self.queue.len() as u64)
    }

    /// `true` if another task may be enqueued right now.
    pub fn can_spawn_another(&self) -> bool {
        self.free_slots() > 0
    }

    /// `true` if a queued task may be dispatched right now — the
    /// re-validation the drain does at send time, counting only
    /// processes actually dispatched.
    pub(crate) fn has_free_running_slot(&self) -> bool {
        self.options.max_processes == 0
            || self.running < self.options.max_processes
    }

    pub(crate) fn enqueue(&mut self, spawn_id: SpawnId) {
        self.queue.push_back(spawn_id);
    }

    pub(crate) fn dequeue(&mut self) -> Option<SpawnId> {
        self.queue.pop_front()
    }

    pub(crate) fn remove_queued(&mut self, spawn_id: SpawnId) {
        self.queue.retain(|queued| *queued != spawn_id);
    }

    pub(crate) fn drain_queue(&mut self) -> Vec<SpawnId> {
        self.queue.drain(..).collect()
    }

    pub(crate) fn note_dispatched(&mut self) {
        self.running += 1;
    }

    pub(crate) fn note_process_gone(&mut self) {
        self.running = self.running.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use masterforge_peer::PeerConfig;
    use masterforge_protocol::{Frame, PeerId};
    use tokio::sync::mpsc;

    fn spawner(max_processes: u32) -> RegisteredSpawner {
        let (tx, _rx) = mpsc::unbounded_channel::<Frame>();
        RegisteredSpawner::new(
            SpawnerId(1),
            Peer::new(PeerId(1), tx, PeerConfig::default()),
            SpawnerOptions {
                max_processes,
                ..SpawnerOptions::default()
            },
        )
    }

    #[test]
    fn test_free_slots_counts_running_and_queued() {
        let mut s = spawner(3);
        assert_eq!(s.free_slots(), 3);

        s.enqueue(SpawnId(1));
        assert_eq!(s.free_slots(), 2);

        s.dequeue();
        s.note_dispatched();
        assert_eq!(s.free_slots(), 2);

        s.note_process_gone();
        assert_eq!(s.free_slots(), 3);
    }

    #[test]
    fn test_can_spawn_another_false_at_capacity() {
        let mut s = spawner(1);
        assert!(s.can_spawn_another());
        s.enqueue(SpawnId(1));
        assert!(!s.can_spawn_another());
    }

    #[test]
    fn test_zero_max_processes_is_unlimited() {
        let mut s = spawner(0);
        for id in 0..100 {
            s.enqueue(SpawnId(id));
        }
        assert!(s.can_spawn_another());
        assert!(s.has_free_running_slot());
        assert_eq!(s.free_slots(), u64::MAX);
    }

    #[test]
    fn test_has_free_running_slot_ignores_queue() {
        // The dispatch check only counts processes actually dispatched:
        // a deep queue alone must not block draining.
        let mut s = spawner(1);
        s.enqueue(SpawnId(1));
        s.enqueue(SpawnId(2));
        assert!(s.has_free_running_slot());

        s.note_dispatched();
        assert!(!s.has_free_running_slot());
    }

    #[test]
    fn test_remove_queued_drops_only_that_task() {
        let mut s = spawner(0);
        s.enqueue(SpawnId(1));
        s.enqueue(SpawnId(2));
        s.enqueue(SpawnId(3));

        s.remove_queued(SpawnId(2));
        assert_eq!(s.dequeue(), Some(SpawnId(1)));
        assert_eq!(s.dequeue(), Some(SpawnId(3)));
        assert_eq!(s.dequeue(), None);
    }
}
