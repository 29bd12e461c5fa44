//! Completion, forwarding, transfer and writeback.
//!
//! After issue an op ages through four short stages:
//! `Executing -> Forwarding` when its latency has elapsed,
//! `Forwarding -> WaitingToWriteback` once its results are in the forward
//! buffer, `WaitingToWriteback -> ReadyToWriteback` one cycle later, and
//! finally into the commit buffer, oldest first, one op per cycle.

use crate::core::cpu::shared::SharedResources;
use crate::core::pipeline::forward::ForwardEntry;
use crate::core::pipeline::op::{OpId, OpState};
use crate::core::pipeline::traits::Context;

use super::AtomThread;

impl<C: Context> AtomThread<C> {
    /// Counts down executing ops. Returns how many finished.
    pub fn complete(&mut self, shared: &mut SharedResources) -> usize {
        let mut done = 0;
        for i in 0..self.pool.capacity() {
            let op = &mut self.pool[OpId(i as u8)];
            if op.state() != OpState::Executing {
                continue;
            }
            op.cycles_left = op.cycles_left.saturating_sub(1);
            if op.cycles_left == 0 {
                shared.release_fus(op.held_fus);
                op.held_fus = 0;
                op.set_state(OpState::Forwarding);
                done += 1;
            }
        }
        done
    }

    /// Publishes the results of finished ops to the forward buffer.
    pub fn forward(&mut self, shared: &mut SharedResources) -> usize {
        let now = shared.cycle;
        let mut published = 0;
        for id in self.pool.program_order() {
            let op = &mut self.pool[id];
            if op.state() != OpState::Forwarding {
                continue;
            }
            if op.fault.is_none() {
                let (thread, uuid) = (op.thread, op.uuid);
                let writes = op
                    .uops()
                    .iter()
                    .zip(op.dest_values)
                    .filter_map(|(u, v)| Some((u.rd?, v?)));
                for (reg, value) in writes {
                    let evicted = shared.fwdbuf.write(ForwardEntry {
                        reg,
                        value,
                        thread,
                        uuid,
                        written_at: now,
                    });
                    if evicted.is_some() {
                        shared.count(&self.stat_prefix, "fwdbuf.evictions");
                    }
                }
            }
            op.forwarded_at = now;
            op.set_state(OpState::WaitingToWriteback);
            published += 1;
        }
        published
    }

    /// Makes forwarded results readable from the ops themselves.
    pub fn transfer(&mut self, shared: &SharedResources) -> usize {
        let mut moved = 0;
        for i in 0..self.pool.capacity() {
            let op = &mut self.pool[OpId(i as u8)];
            if op.state() == OpState::WaitingToWriteback && op.forwarded_at < shared.cycle {
                op.set_state(OpState::ReadyToWriteback);
                moved += 1;
            }
        }
        moved
    }

    /// Moves the oldest op into the commit buffer if it is ready.
    pub fn writeback(&mut self, shared: &mut SharedResources) -> bool {
        let Some(id) = self.pool.oldest_not_written_back() else {
            return false;
        };
        if self.pool[id].state() != OpState::ReadyToWriteback || self.commitbuf.push(id).is_err() {
            return false;
        }
        self.pool[id].written_back = true;
        self.count(shared, "writeback.ops");
        true
    }
}
