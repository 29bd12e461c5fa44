//! Thread switching.
//!
//! The running thread gives up the pipeline only when it is stalled on
//! something slow and has nothing left in the execution stages. The next
//! thread is chosen round-robin among threads that are neither halted nor
//! themselves stalled; if there is none the running thread keeps the core.

use super::AtomCore;
use crate::core::pipeline::traits::Context;

impl<C: Context> AtomCore<C> {
    /// Switches to another thread if the running one is stalled.
    /// Returns the new running thread, or `None` if no switch happened.
    pub fn try_thread_switch(&mut self) -> Option<usize> {
        if !self.threads[self.running].ready_to_switch() {
            return None;
        }
        let n = self.threads.len();
        let next = (1..n)
            .map(|step| (self.running + step) % n)
            .find(|&tid| {
                let t = &self.threads[tid];
                !t.is_halted() && !t.ready_to_switch()
            })?;

        let old = self.running;
        let returned = self.threads[old].flush_fetch_queue(&mut self.shared);
        self.shared.fwdbuf.flush();
        self.running = next;
        self.shared
            .stats
            .inc(&format!("core{}.thread_switches", self.id));
        tracing::debug!(
            core = self.id,
            cycle = self.shared.cycle,
            from = old,
            to = next,
            returned,
            "thread switch"
        );
        Some(next)
    }
}
