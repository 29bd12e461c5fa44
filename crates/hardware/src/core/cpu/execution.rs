//! Main Execution Loop.
//!
//! One call to [`AtomCore::runcycle`] advances the core by one cycle:
//! 1. **Cycle Start:** Per-cycle FU and port usage is cleared.
//! 2. **Miss Servicing:** Every thread's refills, page walks and dcache misses count down.
//! 3. **Pipeline:** The running thread runs its stages from commit back to fetch.
//! 4. **Scheduling:** The core may hand the pipeline to another thread.

use super::AtomCore;
use crate::core::pipeline::thread::IssueResult;
use crate::core::pipeline::traits::Context;

impl<C: Context> AtomCore<C> {
    /// Simulates one cycle. Returns false once every thread has halted.
    pub fn runcycle(&mut self) -> bool {
        self.shared.begin_cycle();
        for thread in &mut self.threads {
            thread.tick_misses(&mut self.shared);
        }

        let thread = &mut self.threads[self.running];
        let _ = thread.commit_queue(&mut self.shared);
        let _ = thread.writeback(&mut self.shared);
        let _ = thread.transfer(&self.shared);
        let _ = thread.forward(&mut self.shared);
        let _ = thread.complete(&mut self.shared);
        for _ in 0..self.issue_width {
            if thread.issue(&mut self.shared) != IssueResult::Ok {
                break;
            }
        }
        let _ = thread.frontend(&mut self.shared);
        let _ = thread.fetch(&mut self.shared);

        let _ = self.try_thread_switch();

        self.shared.stats.inc(&format!("core{}.cycles", self.id));
        self.shared.cycle += 1;
        !self.is_done()
    }

    /// Runs until every thread halts or `limit` cycles have elapsed.
    /// Returns the number of cycles simulated.
    pub fn run_until_done(&mut self, limit: u64) -> u64 {
        let start = self.shared.cycle;
        while self.shared.cycle - start < limit {
            if !self.runcycle() {
                break;
            }
        }
        let ran = self.shared.cycle - start;
        tracing::info!(core = self.id, cycles = ran, done = self.is_done(), "run finished");
        ran
    }

    /// Discards every in-flight op of every thread; each restarts at its oldest discarded op.
    pub fn flush_pipeline(&mut self) {
        for thread in &mut self.threads {
            let squashed = thread.flush_pipeline(&mut self.shared);
            tracing::debug!(core = self.id, thread = thread.tid(), squashed, "pipeline flush");
        }
        self.shared.fwdbuf.flush();
    }
}
