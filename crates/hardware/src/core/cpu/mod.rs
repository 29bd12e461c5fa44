//! Core Definition and Initialization.
//!
//! This module defines [`AtomCore`], the container for one in-order
//! multithreaded core. It coordinates the following:
//! 1. **Threads:** One [`AtomThread`] per hardware thread, each with its own context.
//! 2. **Shared Resources:** Fetch queue, forward buffer, TLBs, FU and port masks, memory timing, stats.
//! 3. **Scheduling:** Only one thread runs the pipeline per cycle; the core
//!    switches threads when the running one stalls on something slow.

/// Per-cycle orchestration.
pub mod execution;

/// Resources shared by the threads of one core.
pub mod shared;

/// Thread switching.
pub mod switch;

use crate::common::{ConfigError, VirtAddr};
use crate::config::Config;
use crate::core::pipeline::forward::ForwardBuffer;
use crate::core::pipeline::thread::AtomThread;
use crate::core::pipeline::traits::{BranchPredictor, Context, LatencyOracle};
use crate::core::units::fu::{FU_ALL, unit_names};
use crate::core::units::mmu::Tlb;
use crate::soc::memory::controller::build_oracle;
use crate::stats::StatsTree;

use self::shared::{FetchEntry, SharedResources};

/// One in-order multithreaded core.
pub struct AtomCore<C> {
    id: usize,
    threads: Vec<AtomThread<C>>,
    running: usize,
    issue_width: usize,
    shared: SharedResources,
}

impl<C> std::fmt::Debug for AtomCore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomCore")
            .field("id", &self.id)
            .field("running", &self.running)
            .field("threads", &self.threads)
            .field("shared", &self.shared)
            .finish()
    }
}

impl<C: Context> AtomCore<C> {
    /// Builds core `id` with one thread per context.
    ///
    /// The memory timing model is chosen by `config.memory`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or the
    /// number of contexts differs from `config.core.threads`.
    pub fn new(id: usize, config: &Config, contexts: Vec<C>) -> Result<Self, ConfigError> {
        config.validate()?;
        let oracle = build_oracle(&config.memory)?;
        Self::with_oracle(id, config, contexts, oracle)
    }

    /// Builds core `id` with an explicit memory timing model.
    ///
    /// # Errors
    ///
    /// Same as [`AtomCore::new`].
    pub fn with_oracle(
        id: usize,
        config: &Config,
        contexts: Vec<C>,
        oracle: Box<dyn LatencyOracle>,
    ) -> Result<Self, ConfigError> {
        config.core.validate()?;
        if contexts.len() != config.core.threads {
            return Err(ConfigError::ContextCount {
                expected: config.core.threads,
                given: contexts.len(),
            });
        }
        let threads = contexts
            .into_iter()
            .enumerate()
            .map(|(tid, ctx)| AtomThread::new(id, tid, &config.core, ctx))
            .collect();
        tracing::debug!(core = id, threads = config.core.threads, "core built");
        Ok(Self {
            id,
            threads,
            running: 0,
            issue_width: config.core.issue_width,
            shared: SharedResources::new(id, &config.core, oracle),
        })
    }

    /// Core id.
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Current cycle.
    pub const fn cycle(&self) -> u64 {
        self.shared.cycle
    }

    /// Thread currently owning the pipeline.
    pub const fn running_thread(&self) -> usize {
        self.running
    }

    /// Number of hardware threads.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Thread `tid`.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is not a thread of this core.
    pub fn thread(&self, tid: usize) -> &AtomThread<C> {
        &self.threads[tid]
    }

    /// Thread `tid`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is not a thread of this core.
    pub fn thread_mut(&mut self, tid: usize) -> &mut AtomThread<C> {
        &mut self.threads[tid]
    }

    /// Ops between fetch and dispatch, oldest first.
    pub fn fetch_queue(&self) -> impl Iterator<Item = &FetchEntry> + '_ {
        self.shared.fetchq.iter()
    }

    /// Shared forward buffer.
    pub const fn forward_buffer(&self) -> &ForwardBuffer {
        &self.shared.fwdbuf
    }

    /// Data TLB.
    pub const fn dtlb(&self) -> &Tlb {
        &self.shared.mmu.dtlb
    }

    /// Data TLB, mutably (for preloading translations).
    pub const fn dtlb_mut(&mut self) -> &mut Tlb {
        &mut self.shared.mmu.dtlb
    }

    /// Instruction TLB.
    pub const fn itlb(&self) -> &Tlb {
        &self.shared.mmu.itlb
    }

    /// Instruction TLB, mutably (for preloading translations).
    pub const fn itlb_mut(&mut self) -> &mut Tlb {
        &mut self.shared.mmu.itlb
    }

    /// Functional units held across cycles by non-pipelined micro-ops.
    pub fn held_units(&self) -> Vec<&'static str> {
        unit_names(!self.shared.fu_available & FU_ALL).collect()
    }

    /// Counters.
    pub const fn stats(&self) -> &StatsTree {
        &self.shared.stats
    }

    /// Counters, mutably (for periodic sampling).
    pub const fn stats_mut(&mut self) -> &mut StatsTree {
        &mut self.shared.stats
    }

    /// Restarts fetch of thread `tid` at `pc`.
    pub fn redirect_fetch(&mut self, tid: usize, pc: u64) {
        self.threads[tid].redirect_fetch(pc);
    }

    /// Drops every TLB entry of thread `tid`.
    pub fn flush_tlb(&mut self, tid: usize) {
        let (d, i) = self.shared.mmu.flush_thread(tid);
        tracing::debug!(core = self.id, thread = tid, dtlb = d, itlb = i, "tlb flush");
    }

    /// Drops the TLB entries of thread `tid` covering `vaddr`.
    pub fn flush_tlb_virt(&mut self, tid: usize, vaddr: u64) {
        self.shared.mmu.flush_virt(VirtAddr::new(vaddr), tid);
    }

    /// Marks an interrupt for thread `tid`; it is taken at its next instruction boundary.
    pub fn signal_interrupt(&mut self, tid: usize) {
        self.threads[tid].signal_interrupt();
    }

    /// Lets thread `tid` fetch again after a barrier or self-modifying store.
    pub fn resume_fetch(&mut self, tid: usize) {
        self.threads[tid].resume_fetch();
    }

    /// Replaces the branch predictor of thread `tid`.
    pub fn set_branch_predictor(&mut self, tid: usize, predictor: Box<dyn BranchPredictor>) {
        self.threads[tid].set_branch_predictor(predictor);
    }

    /// Returns true once every thread has halted.
    pub fn is_done(&self) -> bool {
        self.threads.iter().all(AtomThread::is_halted)
    }
}
