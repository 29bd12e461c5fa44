//! Per-thread pipeline.
//!
//! An [`AtomThread`] owns everything private to one hardware thread: its op
//! pool, dispatch queue, store buffer, commit buffer, register-owner table,
//! architectural register file, miss bookkeeping, branch predictor and
//! context. Everything the threads share is lent to the running one as
//! `&mut SharedResources`.
//!
//! The stages live in submodules and are driven by the core each cycle in
//! reverse pipeline order so that a value moves at most one stage per cycle:
//! 1. **Commit:** [`AtomThread::commit_queue`] retires one instruction group.
//! 2. **Writeback:** [`AtomThread::writeback`] moves the oldest finished op into the commit buffer.
//! 3. **Transfer / Forward / Complete:** results age from execution into the bypass and the op.
//! 4. **Issue:** [`AtomThread::issue`] starts the head of the dispatch queue.
//! 5. **Frontend / Fetch:** decoded ops enter the dispatch queue; new ops enter the fetch queue.
//!
//! Misses (icache refills, page walks, dcache misses, pause countdowns) are
//! serviced in [`AtomThread::tick_misses`] for every thread, running or not.

mod commit;
mod complete;
mod fetch;
mod issue;

use std::fmt;

use crate::common::constants::REG_COUNT;
use crate::common::{AccessType, Fault, Reg, RegisterFile, VirtAddr};
use crate::config::CoreConfig;
use crate::core::cpu::shared::SharedResources;
use crate::core::pipeline::op::{OpId, OpPool, OpState};
use crate::core::pipeline::ring::RingBuffer;
use crate::core::pipeline::signals::Opcode;
use crate::core::pipeline::store_buffer::StoreBuffer;
use crate::core::pipeline::traits::{BranchPredictor, Context};
use crate::core::units::bru::StaticPredictor;
use crate::core::units::mmu::PageWalk;

/// Outcome of one issue attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueResult {
    /// Issued; the next op may issue this cycle.
    Ok,
    /// Issued; nothing else may issue this cycle (branch, non-pipelined op).
    OkBlock,
    /// Issued without using an execution unit (faulted op, assist).
    OkSkip,
    /// Issued but waiting for a miss.
    CacheMiss,
    /// Nothing issued.
    Fail,
}

impl IssueResult {
    /// Stats key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::OkBlock => "block",
            Self::OkSkip => "skip",
            Self::CacheMiss => "cache_miss",
            Self::Fail => "fail",
        }
    }
}

/// What retiring an instruction group did beyond the register writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitResult {
    /// Ordinary commit.
    Ok,
    /// An assist committed; younger ops were discarded and fetch paused.
    Barrier,
    /// A store hit in-flight code; younger ops were discarded and fetch paused.
    Smc,
    /// A pending interrupt was taken after the group.
    Interrupt,
}

/// One hardware thread.
pub struct AtomThread<C> {
    tid: usize,
    stat_prefix: String,
    config: CoreConfig,
    ctx: C,
    predictor: Box<dyn BranchPredictor>,
    pub(crate) pool: OpPool,
    pub(crate) dispatchq: RingBuffer<OpId>,
    pub(crate) commitbuf: RingBuffer<OpId>,
    pub(crate) storebuf: StoreBuffer,
    reg_owner: [Option<OpId>; REG_COUNT],
    regs: RegisterFile,
    next_uuid: u64,
    last_committed: u64,
    fetch_pc: u64,
    icache_refill_left: u64,
    itlb_walk: Option<PageWalk>,
    dtlb_walk: Option<(PageWalk, OpId)>,
    fetch_fault: Option<Fault>,
    fetch_stalled_on_fault: bool,
    fetch_halted: bool,
    fetch_paused: bool,
    pause_counter: u32,
    branches_in_flight: u8,
    issue_disabled: bool,
    interrupt_pending: bool,
}

impl<C> fmt::Debug for AtomThread<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomThread")
            .field("tid", &self.tid)
            .field("fetch_pc", &format_args!("{:#x}", self.fetch_pc))
            .field("live_ops", &(self.pool.capacity() - self.pool.free_count()))
            .field("dispatchq", &self.dispatchq.len())
            .field("commitbuf", &self.commitbuf.len())
            .field("storebuf", &self.storebuf.len())
            .field("branches_in_flight", &self.branches_in_flight)
            .field("fetch_halted", &self.fetch_halted)
            .field("fetch_paused", &self.fetch_paused)
            .field("regs", &self.regs)
            .finish_non_exhaustive()
    }
}

impl<C: Context> AtomThread<C> {
    /// Creates thread `tid` of core `core_id`, fetching from pc 0.
    pub fn new(core_id: usize, tid: usize, config: &CoreConfig, ctx: C) -> Self {
        Self {
            tid,
            stat_prefix: format!("core{core_id}.thread{tid}"),
            config: config.clone(),
            ctx,
            predictor: Box::new(StaticPredictor::default()),
            pool: OpPool::new(config.ops_per_thread),
            dispatchq: RingBuffer::new(config.dispatch_queue_size),
            commitbuf: RingBuffer::new(config.commit_buffer_size),
            storebuf: StoreBuffer::new(config.store_buffer_size),
            reg_owner: [None; REG_COUNT],
            regs: RegisterFile::new(),
            // Zero is reserved so that "younger than 0" means every op.
            next_uuid: 1,
            last_committed: 0,
            fetch_pc: 0,
            icache_refill_left: 0,
            itlb_walk: None,
            dtlb_walk: None,
            fetch_fault: None,
            fetch_stalled_on_fault: false,
            fetch_halted: false,
            fetch_paused: false,
            pause_counter: 0,
            branches_in_flight: 0,
            issue_disabled: false,
            interrupt_pending: false,
        }
    }

    /// Thread id within the core.
    #[inline]
    pub const fn tid(&self) -> usize {
        self.tid
    }

    /// The thread's context.
    pub const fn ctx(&self) -> &C {
        &self.ctx
    }

    /// The thread's context, mutably.
    pub const fn ctx_mut(&mut self) -> &mut C {
        &mut self.ctx
    }

    /// Committed architectural registers.
    pub const fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    /// Committed architectural registers, mutably (for loading initial state).
    pub const fn regs_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Next pc fetch will read.
    pub const fn fetch_pc(&self) -> u64 {
        self.fetch_pc
    }

    /// The op pool.
    pub const fn ops(&self) -> &OpPool {
        &self.pool
    }

    /// Ops waiting to issue, oldest first.
    pub fn dispatch_queue(&self) -> impl Iterator<Item = OpId> + '_ {
        self.dispatchq.iter().copied()
    }

    /// Written-back ops waiting for the rest of their group, oldest first.
    pub fn commit_buffer(&self) -> impl Iterator<Item = OpId> + '_ {
        self.commitbuf.iter().copied()
    }

    /// Uuid of the last op retired; 0 before the first commit.
    pub const fn last_committed(&self) -> u64 {
        self.last_committed
    }

    /// Op currently producing `reg`, if any.
    pub fn owner_of(&self, reg: Reg) -> Option<OpId> {
        self.reg_owner[reg as usize]
    }

    /// Fetched branches not yet resolved.
    pub const fn branches_in_flight(&self) -> u8 {
        self.branches_in_flight
    }

    /// Returns true while fetch waits for [`AtomThread::resume_fetch`].
    pub const fn is_fetch_paused(&self) -> bool {
        self.fetch_paused
    }

    /// Replaces the branch predictor.
    pub fn set_branch_predictor(&mut self, predictor: Box<dyn BranchPredictor>) {
        self.predictor = predictor;
    }

    /// Lets fetch continue after a barrier or self-modifying store.
    pub const fn resume_fetch(&mut self) {
        self.fetch_paused = false;
    }

    /// Marks an interrupt to be taken at the next instruction boundary.
    pub const fn signal_interrupt(&mut self) {
        self.interrupt_pending = true;
    }

    /// Returns true while an interrupt waits for an instruction boundary.
    pub const fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    /// Restarts fetch at `pc`.
    pub const fn redirect_fetch(&mut self, pc: u64) {
        self.fetch_pc = pc;
        self.fetch_fault = None;
        self.fetch_stalled_on_fault = false;
        self.fetch_halted = false;
    }

    /// Returns true once the context has run out of instructions and every op has left.
    pub fn is_halted(&self) -> bool {
        self.fetch_halted && self.pool.free_count() == self.pool.capacity()
    }

    fn dcache_miss_pending(&self) -> bool {
        self.pool.any_in(&[OpState::CacheMissWait])
    }

    /// Returns true when the thread is waiting on something slow and has
    /// nothing left in the execution stages, so another thread may run.
    pub fn ready_to_switch(&self) -> bool {
        let blocked = self.icache_refill_left > 0
            || self.itlb_walk.is_some()
            || self.dtlb_walk.is_some()
            || self.dcache_miss_pending()
            || self.pause_counter > 0
            || self.is_halted();
        let drained = !self.pool.any_in(&[
            OpState::Executing,
            OpState::Forwarding,
            OpState::WaitingToWriteback,
        ]);
        blocked && drained
    }

    fn count(&self, shared: &mut SharedResources, key: &str) {
        shared.count(&self.stat_prefix, key);
    }

    fn count_n(&self, shared: &mut SharedResources, key: &str, n: u64) {
        shared
            .stats
            .add(&format!("{}.{key}", self.stat_prefix), n);
    }

    /// Services outstanding misses. Runs every cycle for every thread.
    pub fn tick_misses(&mut self, shared: &mut SharedResources) {
        self.icache_refill_left = self.icache_refill_left.saturating_sub(1);
        self.pause_counter = self.pause_counter.saturating_sub(1);

        let itlb_done = self.itlb_walk.as_mut().map(|walk| (walk.tick(), walk.vaddr()));
        if let Some((true, vaddr)) = itlb_done {
            self.itlb_walk = None;
            self.finish_itlb_walk(vaddr, shared);
        }

        let dtlb_done = self
            .dtlb_walk
            .as_mut()
            .map(|(walk, id)| (walk.tick(), walk.vaddr(), *id));
        if let Some((true, vaddr, id)) = dtlb_done {
            self.dtlb_walk = None;
            self.finish_dtlb_walk(id, vaddr, shared);
        }

        for i in 0..self.pool.capacity() {
            let op = &mut self.pool[OpId(i as u8)];
            if op.state() == OpState::CacheMissWait {
                op.cycles_left = op.cycles_left.saturating_sub(1);
                if op.cycles_left == 0 {
                    shared.release_fus(op.held_fus);
                    op.held_fus = 0;
                    op.set_state(OpState::Forwarding);
                }
            }
        }
    }

    fn finish_itlb_walk(&mut self, vaddr: VirtAddr, shared: &mut SharedResources) {
        match self.ctx.translate(vaddr, AccessType::Fetch) {
            Ok(_) => {
                let _ = shared.mmu.itlb.insert(vaddr, self.tid);
            }
            // Only a fault on the page fetch is still reading matters.
            Err(fault) if VirtAddr::new(self.fetch_pc).page_number() == vaddr.page_number() => {
                self.fetch_fault = Some(fault);
            }
            Err(_) => {}
        }
    }

    fn finish_dtlb_walk(&mut self, id: OpId, vaddr: VirtAddr, shared: &mut SharedResources) {
        let idx = self.pool[id].resume_uop as usize;
        let access = if self.pool[id].uops()[idx].opcode == Opcode::St {
            AccessType::Write
        } else {
            AccessType::Read
        };
        match self.ctx.translate(vaddr, access) {
            Ok(paddr) => {
                let _ = shared.mmu.dtlb.insert(vaddr, self.tid);
                let latency = self.access_memory(id, idx, vaddr, paddr, shared);
                let _ = self.enter_execution(id, latency, shared);
            }
            Err(fault) => {
                tracing::debug!(thread = self.tid, %fault, "fault after data page walk");
                self.mark_faulted(id, fault);
            }
        }
    }

    /// Routes an issued op carrying `fault` straight to commit.
    fn mark_faulted(&mut self, id: OpId, fault: Fault) {
        let op = &mut self.pool[id];
        op.fault = Some(fault);
        op.cycles_left = 1;
        op.set_state(OpState::Executing);
        self.issue_disabled = true;
    }

    /// Discards every op younger than `uuid` (every op for 0). Returns how many went.
    fn squash_after(&mut self, uuid: u64, shared: &mut SharedResources) -> usize {
        let victims = self.pool.younger_than(uuid);
        for &id in &victims {
            let op = &mut self.pool[id];
            shared.release_fus(op.held_fus);
            op.free();
        }
        let pool = &self.pool;
        self.dispatchq.retain(|id| pool[*id].state() != OpState::Free);
        self.commitbuf.retain(|id| pool[*id].state() != OpState::Free);
        let tid = self.tid;
        shared
            .fetchq
            .retain(|e| e.thread != tid || pool[e.op].state() != OpState::Free);
        self.storebuf.flush_after(uuid);
        if self
            .dtlb_walk
            .is_some_and(|(_, id)| pool[id].state() == OpState::Free)
        {
            self.dtlb_walk = None;
        }
        // Only a surviving faulted op keeps issue shut.
        self.issue_disabled = self
            .pool
            .live()
            .any(|(_, op)| op.fault.is_some() && op.state().is_issued());
        self.rebuild_reg_owners();
        self.recount_branches();
        victims.len()
    }

    /// Rebuilds register ownership from the surviving issued ops.
    fn rebuild_reg_owners(&mut self) {
        self.reg_owner = [None; REG_COUNT];
        for id in self.pool.program_order() {
            let op = &self.pool[id];
            if op.state().is_issued() && op.fault.is_none() {
                for reg in op.dests() {
                    self.reg_owner[reg as usize] = Some(id);
                }
            }
        }
    }

    fn recount_branches(&mut self) {
        let n = self.pool.live().filter(|(_, op)| op.branch_unresolved).count();
        self.branches_in_flight = u8::try_from(n).unwrap_or(u8::MAX);
    }

    /// Discards every op in flight and restarts fetch at the oldest of them.
    /// Returns the number of ops discarded.
    pub fn flush_pipeline(&mut self, shared: &mut SharedResources) -> usize {
        let restart = self.pool.oldest().map(|op| op.pc);
        let squashed = self.squash_after(0, shared);
        self.storebuf.flush_all();
        self.issue_disabled = false;
        if let Some(pc) = restart {
            self.redirect_fetch(pc);
        }
        squashed
    }

    /// Returns this thread's ops in the shared fetch queue to the pool and
    /// rewinds fetch to the oldest of them. Used when the thread loses the core.
    pub fn flush_fetch_queue(&mut self, shared: &mut SharedResources) -> usize {
        let tid = self.tid;
        let ids: Vec<OpId> = shared
            .fetchq
            .iter()
            .filter(|e| e.thread == tid)
            .map(|e| e.op)
            .collect();
        shared.fetchq.retain(|e| e.thread != tid);
        let rewind = ids
            .iter()
            .map(|&id| &self.pool[id])
            .min_by_key(|op| op.uuid)
            .map(|op| op.pc);
        for &id in &ids {
            self.pool[id].free();
        }
        if let Some(pc) = rewind {
            self.redirect_fetch(pc);
        }
        self.recount_branches();
        ids.len()
    }
}
