//! Fetch and dispatch.
//!
//! Fetch reads instructions from the context within one fetch block per
//! cycle, bundles them into ops, predicts branches and places the ops in the
//! shared fetch queue. Dispatch (the frontend) moves whole instructions from
//! the fetch queue into the thread's dispatch queue once they have spent the
//! decode latency in the queue.

use crate::common::constants::MAX_BRANCH_IN_FLIGHT;
use crate::common::{AccessType, VirtAddr};
use crate::core::cpu::shared::{FetchEntry, SharedResources};
use crate::core::pipeline::frontend::bundle;
use crate::core::pipeline::op::{OpId, OpState};
use crate::core::pipeline::signals::Instruction;
use crate::core::pipeline::traits::{Context, FetchOutcome};
use crate::core::units::bru::BranchKind;
use crate::core::units::mmu::PageWalk;

use super::AtomThread;

impl<C: Context> AtomThread<C> {
    fn fetch_blocked(&self) -> bool {
        self.fetch_paused
            || self.fetch_halted
            || self.fetch_stalled_on_fault
            || self.pause_counter > 0
            || self.icache_refill_left > 0
            || self.itlb_walk.is_some()
    }

    /// Fetches up to `fetch_width` ops. Returns the number fetched.
    pub fn fetch(&mut self, shared: &mut SharedResources) -> usize {
        if self.fetch_blocked() {
            return 0;
        }
        if self.fetch_fault.is_some() {
            return usize::from(self.emit_fault_op(shared));
        }

        let width = self.config.fetch_width;
        let block = self.fetch_pc / self.config.fetch_granularity;
        let mut fetched = 0;
        while fetched < width {
            let pc = self.fetch_pc;
            if pc / self.config.fetch_granularity != block {
                break;
            }
            let vaddr = VirtAddr::new(pc);
            if !shared.mmu.itlb.probe(vaddr, self.tid) {
                self.itlb_walk = Some(PageWalk::start(vaddr, self.config.tlb_walk_levels));
                self.count(shared, "itlb.misses");
                break;
            }
            let insn = match self.ctx.fetch_from_icache(vaddr) {
                FetchOutcome::Hit(insn) => insn,
                FetchOutcome::Miss => {
                    match self.ctx.translate(vaddr, AccessType::Fetch) {
                        Ok(paddr) => {
                            self.icache_refill_left =
                                shared.oracle.latency(paddr, AccessType::Fetch);
                            self.count(shared, "icache.misses");
                        }
                        Err(fault) => self.fetch_fault = Some(fault),
                    }
                    break;
                }
                FetchOutcome::Fault(fault) => {
                    self.fetch_fault = Some(fault);
                    break;
                }
                FetchOutcome::Halt => {
                    tracing::debug!(thread = self.tid, pc = format_args!("{pc:#x}"), "fetch halted");
                    self.fetch_halted = true;
                    break;
                }
            };
            match self.fetch_insn(pc, &insn, fetched, shared) {
                Some((n, kind)) => {
                    fetched += n;
                    if kind.is_some() {
                        break;
                    }
                }
                None => break,
            }
        }

        if fetched == 0 && self.fetch_fault.is_some() {
            fetched += usize::from(self.emit_fault_op(shared));
        }
        fetched
    }

    /// Places the ops of `insn` in the fetch queue and advances the fetch pc.
    ///
    /// Returns the number of ops and the branch kind, or `None` if the
    /// instruction has to wait for a later cycle.
    fn fetch_insn(
        &mut self,
        pc: u64,
        insn: &Instruction,
        fetched: usize,
        shared: &mut SharedResources,
    ) -> Option<(usize, Option<BranchKind>)> {
        let max_ops = self
            .pool
            .capacity()
            .min(shared.fetchq.capacity())
            .min(self.dispatchq.capacity())
            .min(self.commitbuf.capacity());
        let bundles = match bundle(pc, insn, max_ops) {
            Ok(bundles) => bundles,
            Err(fault) => {
                self.fetch_fault = Some(fault);
                return None;
            }
        };
        let kind = insn.branch_kind();
        if kind.is_some() && self.branches_in_flight >= MAX_BRANCH_IN_FLIGHT {
            self.count(shared, "fetch.branch_stall");
            return None;
        }
        let n = bundles.len();
        if fetched > 0 && fetched + n > self.config.fetch_width {
            return None;
        }
        if self.pool.free_count() < n || shared.fetchq.free_slots() < n {
            self.count(shared, "fetch.full");
            return None;
        }

        let fallthrough = pc.wrapping_add(u64::from(insn.len));
        let next = self.predict_next(pc, insn, kind, fallthrough);
        let ready_at = shared.cycle + self.config.frontend_stages as u64;
        for b in bundles {
            let uuid = self.next_uuid;
            self.next_uuid += 1;
            let Some(id) = self.pool.claim(uuid, self.tid, pc, fallthrough) else {
                break;
            };
            let op = &mut self.pool[id];
            op.set_uops(&b.uops);
            op.som = b.som;
            op.eom = b.eom;
            if b.eom {
                op.predicted_next = next;
                op.branch_unresolved = kind.is_some();
            }
            let _ = shared.fetchq.push(FetchEntry {
                thread: self.tid,
                op: id,
                ready_at,
            });
        }
        if kind.is_some() {
            self.branches_in_flight += 1;
        }
        self.fetch_pc = next;
        self.count_n(shared, "fetch.ops", n as u64);
        self.count(shared, "fetch.insns");
        Some((n, kind))
    }

    fn predict_next(
        &self,
        pc: u64,
        insn: &Instruction,
        kind: Option<BranchKind>,
        fallthrough: u64,
    ) -> u64 {
        let (Some(kind), Some(last)) = (kind, insn.uops.last()) else {
            return fallthrough;
        };
        let pred = self.predictor.predict(pc, kind);
        match kind {
            BranchKind::Direct => last.imm,
            BranchKind::Conditional if pred.taken => last.imm,
            BranchKind::Conditional => fallthrough,
            BranchKind::Indirect => pred.target.unwrap_or(fallthrough),
        }
    }

    /// Turns the pending fetch fault into a single faulted op so that it is
    /// raised in program order at commit. Fetch stops until the fault is handled.
    fn emit_fault_op(&mut self, shared: &mut SharedResources) -> bool {
        let Some(fault) = self.fetch_fault else {
            return false;
        };
        if self.pool.free_count() == 0 || shared.fetchq.is_full() {
            return false;
        }
        let pc = self.fetch_pc;
        let uuid = self.next_uuid;
        let Some(id) = self.pool.claim(uuid, self.tid, pc, pc) else {
            return false;
        };
        self.next_uuid += 1;
        let op = &mut self.pool[id];
        op.set_uops(&[]);
        op.som = true;
        op.eom = true;
        op.fault = Some(fault);
        let _ = shared.fetchq.push(FetchEntry {
            thread: self.tid,
            op: id,
            ready_at: shared.cycle + self.config.frontend_stages as u64,
        });
        self.fetch_fault = None;
        self.fetch_stalled_on_fault = true;
        tracing::debug!(thread = self.tid, pc = format_args!("{pc:#x}"), %fault, "fetch fault");
        true
    }

    /// Moves decoded instructions from the fetch queue to the dispatch queue.
    ///
    /// Instructions move whole; at most `fetch_width` ops per cycle unless a
    /// single instruction is wider. Returns the number of ops moved.
    pub fn frontend(&mut self, shared: &mut SharedResources) -> usize {
        let width = self.config.fetch_width;
        let mut moved = 0;
        loop {
            let Some(n) = self.ready_insn_len(shared) else {
                break;
            };
            if moved > 0 && moved + n > width {
                break;
            }
            if self.dispatchq.free_slots() < n {
                self.count(shared, "dispatch.full");
                break;
            }
            for _ in 0..n {
                if let Some(entry) = shared.fetchq.pop() {
                    let _ = self.dispatch(entry.op);
                }
            }
            moved += n;
            if moved >= width {
                break;
            }
        }
        moved
    }

    /// Number of ops of the instruction at the head of the fetch queue, if
    /// it belongs to this thread and has finished decoding.
    fn ready_insn_len(&self, shared: &SharedResources) -> Option<usize> {
        let mut n = 0;
        for entry in shared.fetchq.iter() {
            if entry.thread != self.tid || entry.ready_at > shared.cycle {
                return None;
            }
            n += 1;
            if self.pool[entry.op].eom {
                return Some(n);
            }
        }
        None
    }

    /// Places a fetched op in the dispatch queue.
    pub fn dispatch(&mut self, id: OpId) -> bool {
        if self.dispatchq.push(id).is_err() {
            return false;
        }
        self.pool[id].set_state(OpState::Dispatched);
        true
    }
}
