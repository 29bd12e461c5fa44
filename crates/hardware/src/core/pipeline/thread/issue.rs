//! Issue.
//!
//! Only the head of the dispatch queue may issue, so issue is in order. An op
//! issues when every source is available (from an earlier micro-op of the
//! same op, the register file, an owner whose results are readable, or the
//! forward buffer), an issue port and one functional unit per micro-op are
//! free, and its memory access (if any) has somewhere to go. Values are
//! computed at issue; the op then only serves out its latency.
//!
//! Branches resolve here. A mispredicted branch discards every younger op and
//! restarts fetch on the resolved path.

use crate::common::constants::MAX_UOPS_PER_OP;
use crate::common::{AccessType, Fault, PhysAddr, Reg, VirtAddr};
use crate::core::cpu::shared::SharedResources;
use crate::core::pipeline::op::{OpId, OpState};
use crate::core::pipeline::signals::{Effect, MicroOp, Opcode, Operands};
use crate::core::pipeline::store_buffer::{ForwardResult, StoreBufferEntry};
use crate::core::pipeline::traits::Context;
use crate::core::units::bru::BranchOutcome;
use crate::core::units::fu::lowest_bit;
use crate::core::units::mmu::PageWalk;

use super::{AtomThread, IssueResult};

/// Everything issue computed for an op before committing to it.
struct Evaluated {
    operands: [Operands; MAX_UOPS_PER_OP],
    values: [Option<u64>; MAX_UOPS_PER_OP],
    branch: Option<(bool, u64)>,
    mem: Option<(usize, VirtAddr)>,
    fault: Option<Fault>,
}

impl<C: Context> AtomThread<C> {
    /// Tries to issue the head of the dispatch queue.
    pub fn issue(&mut self, shared: &mut SharedResources) -> IssueResult {
        if self.dispatchq.is_empty() {
            return IssueResult::Fail;
        }
        let result = self.issue_head(shared);
        self.count(shared, &format!("issue.{}", result.name()));
        result
    }

    fn issue_head(&mut self, shared: &mut SharedResources) -> IssueResult {
        if self.issue_disabled || self.dtlb_walk.is_some() || self.dcache_miss_pending() {
            return IssueResult::Fail;
        }
        let Some(&id) = self.dispatchq.peek() else {
            return IssueResult::Fail;
        };
        if let Some(fault) = self.pool[id].fault {
            let _ = self.dispatchq.pop();
            self.mark_faulted(id, fault);
            return IssueResult::OkSkip;
        }

        let uops: Vec<MicroOp> = self.pool[id].uops().to_vec();
        let Some(eval) = self.evaluate(id, &uops, shared) else {
            self.count(shared, "issue.stall.operands");
            return IssueResult::Fail;
        };
        if let Some(fault) = eval.fault {
            let _ = self.dispatchq.pop();
            self.mark_faulted(id, fault);
            return IssueResult::OkSkip;
        }

        let Some(port) = lowest_bit(self.pool[id].port_mask & !shared.ports_used) else {
            self.count(shared, "issue.stall.port");
            return IssueResult::Fail;
        };
        let mut units = 0u8;
        let mut held = 0u8;
        for uop in &uops {
            let info = uop.opcode.fu_info();
            let candidates = info.units & shared.fu_free();
            // Micro-ops of one op may share a unit.
            let Some(fu) = lowest_bit(candidates & units).or_else(|| lowest_bit(candidates)) else {
                self.count(shared, "issue.stall.fu");
                return IssueResult::Fail;
            };
            units |= fu;
            if !info.pipelined {
                held |= fu;
            }
        }

        let mut translation = None;
        if let Some((idx, vaddr)) = eval.mem {
            let uop = uops[idx];
            let access = if uop.opcode == Opcode::St {
                AccessType::Write
            } else {
                AccessType::Read
            };
            if access.is_write() && self.storebuf.free_slots() == 0 {
                self.count(shared, "issue.stall.storebuf");
                return IssueResult::Fail;
            }
            if !access.is_write()
                && self.storebuf.forward_load(vaddr, uop.size) == ForwardResult::Stall
            {
                self.count(shared, "issue.stall.partial_forward");
                return IssueResult::Fail;
            }
            if shared.mmu.dtlb.probe(vaddr, self.tid) {
                match self.ctx.translate(vaddr, access) {
                    Ok(paddr) => {
                        if !access.is_write() && self.ctx.is_mmio(paddr) && !self.is_oldest(id) {
                            self.count(shared, "issue.stall.mmio");
                            return IssueResult::Fail;
                        }
                        translation = Some(paddr);
                    }
                    Err(fault) => {
                        let _ = self.dispatchq.pop();
                        self.mark_faulted(id, fault);
                        return IssueResult::OkSkip;
                    }
                }
            }
        }

        // Committed to issuing.
        let _ = self.dispatchq.pop();
        shared.ports_used |= port;
        shared.fu_used |= units;
        shared.fu_available &= !held;
        let op = &mut self.pool[id];
        op.operands = eval.operands;
        op.dest_values = eval.values;
        op.held_fus = held;
        let mut result = if uops.iter().any(|u| u.opcode == Opcode::Ast) {
            IssueResult::OkSkip
        } else if op.branch.is_some() || op.is_nonpipelined() {
            IssueResult::OkBlock
        } else {
            IssueResult::Ok
        };
        for reg in uops.iter().filter_map(|u| u.rd) {
            self.reg_owner[reg as usize] = Some(id);
        }

        match (eval.mem, translation) {
            (None, _) => {
                let _ = self.enter_execution(id, 0, shared);
            }
            (Some((idx, vaddr)), None) => {
                let op = &mut self.pool[id];
                op.resume_uop = idx as u8;
                op.set_state(OpState::TlbMissWait);
                self.dtlb_walk = Some((PageWalk::start(vaddr, self.config.tlb_walk_levels), id));
                self.count(shared, "dtlb.misses");
                result = IssueResult::CacheMiss;
            }
            (Some((idx, vaddr)), Some(paddr)) => {
                let latency = self.access_memory(id, idx, vaddr, paddr, shared);
                if self.enter_execution(id, latency, shared) {
                    result = IssueResult::CacheMiss;
                }
            }
        }

        if let Some((taken, next_pc)) = eval.branch {
            self.resolve_branch(id, taken, next_pc, shared);
        }
        result
    }

    /// Computes every micro-op of `id`, or returns `None` if a source is not available yet.
    fn evaluate(&self, id: OpId, uops: &[MicroOp], shared: &SharedResources) -> Option<Evaluated> {
        let op = &self.pool[id];
        let fallthrough = op.next_pc;
        let mut eval = Evaluated {
            operands: [Operands::default(); MAX_UOPS_PER_OP],
            values: [None; MAX_UOPS_PER_OP],
            branch: None,
            mem: None,
            fault: None,
        };
        for (i, uop) in uops.iter().enumerate() {
            let read = |reg: Option<Reg>| -> Option<Option<u64>> {
                match reg {
                    None => Some(None),
                    Some(r) => self.source(&uops[..i], &eval.values[..i], r, shared).map(Some),
                }
            };
            let a = read(uop.ra)?.unwrap_or(0);
            let b = read(uop.rb)?.unwrap_or(uop.imm);
            let c = read(uop.rc)?.unwrap_or(0);
            let operands = Operands { a, b, c };
            eval.operands[i] = operands;
            match uop.evaluate(operands, fallthrough) {
                Effect::Value(v) => eval.values[i] = uop.rd.map(|_| v.unwrap_or(0)),
                Effect::Branch { taken, next_pc } => {
                    eval.branch = Some((taken, next_pc));
                    // Calls link through `rd`.
                    eval.values[i] = uop.rd.map(|_| fallthrough);
                }
                Effect::Mem(vaddr) => eval.mem = Some((i, VirtAddr::new(vaddr))),
                Effect::DivideByZero => {
                    eval.fault = Some(Fault::DivideError { pc: op.pc });
                    break;
                }
            }
        }
        Some(eval)
    }

    /// Value of `reg` as seen by a micro-op preceded by `earlier` in its own op.
    fn source(
        &self,
        earlier: &[MicroOp],
        earlier_values: &[Option<u64>],
        reg: Reg,
        shared: &SharedResources,
    ) -> Option<u64> {
        if let Some(pos) = earlier.iter().rposition(|u| u.rd == Some(reg)) {
            return Some(earlier_values[pos].unwrap_or(0));
        }
        let Some(owner) = self.reg_owner[reg as usize] else {
            return Some(self.regs.read(reg));
        };
        let op = &self.pool[owner];
        if op.state() == OpState::ReadyToWriteback {
            return Some(op.value_of(reg).unwrap_or(0));
        }
        shared.fwdbuf.read(reg, self.tid, op.uuid, shared.cycle)
    }

    fn is_oldest(&self, id: OpId) -> bool {
        self.pool.oldest().is_some_and(|op| op.uuid == self.pool[id].uuid)
    }

    /// Performs the memory micro-op `idx` of `id`. Returns the oracle latency
    /// of a load that went to memory, zero otherwise.
    pub(super) fn access_memory(
        &mut self,
        id: OpId,
        idx: usize,
        vaddr: VirtAddr,
        paddr: PhysAddr,
        shared: &mut SharedResources,
    ) -> u64 {
        let op = &self.pool[id];
        let uop = op.uops()[idx];
        let uuid = op.uuid;
        if uop.opcode == Opcode::St {
            let data = op.operands[idx].c;
            let mmio = self.ctx.is_mmio(paddr);
            let entry = StoreBufferEntry::new(uuid, vaddr, paddr, data, uop.size, mmio);
            // Issue checked for a free slot; nothing issues during a page walk.
            let allocated = self.storebuf.allocate(entry).is_ok();
            debug_assert!(allocated, "store buffer full for op {uuid}");
            return 0;
        }

        let (value, latency) = match self.storebuf.forward_load(vaddr, uop.size) {
            ForwardResult::Hit(value) => {
                self.count(shared, "dcache.forwarded");
                (value, 0)
            }
            ForwardResult::Miss | ForwardResult::Stall => (
                self.ctx.load(paddr, uop.size),
                shared.oracle.latency(paddr, AccessType::Read),
            ),
        };
        let op = &mut self.pool[id];
        if uop.rd.is_some() {
            op.dest_values[idx] = Some(value);
        }
        latency
    }

    /// Starts the op's execution countdown. A load whose latency exceeds a
    /// cache hit waits out the miss instead. Returns true for a miss.
    pub(super) fn enter_execution(
        &mut self,
        id: OpId,
        latency: u64,
        shared: &mut SharedResources,
    ) -> bool {
        let miss = latency > self.config.dcache_hit_latency;
        let op = &mut self.pool[id];
        if miss {
            op.cycles_left = latency;
            op.set_state(OpState::CacheMissWait);
            self.count(shared, "dcache.misses");
        } else {
            op.cycles_left = op.latency();
            op.set_state(OpState::Executing);
        }
        miss
    }

    fn resolve_branch(&mut self, id: OpId, taken: bool, next_pc: u64, shared: &mut SharedResources) {
        let op = &mut self.pool[id];
        let Some(kind) = op.branch else {
            return;
        };
        op.next_pc = next_pc;
        let mispredicted = next_pc != op.predicted_next;
        let (uuid, pc) = (op.uuid, op.pc);
        if op.branch_unresolved {
            op.branch_unresolved = false;
            self.branches_in_flight = self.branches_in_flight.saturating_sub(1);
        }
        self.predictor.update(&BranchOutcome {
            pc,
            kind,
            taken,
            target: next_pc,
            mispredicted,
        });
        self.count(shared, "branch.resolved");
        if mispredicted {
            let squashed = self.squash_after(uuid, shared);
            self.redirect_fetch(next_pc);
            self.count(shared, "branch.mispredicts");
            tracing::trace!(
                thread = self.tid,
                pc = format_args!("{pc:#x}"),
                target = format_args!("{next_pc:#x}"),
                squashed,
                "branch mispredict"
            );
        }
    }
}
