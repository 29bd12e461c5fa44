//! Commit.
//!
//! Retires one instruction group (the ops from `som` to `eom`) per cycle, all
//! or nothing. A group containing a faulted op instead takes the exception
//! path: everything in flight is discarded and fetch restarts at the
//! handler the context names.

use crate::common::Fault;
use crate::core::cpu::shared::SharedResources;
use crate::core::pipeline::op::OpId;
use crate::core::pipeline::signals::Opcode;
use crate::core::pipeline::traits::{Context, StoreEffect};

use super::{AtomThread, CommitResult};

impl<C: Context> AtomThread<C> {
    /// Commits the group at the head of the commit buffer, if it is complete.
    pub fn commit_queue(&mut self, shared: &mut SharedResources) -> Option<CommitResult> {
        let group = self.head_group()?;

        let faulted = group.iter().find_map(|&id| {
            let op = &self.pool[id];
            op.fault.map(|fault| (fault, op.pc))
        });
        if let Some((fault, pc)) = faulted {
            self.take_exception(fault, pc, shared);
            return None;
        }

        let (head, eom) = (group[0], group[group.len() - 1]);
        let pc = self.pool[head].pc;
        let (last_uuid, next_pc) = (self.pool[eom].uuid, self.pool[eom].next_pc);
        let mut barrier = false;
        let mut pause = false;
        for &id in &group {
            let op = &self.pool[id];
            for (uop, value) in op.uops().iter().zip(op.dest_values) {
                barrier |= uop.opcode == Opcode::Ast;
                pause |= uop.opcode == Opcode::Pause;
                if let (Some(reg), Some(value)) = (uop.rd, value) {
                    self.regs.write(reg, value);
                    if self.reg_owner[reg as usize] == Some(id) {
                        self.reg_owner[reg as usize] = None;
                    }
                }
            }
        }

        let mut smc = false;
        for entry in self.storebuf.drain_through(last_uuid) {
            if self.ctx.store(entry.paddr, entry.data, entry.size) == StoreEffect::SelfModifying {
                smc = true;
            }
        }

        for &id in &group {
            let _ = self.commitbuf.pop();
            let op = &mut self.pool[id];
            shared.release_fus(op.held_fus);
            op.free();
        }
        self.last_committed = last_uuid;
        self.count(shared, "commit.insns");
        self.count_n(shared, "commit.ops", group.len() as u64);
        tracing::trace!(
            thread = self.tid,
            pc = format_args!("{pc:#x}"),
            ops = group.len(),
            "commit"
        );

        let result = if barrier || smc {
            let _ = self.squash_after(last_uuid, shared);
            self.redirect_fetch(next_pc);
            self.fetch_paused = true;
            if smc {
                self.count(shared, "commit.smc");
                CommitResult::Smc
            } else {
                self.count(shared, "commit.barrier");
                CommitResult::Barrier
            }
        } else if self.interrupt_pending {
            self.interrupt_pending = false;
            let _ = self.squash_after(last_uuid, shared);
            let target = self.ctx.handle_interrupt(next_pc);
            self.redirect_fetch(target);
            self.count(shared, "commit.interrupt");
            tracing::debug!(
                thread = self.tid,
                next_pc = format_args!("{next_pc:#x}"),
                target = format_args!("{target:#x}"),
                "interrupt taken"
            );
            CommitResult::Interrupt
        } else {
            if pause {
                self.pause_counter = self.config.thread_pause_cycles;
            }
            self.count(shared, "commit.ok");
            CommitResult::Ok
        };
        Some(result)
    }

    /// Ops of the oldest instruction group, if all of them are in the commit buffer.
    fn head_group(&self) -> Option<Vec<OpId>> {
        let mut group = Vec::new();
        for &id in self.commitbuf.iter() {
            group.push(id);
            if self.pool[id].eom {
                return Some(group);
            }
        }
        None
    }

    /// Discards everything in flight and enters the fault handler.
    fn take_exception(&mut self, fault: Fault, pc: u64, shared: &mut SharedResources) {
        let squashed = self.squash_after(0, shared);
        self.storebuf.flush_all();
        self.issue_disabled = false;
        let target = self.ctx.handle_fault(fault, pc);
        self.redirect_fetch(target);
        self.count(shared, "exceptions");
        tracing::debug!(
            thread = self.tid,
            pc = format_args!("{pc:#x}"),
            target = format_args!("{target:#x}"),
            squashed,
            %fault,
            "exception"
        );
    }
}
