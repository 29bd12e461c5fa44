//! Op lifecycle.
//!
//! An op ([`AtomOp`]) is the unit the pipeline moves: up to four micro-ops of
//! one architectural instruction that issue, execute and commit together.
//! Each thread owns a fixed arena of ops ([`OpPool`]); an op's position in the
//! pipeline is its [`OpState`], and list membership (dispatch queue, commit
//! buffer) is derived from that state.
//!
//! Legal transitions:
//!
//! ```text
//! Free -> Fetched -> Dispatched -> Executing | CacheMissWait | TlbMissWait
//! TlbMissWait -> Executing | CacheMissWait
//! Executing | CacheMissWait -> Forwarding -> WaitingToWriteback -> ReadyToWriteback
//! ReadyToWriteback -> Free (commit), any -> Free (squash)
//! ```

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::common::constants::MAX_UOPS_PER_OP;
use crate::common::{Fault, Reg};
use crate::core::pipeline::signals::{MicroOp, Operands};
use crate::core::units::bru::BranchKind;
use crate::core::units::fu::PORT_ALL;

/// Index of an op within its thread's pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u8);

impl OpId {
    /// Pool slot.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pipeline position of an op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OpState {
    /// Unused pool slot.
    #[default]
    Free,
    /// In the shared fetch queue, travelling through decode.
    Fetched,
    /// In the thread's dispatch queue, waiting to issue.
    Dispatched,
    /// Issued; counting down its execution latency.
    Executing,
    /// Issued load waiting for a data-cache miss.
    CacheMissWait,
    /// Issued memory op waiting for a DTLB page walk.
    TlbMissWait,
    /// Finished; results about to be published to the forward buffer.
    Forwarding,
    /// Results published; not yet readable from the op itself.
    WaitingToWriteback,
    /// Results readable from the op; eligible for writeback and commit.
    ReadyToWriteback,
}

impl OpState {
    /// Every state, in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::Free,
        Self::Fetched,
        Self::Dispatched,
        Self::Executing,
        Self::CacheMissWait,
        Self::TlbMissWait,
        Self::Forwarding,
        Self::WaitingToWriteback,
        Self::ReadyToWriteback,
    ];

    /// Returns true if `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use OpState::{
            CacheMissWait, Dispatched, Executing, Fetched, Forwarding, Free, ReadyToWriteback,
            TlbMissWait, WaitingToWriteback,
        };
        match (self, next) {
            (Free, Fetched)
            | (Fetched, Dispatched)
            | (Dispatched, Executing | CacheMissWait | TlbMissWait)
            | (TlbMissWait, Executing | CacheMissWait)
            | (Executing | CacheMissWait, Forwarding)
            | (Forwarding, WaitingToWriteback)
            | (WaitingToWriteback, ReadyToWriteback) => true,
            (Free, Free) => false,
            (_, Free) => true,
            _ => false,
        }
    }

    /// Returns true once the op has left the dispatch queue.
    pub const fn is_issued(self) -> bool {
        !matches!(self, Self::Free | Self::Fetched | Self::Dispatched)
    }

    /// Returns true while the op holds shared resources (FUs or the bypass).
    pub const fn holds_shared(self) -> bool {
        matches!(
            self,
            Self::Executing | Self::Forwarding | Self::WaitingToWriteback
        )
    }
}

/// One op.
#[derive(Clone, Debug, Default)]
pub struct AtomOp {
    /// Per-thread sequence number; program order.
    pub uuid: u64,
    /// Owning thread.
    pub thread: usize,
    /// Program counter of the instruction.
    pub pc: u64,
    /// Pc after the instruction: fallthrough until a branch resolves.
    pub next_pc: u64,
    /// Pc fetch continued at after this op.
    pub predicted_next: u64,
    uops: [MicroOp; MAX_UOPS_PER_OP],
    num_uops: u8,
    /// First op of its instruction.
    pub som: bool,
    /// Last op of its instruction.
    pub eom: bool,
    /// Fault to raise when the op's group reaches commit.
    pub fault: Option<Fault>,
    state: OpState,
    /// Cycles until the op leaves `Executing` or `CacheMissWait`.
    pub cycles_left: u64,
    /// Source values captured at issue, per micro-op.
    pub operands: [Operands; MAX_UOPS_PER_OP],
    /// Results, per micro-op.
    pub dest_values: [Option<u64>; MAX_UOPS_PER_OP],
    /// Non-pipelined units held until completion.
    pub held_fus: u8,
    /// Issue ports every micro-op accepts.
    pub port_mask: u8,
    /// Control-flow kind, if the op ends in a branch.
    pub branch: Option<BranchKind>,
    /// Branch fetched but not yet resolved at issue.
    pub branch_unresolved: bool,
    /// Moved into the commit buffer.
    pub written_back: bool,
    /// Cycle the results entered the forward buffer.
    pub forwarded_at: u64,
    /// Micro-op waiting on a DTLB walk.
    pub resume_uop: u8,
}

impl AtomOp {
    /// Current state.
    #[inline]
    pub const fn state(&self) -> OpState {
        self.state
    }

    /// Moves the op to `next`.
    ///
    /// Illegal transitions are a pipeline bug and trip a debug assertion.
    #[inline]
    pub fn set_state(&mut self, next: OpState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal op transition {:?} -> {:?} (uuid {})",
            self.state,
            next,
            self.uuid
        );
        self.state = next;
    }

    /// Micro-ops of the op.
    #[inline]
    pub fn uops(&self) -> &[MicroOp] {
        &self.uops[..self.num_uops as usize]
    }

    /// Replaces the micro-ops. Extra micro-ops beyond the per-op limit are dropped.
    pub fn set_uops(&mut self, uops: &[MicroOp]) {
        let n = uops.len().min(MAX_UOPS_PER_OP);
        self.uops[..n].copy_from_slice(&uops[..n]);
        self.num_uops = n as u8;
        let common = uops[..n]
            .iter()
            .fold(PORT_ALL, |mask, u| mask & u.opcode.fu_info().ports);
        // Micro-ops with disjoint ports issue through either port.
        self.port_mask = if common == 0 { PORT_ALL } else { common };
        self.branch = uops[..n].iter().find_map(|u| u.opcode.branch_kind());
    }

    /// Destination registers in micro-op order.
    pub fn dests(&self) -> impl Iterator<Item = Reg> + '_ {
        self.uops().iter().filter_map(|u| u.rd)
    }

    /// Final value this op gives `reg`, if it writes it.
    pub fn value_of(&self, reg: Reg) -> Option<u64> {
        self.uops()
            .iter()
            .zip(self.dest_values.iter())
            .rev()
            .find(|(u, _)| u.rd == Some(reg))
            .and_then(|(_, v)| *v)
    }

    /// Largest static latency among the micro-ops.
    pub fn latency(&self) -> u64 {
        self.uops()
            .iter()
            .map(|u| u64::from(u.opcode.fu_info().latency))
            .max()
            .unwrap_or(1)
    }

    /// Returns true if any micro-op holds its unit across cycles.
    pub fn is_nonpipelined(&self) -> bool {
        self.uops().iter().any(|u| !u.opcode.fu_info().pipelined)
    }

    /// Resets the slot to a freshly fetched op.
    pub fn init(&mut self, uuid: u64, thread: usize, pc: u64, next_pc: u64) {
        debug_assert_eq!(self.state, OpState::Free);
        *self = Self {
            uuid,
            thread,
            pc,
            next_pc,
            predicted_next: next_pc,
            ..Self::default()
        };
        self.set_state(OpState::Fetched);
    }

    /// Returns the slot to the pool.
    pub fn free(&mut self) {
        if self.state != OpState::Free {
            self.state = OpState::Free;
        }
        self.held_fus = 0;
        self.branch_unresolved = false;
        self.written_back = false;
    }
}

impl fmt::Display for AtomOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "op#{} t{} pc={:#x} {:?}{}{}",
            self.uuid,
            self.thread,
            self.pc,
            self.state,
            if self.som { " som" } else { "" },
            if self.eom { " eom" } else { "" },
        )?;
        if let Some(fault) = self.fault {
            write!(f, " fault=({fault})")?;
        }
        Ok(())
    }
}

/// Fixed arena of ops owned by one thread.
#[derive(Clone, Debug)]
pub struct OpPool {
    ops: Vec<AtomOp>,
}

impl OpPool {
    /// Creates a pool of `capacity` free ops.
    pub fn new(capacity: usize) -> Self {
        Self {
            ops: vec![AtomOp::default(); capacity],
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.ops.len()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.count_in(OpState::Free)
    }

    /// Number of ops in `state`.
    pub fn count_in(&self, state: OpState) -> usize {
        self.ops.iter().filter(|op| op.state == state).count()
    }

    /// Returns true if any op is in one of `states`.
    pub fn any_in(&self, states: &[OpState]) -> bool {
        self.ops.iter().any(|op| states.contains(&op.state))
    }

    /// Claims a free slot as a fetched op.
    pub fn claim(&mut self, uuid: u64, thread: usize, pc: u64, next_pc: u64) -> Option<OpId> {
        let idx = self.ops.iter().position(|op| op.state == OpState::Free)?;
        self.ops[idx].init(uuid, thread, pc, next_pc);
        Some(OpId(idx as u8))
    }

    /// Live ops with their ids, in slot order.
    pub fn live(&self) -> impl Iterator<Item = (OpId, &AtomOp)> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.state != OpState::Free)
            .map(|(i, op)| (OpId(i as u8), op))
    }

    /// Ids of live ops in program order.
    pub fn program_order(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self.live().map(|(id, _)| id).collect();
        ids.sort_by_key(|id| self.ops[id.index()].uuid);
        ids
    }

    /// Ids of live ops strictly younger than `uuid`.
    pub fn younger_than(&self, uuid: u64) -> Vec<OpId> {
        self.live()
            .filter(|(_, op)| op.uuid > uuid)
            .map(|(id, _)| id)
            .collect()
    }

    /// Oldest live op not yet moved into the commit buffer.
    pub fn oldest_not_written_back(&self) -> Option<OpId> {
        self.live()
            .filter(|(_, op)| !op.written_back)
            .min_by_key(|(_, op)| op.uuid)
            .map(|(id, _)| id)
    }

    /// Oldest live op.
    pub fn oldest(&self) -> Option<&AtomOp> {
        self.live().map(|(_, op)| op).min_by_key(|op| op.uuid)
    }
}

impl Index<OpId> for OpPool {
    type Output = AtomOp;

    #[inline]
    fn index(&self, id: OpId) -> &AtomOp {
        &self.ops[id.index()]
    }
}

impl IndexMut<OpId> for OpPool {
    #[inline]
    fn index_mut(&mut self, id: OpId) -> &mut AtomOp {
        &mut self.ops[id.index()]
    }
}
