use std::collections::HashMap;
use std::time::Instant;

use raet_packet::{RxPacket, TransactionIndex};
use tracing::debug;

use crate::allow::{Allowent, Allower};
use crate::ctx::{Outcome, StackContext, StepResult};
use crate::error::Result;
use crate::join::{Joinent, Joiner};
use crate::message::Messenger;

/// A live transaction, tagged by role and kind. `Staler` is deliberately
/// absent: it is single-shot and never stored (see `stale::nack_stale`).
pub enum Transaction {
    Joiner(Joiner),
    Joinent(Joinent),
    Allower(Allower),
    Allowent(Allowent),
    Messenger(Messenger),
}

impl Transaction {
    pub fn index(&self) -> TransactionIndex {
        match self {
            Transaction::Joiner(t) => t.index(),
            Transaction::Joinent(t) => t.index(),
            Transaction::Allower(t) => t.index(),
            Transaction::Allowent(t) => t.index(),
            Transaction::Messenger(t) => t.index(),
        }
    }

    pub fn receive(&mut self, packet: RxPacket, ctx: &mut StackContext) -> Result<StepResult> {
        match self {
            Transaction::Joiner(t) => t.receive(packet, ctx),
            Transaction::Joinent(t) => t.receive(packet, ctx),
            Transaction::Allower(t) => t.receive(packet, ctx),
            Transaction::Allowent(t) => t.receive(packet, ctx),
            Transaction::Messenger(t) => t.receive(packet, ctx),
        }
    }

    pub fn process(&mut self, now: Instant) -> StepResult {
        match self {
            Transaction::Joiner(t) => t.process(now),
            Transaction::Joinent(t) => t.process(now),
            Transaction::Allower(t) => t.process(now),
            Transaction::Allowent(t) => t.process(now),
            Transaction::Messenger(t) => t.process(now),
        }
    }

    /// The address a live `Joiner` is awaiting a response from, if this
    /// is one. Used to coalesce duplicate Join initiations (§8).
    pub fn joiner_target(&self) -> Option<(&str, u16)> {
        match self {
            Transaction::Joiner(t) => Some(t.target()),
            _ => None,
        }
    }
}

/// Holds every live transaction, indexed by `(eid, sid, tid, kind)`.
#[derive(Default)]
pub struct TransactionTable {
    live: HashMap<TransactionIndex, Transaction>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self { live: HashMap::new() }
    }

    pub fn add(&mut self, transaction: Transaction) {
        self.live.insert(transaction.index(), transaction);
    }

    pub fn remove(&mut self, index: &TransactionIndex) -> Option<Transaction> {
        self.live.remove(index)
    }

    pub fn get_mut(&mut self, index: &TransactionIndex) -> Option<&mut Transaction> {
        self.live.get_mut(index)
    }

    pub fn contains(&self, index: &TransactionIndex) -> bool {
        self.live.contains_key(index)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&TransactionIndex, &mut Transaction)> {
        self.live.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransactionIndex, &Transaction)> {
        self.live.iter()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Resolve the index an inbound packet should route to. Exact
    /// `rx_index` match first; Join packets fall back to the universal
    /// bootstrap index `(0, 0, ti, Join)` since eid assignment happens
    /// mid-handshake and the sender's claimed `se` may not match what
    /// either side registered the transaction under.
    pub fn route(&self, header: &raet_packet::PacketHeader) -> Option<TransactionIndex> {
        let direct = header.rx_index();
        if self.live.contains_key(&direct) {
            return Some(direct);
        }
        if header.tk == raet_packet::TransactionKind::Join {
            let bootstrap = (0, 0, header.ti, raet_packet::TransactionKind::Join);
            if self.live.contains_key(&bootstrap) {
                return Some(bootstrap);
            }
        }
        None
    }

    /// Remove every transaction for which `process` reports `Done` or
    /// whose timeout has already fired, collecting their effects.
    pub fn process_all(&mut self, now: Instant) -> Vec<crate::effect::Effect> {
        let mut effects = Vec::new();
        let mut done = Vec::new();
        for (index, transaction) in self.live.iter_mut() {
            let step = transaction.process(now);
            effects.extend(step.effects);
            if step.outcome == Outcome::Done {
                done.push(*index);
            }
        }
        for index in done {
            debug!(?index, "transaction complete, removing from table");
            self.live.remove(&index);
        }
        effects
    }
}
