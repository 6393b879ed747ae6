use std::time::{Duration, Instant};

use raet_estate::{Acceptance, RemoteEstate};
use raet_packet::{PacketKind, RxPacket, TransactionIndex, TransactionKind, TxPacketBuilder};
use serde::{Deserialize, Serialize};

use crate::ctx::{StackContext, StepResult};
use crate::effect::Effect;
use crate::error::{Result, TransactionError};
use crate::timers::Timers;
use crate::wire::{self, JOIN_BK, JOIN_CK, JOIN_FK, NO_VERHEX};
use tracing::info;

const REDO_PERIOD: Duration = Duration::from_millis(500);
const TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct JoinRequestBody {
    name: String,
    verhex: String,
    pubhex: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JoinResponseBody {
    reid: u32,
    name: String,
    verhex: String,
    pubhex: String,
    acceptance: Acceptance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinerState {
    AwaitResponse,
    AwaitAckSent,
}

/// Initiator side of identity exchange: sends `request`, waits for
/// `response`, persists the peer, then sends `ack` and completes.
pub struct Joiner {
    ti: u32,
    host: String,
    port: u16,
    state: JoinerState,
    timers: Timers,
    last_bytes: Vec<u8>,
}

impl Joiner {
    /// Build and queue the initial `request`. `ti` must be unique among
    /// this stack's currently live Joiners (a random or counter-issued
    /// value).
    pub fn start(
        now: Instant,
        ti: u32,
        host: impl Into<String>,
        port: u16,
        ctx: &mut StackContext,
    ) -> Result<(Self, StepResult)> {
        let host = host.into();
        let local = ctx.registry.local();
        let body = JoinRequestBody {
            name: local.name.clone(),
            verhex: ctx.crypto.signer.verify_key_hex(),
            pubhex: ctx.crypto.encryptor.public_key_hex(),
        };
        let header = wire::header(
            TransactionKind::Join,
            PacketKind::Request,
            local.eid,
            0,
            0,
            ti,
            false,
            false,
            false,
            JOIN_BK,
            JOIN_FK,
            JOIN_CK,
        );
        let body_value = serde_json::to_value(&body).map_err(|e| {
            TransactionError::Packet(raet_packet::PacketError::BodyEncode(e.to_string()))
        })?;
        let bytes = TxPacketBuilder::new(header, body_value).pack(ctx.crypto.signer, None, None)?;

        let joiner = Self {
            ti,
            host: host.clone(),
            port,
            state: JoinerState::AwaitResponse,
            timers: Timers::new(now, REDO_PERIOD, TIMEOUT, MAX_RETRIES),
            last_bytes: bytes.clone(),
        };
        let effects = vec![
            Effect::Send { bytes, host, port },
            Effect::Stat("join_initiated"),
        ];
        Ok((joiner, StepResult::live(effects)))
    }

    pub fn index(&self) -> TransactionIndex {
        (0, 0, self.ti, TransactionKind::Join)
    }

    /// The `(host, port)` this Joiner is waiting to hear back from, used
    /// to coalesce duplicate Join initiations to the same address.
    pub fn target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn receive(&mut self, packet: RxPacket, ctx: &mut StackContext) -> Result<StepResult> {
        if self.state != JoinerState::AwaitResponse || packet.header.pk != PacketKind::Response {
            return Err(TransactionError::UnexpectedPacket);
        }

        let value = packet.parse_inner(ctx.crypto.verifier, None, NO_VERHEX)?;
        let body: JoinResponseBody = serde_json::from_value(value).map_err(|e| {
            TransactionError::ParseInner(raet_packet::ParseInnerError::BodyDecode(e.to_string()))
        })?;

        let mut effects = Vec::new();
        if ctx.registry.local().is_unbound() {
            ctx.registry.local_mut().assign_eid(body.reid);
            effects.push(Effect::PersistLocal);
        }

        let remote = RemoteEstate::new(
            body.reid,
            body.name,
            packet.header.sh.clone(),
            packet.header.sp,
            body.acceptance,
            body.verhex,
            body.pubhex,
        );
        let remote_eid = remote.eid;
        ctx.registry
            .insert_remote(remote)
            .map_err(|_| TransactionError::UnexpectedPacket)?;
        effects.push(Effect::PersistRemote(remote_eid));

        let local_eid = ctx.registry.local().eid;
        let header = wire::header(
            TransactionKind::Join,
            PacketKind::Ack,
            local_eid,
            remote_eid,
            0,
            self.ti,
            false,
            false,
            false,
            JOIN_BK,
            JOIN_FK,
            JOIN_CK,
        );
        let bytes = TxPacketBuilder::new(header, serde_json::Value::Null)
            .pack(ctx.crypto.signer, None, None)?;

        info!(reid = remote_eid, ti = self.ti, "join accepted, sending ack");
        self.state = JoinerState::AwaitAckSent;
        self.last_bytes = bytes.clone();
        effects.push(Effect::Send {
            bytes,
            host: self.host.clone(),
            port: self.port,
        });
        effects.push(Effect::Stat("join_completed"));
        Ok(StepResult::done(effects))
    }

    pub fn process(&mut self, now: Instant) -> StepResult {
        if self.timers.expired(now) {
            return StepResult::done(vec![Effect::Stat("transaction_timeout")]);
        }
        if self.timers.take_redo(now) {
            return StepResult::live(vec![Effect::Send {
                bytes: self.last_bytes.clone(),
                host: self.host.clone(),
                port: self.port,
            }]);
        }
        StepResult::live(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinentState {
    AwaitAck,
}

/// Correspondent side of identity exchange: answers an inbound `request`
/// with `response`, then waits for `ack` to complete.
pub struct Joinent {
    ti: u32,
    host: String,
    port: u16,
    state: JoinentState,
    timers: Timers,
    last_bytes: Vec<u8>,
}

impl Joinent {
    /// Handle a fresh inbound Join `request` with no matching table entry.
    /// Returns `Ok(None)` if the request is malformed in a way that can't
    /// be answered (caller should drop, not NACK).
    pub fn start(
        now: Instant,
        packet: &RxPacket,
        ctx: &mut StackContext,
    ) -> Result<(Self, StepResult)> {
        if packet.header.pk != PacketKind::Request {
            return Err(TransactionError::UnexpectedPacket);
        }
        let value = packet.parse_inner(ctx.crypto.verifier, None, NO_VERHEX)?;
        let body: JoinRequestBody = serde_json::from_value(value).map_err(|e| {
            TransactionError::ParseInner(raet_packet::ParseInnerError::BodyDecode(e.to_string()))
        })?;

        let existing = ctx
            .registry
            .fetch_by_host_port(&packet.header.sh, packet.header.sp)
            .map(|r| r.eid);

        let (reid, acceptance) = if ctx.registry.local().main {
            let eid = existing.unwrap_or_else(|| ctx.registry.next_remote_eid());
            let acceptance = if ctx.registry.auto_accept {
                Acceptance::Accepted
            } else {
                Acceptance::Pending
            };
            (eid, acceptance)
        } else if let Some(eid) = existing {
            (eid, Acceptance::Pending)
        } else {
            return Err(TransactionError::NotMain);
        };

        let remote = RemoteEstate::new(
            reid,
            body.name,
            packet.header.sh.clone(),
            packet.header.sp,
            acceptance,
            body.verhex,
            body.pubhex,
        );
        ctx.registry
            .insert_remote(remote)
            .map_err(|_| TransactionError::UnexpectedPacket)?;

        let local_eid = ctx.registry.local().eid;
        let response = JoinResponseBody {
            reid,
            name: ctx.registry.local().name.clone(),
            verhex: ctx.crypto.signer.verify_key_hex(),
            pubhex: ctx.crypto.encryptor.public_key_hex(),
            acceptance,
        };
        let header = wire::header(
            TransactionKind::Join,
            PacketKind::Response,
            local_eid,
            reid,
            0,
            packet.header.ti,
            true,
            false,
            false,
            JOIN_BK,
            JOIN_FK,
            JOIN_CK,
        );
        let body_value = serde_json::to_value(&response).map_err(|e| {
            TransactionError::Packet(raet_packet::PacketError::BodyEncode(e.to_string()))
        })?;
        let bytes = TxPacketBuilder::new(header, body_value).pack(ctx.crypto.signer, None, None)?;

        let joinent = Self {
            ti: packet.header.ti,
            host: packet.header.sh.clone(),
            port: packet.header.sp,
            state: JoinentState::AwaitAck,
            timers: Timers::new(now, REDO_PERIOD, TIMEOUT, MAX_RETRIES),
            last_bytes: bytes.clone(),
        };
        let effects = vec![
            Effect::Send {
                bytes,
                host: joinent.host.clone(),
                port: joinent.port,
            },
            Effect::PersistRemote(reid),
        ];
        Ok((joinent, StepResult::live(effects)))
    }

    pub fn index(&self) -> TransactionIndex {
        (0, 0, self.ti, TransactionKind::Join)
    }

    pub fn receive(&mut self, packet: RxPacket, _ctx: &mut StackContext) -> Result<StepResult> {
        if self.state != JoinentState::AwaitAck || packet.header.pk != PacketKind::Ack {
            return Err(TransactionError::UnexpectedPacket);
        }
        Ok(StepResult::done(vec![Effect::Stat("join_completed")]))
    }

    pub fn process(&mut self, now: Instant) -> StepResult {
        if self.timers.expired(now) {
            return StepResult::done(vec![Effect::Stat("transaction_timeout")]);
        }
        if self.timers.take_redo(now) {
            return StepResult::live(vec![Effect::Send {
                bytes: self.last_bytes.clone(),
                host: self.host.clone(),
                port: self.port,
            }]);
        }
        StepResult::live(Vec::new())
    }
}
