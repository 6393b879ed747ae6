use std::time::{Duration, Instant};

use raet_packet::{PacketKind, RxPacket, TransactionIndex, TransactionKind, TxPacketBuilder};
use serde::{Deserialize, Serialize};

use crate::ctx::{StackContext, StepResult};
use crate::effect::Effect;
use crate::error::{Result, TransactionError};
use crate::timers::Timers;
use crate::wire::{self};

const REDO_PERIOD: Duration = Duration::from_millis(500);
const TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct HelloBody {
    sid: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieBody {
    challenge: String,
    sid: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct InitiateBody {
    response: String,
}

fn challenge_for(ti: u32) -> String {
    format!("cookie-{ti}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllowerState {
    AwaitCookie,
    Done,
}

/// Initiator side of the session-liveness handshake: `hello` -> `cookie`
/// -> `initiate`, committing the session on completion.
pub struct Allower {
    ti: u32,
    reid: u32,
    sid: u32,
    host: String,
    port: u16,
    state: AllowerState,
    timers: Timers,
    last_bytes: Vec<u8>,
}

impl Allower {
    pub fn start(
        now: Instant,
        ti: u32,
        reid: u32,
        ctx: &mut StackContext,
    ) -> Result<(Self, StepResult)> {
        let remote = ctx
            .registry
            .get_remote(reid)
            .ok_or(TransactionError::NotAccepted)?;
        if !remote.is_accepted() {
            return Err(TransactionError::NotAccepted);
        }
        let sid = ctx.registry.local().sid;
        if sid == 0 {
            return Err(TransactionError::NotAccepted);
        }
        let host = remote.host.clone();
        let port = remote.port;

        let header = wire::header(
            TransactionKind::Allow,
            PacketKind::Hello,
            ctx.registry.local().eid,
            reid,
            sid,
            ti,
            false,
            false,
            false,
            ctx.codecs.bk,
            ctx.codecs.fk,
            ctx.codecs.ck,
        );
        let body = serde_json::to_value(HelloBody { sid }).map_err(|e| {
            TransactionError::Packet(raet_packet::PacketError::BodyEncode(e.to_string()))
        })?;
        let bytes = TxPacketBuilder::new(header, body).pack(
            ctx.crypto.signer,
            Some(ctx.crypto.encryptor),
            Some(&remote.pubhex),
        )?;

        let allower = Self {
            ti,
            reid,
            sid,
            host: host.clone(),
            port,
            state: AllowerState::AwaitCookie,
            timers: Timers::new(now, REDO_PERIOD, TIMEOUT, MAX_RETRIES),
            last_bytes: bytes.clone(),
        };
        Ok((
            allower,
            StepResult::live(vec![Effect::Send { bytes, host, port }]),
        ))
    }

    pub fn index(&self) -> TransactionIndex {
        (self.reid, self.sid, self.ti, TransactionKind::Allow)
    }

    pub fn receive(&mut self, packet: RxPacket, ctx: &mut StackContext) -> Result<StepResult> {
        match (self.state, packet.header.pk) {
            (AllowerState::AwaitCookie, PacketKind::Cookie) => {
                let remote = ctx
                    .registry
                    .get_remote(self.reid)
                    .ok_or(TransactionError::NotAccepted)?;
                let value =
                    packet.parse_inner(ctx.crypto.verifier, Some(ctx.crypto.encryptor), &remote.verhex)?;
                let cookie: CookieBody = serde_json::from_value(value).map_err(|e| {
                    TransactionError::ParseInner(raet_packet::ParseInnerError::BodyDecode(
                        e.to_string(),
                    ))
                })?;

                let header = wire::header(
                    TransactionKind::Allow,
                    PacketKind::Initiate,
                    ctx.registry.local().eid,
                    self.reid,
                    self.sid,
                    self.ti,
                    false,
                    false,
                    false,
                    ctx.codecs.bk,
                    ctx.codecs.fk,
                    ctx.codecs.ck,
                );
                let body = serde_json::to_value(InitiateBody {
                    response: cookie.challenge,
                })
                .map_err(|e| {
                    TransactionError::Packet(raet_packet::PacketError::BodyEncode(e.to_string()))
                })?;
                let remote_pubhex = remote.pubhex.clone();
                let peer_sid = cookie.sid;
                let bytes = TxPacketBuilder::new(header, body).pack(
                    ctx.crypto.signer,
                    Some(ctx.crypto.encryptor),
                    Some(&remote_pubhex),
                )?;

                let remote = ctx.registry.get_remote_mut(self.reid).unwrap();
                remote.rsid = peer_sid;

                self.state = AllowerState::Done;
                self.last_bytes = bytes.clone();
                Ok(StepResult::done(vec![
                    Effect::Send {
                        bytes,
                        host: self.host.clone(),
                        port: self.port,
                    },
                    Effect::PersistRemote(self.reid),
                    Effect::Stat("allow_completed"),
                ]))
            }
            _ => Err(TransactionError::UnexpectedPacket),
        }
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
enum AllowentState {
    AwaitInitiate,
}

/// Correspondent side: answers `hello` with a `cookie` challenge, commits
/// the session on a matching `initiate`.
pub struct Allowent {
    ti: u32,
    reid: u32,
    sid: u32,
    host: String,
    port: u16,
    state: AllowentState,
    timers: Timers,
    last_bytes: Vec<u8>,
    challenge: String,
}

impl Allowent {
    pub fn start(
        now: Instant,
        packet: &RxPacket,
        ctx: &mut StackContext,
    ) -> Result<(Self, StepResult)> {
        if packet.header.pk != PacketKind::Hello {
            return Err(TransactionError::UnexpectedPacket);
        }
        let reid = packet.header.se;
        let remote = ctx
            .registry
            .get_remote(reid)
            .ok_or(TransactionError::NotAccepted)?;
        if !remote.is_accepted() {
            return Err(TransactionError::NotAccepted);
        }
        if ctx.registry.local().sid == 0 {
            return Err(TransactionError::NotAccepted);
        }
        let _ = packet.parse_inner(ctx.crypto.verifier, Some(ctx.crypto.encryptor), &remote.verhex)?;

        let challenge = challenge_for(packet.header.ti);
        let header = wire::header(
            TransactionKind::Allow,
            PacketKind::Cookie,
            ctx.registry.local().eid,
            reid,
            packet.header.si,
            packet.header.ti,
            true,
            false,
            false,
            ctx.codecs.bk,
            ctx.codecs.fk,
            ctx.codecs.ck,
        );
        let body = serde_json::to_value(CookieBody {
            challenge: challenge.clone(),
            sid: ctx.registry.local().sid,
        })
        .map_err(|e| TransactionError::Packet(raet_packet::PacketError::BodyEncode(e.to_string())))?;
        let remote_pubhex = remote.pubhex.clone();
        let bytes = TxPacketBuilder::new(header, body).pack(
            ctx.crypto.signer,
            Some(ctx.crypto.encryptor),
            Some(&remote_pubhex),
        )?;

        let allowent = Self {
            ti: packet.header.ti,
            reid,
            sid: packet.header.si,
            host: packet.header.sh.clone(),
            port: packet.header.sp,
            state: AllowentState::AwaitInitiate,
            timers: Timers::new(now, REDO_PERIOD, TIMEOUT, MAX_RETRIES),
            last_bytes: bytes.clone(),
            challenge,
        };
        Ok((
            allowent,
            StepResult::live(vec![Effect::Send {
                bytes,
                host: allowent.host.clone(),
                port: allowent.port,
            }]),
        ))
    }

    pub fn index(&self) -> TransactionIndex {
        (self.reid, self.sid, self.ti, TransactionKind::Allow)
    }

    pub fn receive(&mut self, packet: RxPacket, ctx: &mut StackContext) -> Result<StepResult> {
        if self.state != AllowentState::AwaitInitiate || packet.header.pk != PacketKind::Initiate {
            return Err(TransactionError::UnexpectedPacket);
        }
        let remote = ctx
            .registry
            .get_remote(self.reid)
            .ok_or(TransactionError::NotAccepted)?;
        let value =
            packet.parse_inner(ctx.crypto.verifier, Some(ctx.crypto.encryptor), &remote.verhex)?;
        let initiate: InitiateBody = serde_json::from_value(value).map_err(|e| {
            TransactionError::ParseInner(raet_packet::ParseInnerError::BodyDecode(e.to_string()))
        })?;
        if initiate.response != self.challenge {
            return Err(TransactionError::UnexpectedPacket);
        }

        let remote = ctx.registry.get_remote_mut(self.reid).unwrap();
        remote.rsid = self.sid;

        Ok(StepResult::done(vec![
            Effect::PersistRemote(self.reid),
            Effect::Stat("allow_completed"),
        ]))
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
