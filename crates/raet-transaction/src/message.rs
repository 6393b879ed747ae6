use std::time::{Duration, Instant};

use raet_packet::{PacketKind, RxPacket, TransactionIndex, TransactionKind, TxPacketBuilder};

use crate::ctx::{StackContext, StepResult};
use crate::effect::{Delivery, Effect};
use crate::error::{Result, TransactionError};
use crate::timers::Timers;
use crate::wire;

const REDO_PERIOD: Duration = Duration::from_millis(500);
const TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessengerState {
    AwaitAck,
    Done,
}

/// Initiator side of reliable application delivery. Completes immediately
/// after the first send unless `wf` (wait-for-ack) is set and the message
/// isn't a broadcast.
pub struct Messenger {
    ti: u32,
    reid: u32,
    sid: u32,
    host: String,
    port: u16,
    bf: bool,
    wf: bool,
    state: MessengerState,
    timers: Timers,
    last_bytes: Vec<u8>,
}

impl Messenger {
    pub fn start(
        now: Instant,
        ti: u32,
        reid: u32,
        body: serde_json::Value,
        bf: bool,
        wf: bool,
        ctx: &mut StackContext,
    ) -> Result<(Self, StepResult)> {
        let (host, port, pubhex, sid) = if bf {
            (String::new(), 0u16, String::new(), ctx.registry.local().sid)
        } else {
            let remote = ctx
                .registry
                .get_remote(reid)
                .ok_or(TransactionError::NotAccepted)?;
            if !remote.is_accepted() {
                return Err(TransactionError::NotAccepted);
            }
            (remote.host.clone(), remote.port, remote.pubhex.clone(), remote.rsid)
        };

        let header = wire::header(
            TransactionKind::Message,
            PacketKind::Message,
            ctx.registry.local().eid,
            reid,
            sid,
            ti,
            false,
            bf,
            wf,
            ctx.codecs.bk,
            ctx.codecs.fk,
            ctx.codecs.ck,
        );
        let bytes = if bf {
            TxPacketBuilder::new(header, body).pack(ctx.crypto.signer, None, None)?
        } else {
            TxPacketBuilder::new(header, body).pack(
                ctx.crypto.signer,
                Some(ctx.crypto.encryptor),
                Some(&pubhex),
            )?
        };

        let wait = wf && !bf;
        let messenger = Self {
            ti,
            reid,
            sid,
            host: host.clone(),
            port,
            bf,
            wf,
            state: if wait { MessengerState::AwaitAck } else { MessengerState::Done },
            timers: Timers::new(now, REDO_PERIOD, TIMEOUT, MAX_RETRIES),
            last_bytes: bytes.clone(),
        };

        let send = Effect::Send { bytes, host, port };
        let result = if wait {
            StepResult::live(vec![send, Effect::Stat("message_sent")])
        } else {
            StepResult::done(vec![send, Effect::Stat("message_sent")])
        };
        Ok((messenger, result))
    }

    pub fn index(&self) -> TransactionIndex {
        (self.reid, self.sid, self.ti, TransactionKind::Message)
    }

    pub fn receive(&mut self, packet: RxPacket, _ctx: &mut StackContext) -> Result<StepResult> {
        if self.state != MessengerState::AwaitAck || packet.header.pk != PacketKind::Ack {
            return Err(TransactionError::UnexpectedPacket);
        }
        Ok(StepResult::done(vec![Effect::Stat("message_acked")]))
    }

    pub fn process(&mut self, now: Instant) -> StepResult {
        if self.state == MessengerState::Done {
            return StepResult::done(Vec::new());
        }
        if self.timers.expired(now) {
            let failure = Delivery::Failed {
                to: self.reid,
                reason: "ack timeout".to_string(),
            };
            return StepResult::done(vec![
                Effect::Deliver(failure),
                Effect::Stat("transaction_timeout"),
            ]);
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

/// Correspondent side: decodes the body, delivers to the application
/// inbox, and acks unless the sender marked the message a broadcast.
pub struct Messengent;

impl Messengent {
    /// Single-shot: there is no further state to carry once the ack (if
    /// any) is queued, so this never gets inserted into the table.
    pub fn handle(
        packet: &RxPacket,
        decoded: serde_json::Value,
        ctx: &mut StackContext,
    ) -> Result<Vec<Effect>> {
        let mut effects = vec![
            Effect::Deliver(Delivery::Message {
                from: packet.header.se,
                body: decoded,
            }),
            Effect::Stat("message_delivered"),
        ];

        if !packet.header.bf {
            let header = wire::header(
                TransactionKind::Message,
                PacketKind::Ack,
                ctx.registry.local().eid,
                packet.header.se,
                packet.header.si,
                packet.header.ti,
                true,
                false,
                false,
                ctx.codecs.bk,
                ctx.codecs.fk,
                ctx.codecs.ck,
            );
            let bytes = if packet.header.ck == raet_packet::CoatKind::Nul {
                TxPacketBuilder::new(header, serde_json::Value::Null)
                    .pack(ctx.crypto.signer, None, None)?
            } else {
                let remote = ctx.registry.get_remote(packet.header.se);
                let pubhex = remote.map(|r| r.pubhex.clone()).unwrap_or_default();
                TxPacketBuilder::new(header, serde_json::Value::Null).pack(
                    ctx.crypto.signer,
                    Some(ctx.crypto.encryptor),
                    Some(&pubhex),
                )?
            };
            effects.push(Effect::Send {
                bytes,
                host: packet.header.sh.clone(),
                port: packet.header.sp,
            });
        }

        Ok(effects)
    }
}
