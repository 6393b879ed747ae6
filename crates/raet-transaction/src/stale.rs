use raet_packet::{PacketKind, PacketHeader, RxPacket, TxPacketBuilder};

use crate::ctx::StackContext;
use crate::effect::Effect;
use crate::error::Result;
use crate::wire;

/// Sends a single `nack` echoing the packet's transaction coordinates
/// back to its sender, so the sender can garbage-collect its orphan
/// transaction. Never added to the transaction table: there is nothing
/// left to do once the nack is queued.
pub fn nack_stale(packet: &RxPacket, ctx: &mut StackContext) -> Result<Vec<Effect>> {
    let reply: PacketHeader = wire::header(
        packet.header.tk,
        PacketKind::Nack,
        ctx.registry.local().eid,
        packet.header.se,
        packet.header.si,
        packet.header.ti,
        true,
        false,
        false,
        packet.header.bk,
        packet.header.fk,
        raet_packet::CoatKind::Nul,
    );
    let bytes = TxPacketBuilder::new(reply, serde_json::Value::Null)
        .pack(ctx.crypto.signer, None, None)?;
    Ok(vec![
        Effect::Send {
            bytes,
            host: packet.header.sh.clone(),
            port: packet.header.sp,
        },
        Effect::Stat("stale_nacked"),
    ])
}
