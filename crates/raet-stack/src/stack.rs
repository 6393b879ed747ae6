use std::collections::{BTreeMap, VecDeque};
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use raet_crypto::{KeyPairBundle, NaclLikeCrypto};
use raet_estate::{Acceptance, EstateRegistry, LocalEstate, RemoteEstate};
use raet_keep::{
    KeepPaths, RoadRecordLocal, RoadRecordRemote, SafeRecordLocal, SafeRecordRemote, ROAD_PREFIX,
    SAFE_PREFIX,
};
use raet_packet::{RxPacket, TransactionKind, UDP_MAX_PACKET_SIZE};
use raet_transaction::{
    nack_stale, Allowent, Allower, CodecDefaults, Joinent, Joiner, Messenger, Messengent, Outcome,
    StackContext, StackCrypto, Transaction, TransactionTable,
};
use tracing::{debug, info, warn};

use crate::config::StackConfig;
use crate::delivery::{self, Inbox};
use crate::error::{RaetError, Result};
use crate::stats::{StackStats, StackStatsSnapshot};

/// Owns the socket, the estate registry, the transaction table, and the
/// keep store. The single entry point, `service()`, runs one cooperative
/// tick of the driver described in the protocol's RoadStack Driver module.
pub struct RoadStack {
    socket: UdpSocket,
    registry: EstateRegistry,
    table: TransactionTable,
    rxes: VecDeque<(Vec<u8>, SocketAddr)>,
    txes: VecDeque<(Vec<u8>, SocketAddr)>,
    tx_msgs: VecDeque<(serde_json::Value, u32)>,
    stats: StackStats,
    keep: KeepPaths,
    config: StackConfig,
    crypto: NaclLikeCrypto,
    delivery_tx: std::sync::mpsc::Sender<raet_transaction::Delivery>,
    next_ti: u32,
}

fn build_local_estate(keep: &KeepPaths, config: &StackConfig) -> Result<LocalEstate> {
    let road = keep.load_local::<RoadRecordLocal>(ROAD_PREFIX)?;
    let safe = keep.load_local::<SafeRecordLocal>(SAFE_PREFIX)?;
    if let (Some(road), Some(safe)) = (road, safe) {
        let keys = KeyPairBundle::from_hex(&safe.sighex, &safe.prihex)?;
        return Ok(LocalEstate {
            eid: road.eid,
            name: road.name,
            host: road.host,
            port: road.port,
            sid: road.sid,
            main: road.main,
            keys,
        });
    }

    let mut local = LocalEstate::new(config.name.clone(), config.main, config.host.clone(), config.port);
    if config.eid != 0 {
        local.assign_eid(config.eid);
    }
    Ok(local)
}

fn load_remotes_into(keep: &KeepPaths, registry: &mut EstateRegistry) -> Result<()> {
    let roads: BTreeMap<String, RoadRecordRemote> = keep.load_all_remote(ROAD_PREFIX)?;
    let safes: BTreeMap<String, SafeRecordRemote> = keep.load_all_remote(SAFE_PREFIX)?;

    for (uid, road) in roads {
        let Some(safe) = safes.get(&uid) else {
            continue;
        };
        let acceptance = match safe.acceptance.as_str() {
            "accepted" => Acceptance::Accepted,
            "rejected" => Acceptance::Rejected,
            _ => Acceptance::Pending,
        };
        let mut remote = RemoteEstate::new(
            road.uid,
            road.name.clone(),
            road.host.clone(),
            road.port,
            acceptance,
            safe.verhex.clone(),
            safe.pubhex.clone(),
        );
        remote.sid = road.sid;
        remote.rsid = road.rsid;
        if registry.insert_remote(remote).is_err() {
            warn!(uid = %uid, "skipping remote record with colliding name/address on restore");
        }
    }
    Ok(())
}

fn bind_socket(config: &StackConfig) -> Result<UdpSocket> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| RaetError::BadAddress(format!("{}:{}", config.host, config.port)))?;
    let socket = UdpSocket::bind(addr).map_err(|source| RaetError::Bind { addr, source })?;
    socket.set_nonblocking(true)?;

    // Best-effort: size the kernel receive buffer for `bufcnt` max-size
    // datagrams. Not every platform honors this; failure is not fatal.
    let sock2 = socket2::Socket::from(socket);
    let _ = sock2.set_recv_buffer_size(config.bufcnt * UDP_MAX_PACKET_SIZE);
    Ok(sock2.into())
}

impl RoadStack {
    pub fn new(config: StackConfig) -> Result<(Self, Inbox)> {
        let keep = KeepPaths::new(&config.dirpath, &config.name)?;
        let local = build_local_estate(&keep, &config)?;
        let socket = bind_socket(&config)?;

        let mut registry = EstateRegistry::new(local, config.auto_accept);
        load_remotes_into(&keep, &mut registry)?;

        let crypto_bundle =
            KeyPairBundle::from_hex(&registry.local().keys.sighex(), &registry.local().keys.prihex())?;
        let crypto = NaclLikeCrypto::new(crypto_bundle);

        let (delivery_tx, inbox) = delivery::channel();

        let mut stack = Self {
            socket,
            registry,
            table: TransactionTable::new(),
            rxes: VecDeque::new(),
            txes: VecDeque::new(),
            tx_msgs: VecDeque::new(),
            stats: StackStats::default(),
            keep,
            config,
            crypto,
            delivery_tx,
            next_ti: 1,
        };

        stack.dump_local()?;
        stack.dump_remotes()?;

        info!(
            eid = stack.registry.local().eid,
            name = %stack.registry.local().name,
            main = stack.registry.local().main,
            "stack constructed"
        );
        Ok((stack, inbox))
    }

    fn next_ti(&mut self) -> u32 {
        let ti = self.next_ti;
        self.next_ti = self.next_ti.wrapping_add(1).max(1);
        ti
    }

    fn codec_defaults(&self) -> CodecDefaults {
        CodecDefaults {
            hk: self.config.hk,
            bk: self.config.bk,
            fk: self.config.fk,
            ck: self.config.ck,
            bf: self.config.bf,
            wf: self.config.wf,
        }
    }

    fn context(&mut self) -> StackContext<'_> {
        let codecs = self.codec_defaults();
        StackContext {
            registry: &mut self.registry,
            crypto: StackCrypto {
                signer: &self.crypto,
                verifier: &self.crypto,
                encryptor: &self.crypto,
            },
            codecs,
        }
    }

    /// Initiate identity exchange with the main estate at `mha`. Coalesces
    /// with an already-live Joiner targeting the same address.
    pub fn join(&mut self, mha: Option<SocketAddr>) -> Result<()> {
        let addr = mha.ok_or(RaetError::NoJoinTarget)?;
        let host = addr.ip().to_string();
        let port = addr.port();

        if self
            .table
            .iter()
            .any(|(_, t)| t.joiner_target() == Some((host.as_str(), port)))
        {
            debug!(%addr, "join already in flight, coalescing");
            return Ok(());
        }

        let ti = self.next_ti();
        let mut ctx = self.context();
        let (joiner, step) = Joiner::start(Instant::now(), ti, host, port, &mut ctx)?;
        self.apply(step.effects);
        self.table.add(Transaction::Joiner(joiner));
        Ok(())
    }

    /// Initiate the Allow session-liveness handshake with an already
    /// accepted remote. Defaults to the first known remote if `reid` is
    /// omitted.
    pub fn allow(&mut self, reid: Option<u32>) -> Result<()> {
        let reid = match reid {
            Some(reid) => reid,
            None => self
                .registry
                .all_remotes()
                .next()
                .map(|r| r.eid)
                .ok_or(RaetError::UnknownRemote(0))?,
        };

        let ti = self.next_ti();
        let mut ctx = self.context();
        let (allower, step) = Allower::start(Instant::now(), ti, reid, &mut ctx)?;
        self.apply(step.effects);
        self.table.add(Transaction::Allower(allower));
        Ok(())
    }

    /// Queue an application message for delivery to `deid` (0 = broadcast
    /// to every known remote). Actually sent on the next `service()` tick.
    pub fn transmit(&mut self, body: serde_json::Value, deid: u32) {
        self.tx_msgs.push_back((body, deid));
    }

    pub fn local(&self) -> &LocalEstate {
        self.registry.local()
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemoteEstate> {
        self.registry.all_remotes()
    }

    pub fn stats(&self) -> StackStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dump_local(&self) -> Result<()> {
        let local = self.registry.local();
        let road = RoadRecordLocal {
            eid: local.eid,
            name: local.name.clone(),
            main: local.main,
            host: local.host.clone(),
            port: local.port,
            sid: local.sid,
        };
        let safe = SafeRecordLocal {
            eid: local.eid,
            name: local.name.clone(),
            sighex: local.keys.sighex(),
            prihex: local.keys.prihex(),
        };
        self.keep.dump_local(ROAD_PREFIX, &road)?;
        self.keep.dump_local(SAFE_PREFIX, &safe)?;
        Ok(())
    }

    pub fn load_local(&mut self) -> Result<()> {
        let road = self.keep.load_local::<RoadRecordLocal>(ROAD_PREFIX)?;
        let safe = self.keep.load_local::<SafeRecordLocal>(SAFE_PREFIX)?;
        if let (Some(road), Some(safe)) = (road, safe) {
            let keys = KeyPairBundle::from_hex(&safe.sighex, &safe.prihex)?;
            let local = self.registry.local_mut();
            local.eid = road.eid;
            local.name = road.name;
            local.main = road.main;
            local.host = road.host;
            local.port = road.port;
            local.sid = road.sid;
            local.keys = keys;
        }
        Ok(())
    }

    pub fn clear_local(&self) -> Result<()> {
        self.keep.clear_local(ROAD_PREFIX)?;
        self.keep.clear_local(SAFE_PREFIX)?;
        Ok(())
    }

    pub fn dump_remote(&self, uid: u32) -> Result<()> {
        let remote = self.registry.get_remote(uid).ok_or(RaetError::UnknownRemote(uid))?;
        let road = RoadRecordRemote {
            uid: remote.eid,
            name: remote.name.clone(),
            host: remote.host.clone(),
            port: remote.port,
            sid: remote.sid,
            rsid: remote.rsid,
        };
        let safe = SafeRecordRemote {
            eid: remote.eid,
            name: remote.name.clone(),
            acceptance: remote.acceptance.as_str().to_string(),
            verhex: remote.verhex.clone(),
            pubhex: remote.pubhex.clone(),
        };
        let key = uid.to_string();
        self.keep.dump_remote(ROAD_PREFIX, &key, &road)?;
        self.keep.dump_remote(SAFE_PREFIX, &key, &safe)?;
        Ok(())
    }

    pub fn dump_remotes(&self) -> Result<()> {
        let eids: Vec<u32> = self.registry.all_remotes().map(|r| r.eid).collect();
        for eid in eids {
            self.dump_remote(eid)?;
        }
        Ok(())
    }

    pub fn load_remotes(&mut self) -> Result<()> {
        load_remotes_into(&self.keep, &mut self.registry)
    }

    pub fn clear_remote(&self, uid: u32) -> Result<()> {
        let key = uid.to_string();
        self.keep.clear_remote(ROAD_PREFIX, &key)?;
        self.keep.clear_remote(SAFE_PREFIX, &key)?;
        Ok(())
    }

    pub fn clear_all_remote(&self) -> Result<()> {
        self.keep.clear_all_remote(ROAD_PREFIX)?;
        self.keep.clear_all_remote(SAFE_PREFIX)?;
        Ok(())
    }

    /// Run one cooperative tick: drain the socket, service inbound
    /// packets, advance every live transaction's timers, start new
    /// outbound Messages, then drain the send queue.
    pub fn service(&mut self) -> Result<()> {
        self.drain_socket()?;
        self.service_rxes();
        self.process_transactions(Instant::now());
        self.service_tx_msgs();
        self.drain_tx_queue()?;
        Ok(())
    }

    fn drain_socket(&mut self) -> Result<()> {
        let mut buf = [0u8; UDP_MAX_PACKET_SIZE];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, addr)) => self.rxes.push_back((buf[..n].to_vec(), addr)),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn service_rxes(&mut self) {
        while let Some((bytes, addr)) = self.rxes.pop_front() {
            let mut packet = match RxPacket::parse_outer(&bytes) {
                Ok(packet) => packet,
                Err(e) => {
                    self.stats.bump("parsing_outer_error");
                    debug!(error = %e, %addr, "dropping malformed packet");
                    continue;
                }
            };

            let local_eid = self.registry.local().eid;
            if packet.header.de != 0 && local_eid != 0 && packet.header.de != local_eid {
                self.stats.bump("invalid_destination");
                continue;
            }

            packet.header.sh = addr.ip().to_string();
            packet.header.sp = addr.port();
            packet.header.dh = self.config.host.clone();
            packet.header.dp = self.config.port;

            self.process_rx(packet);
        }
    }

    fn process_rx(&mut self, packet: RxPacket) {
        if let Some(index) = self.table.route(&packet.header) {
            let codecs = self.codec_defaults();
            let crypto = &self.crypto;
            let mut ctx = StackContext {
                registry: &mut self.registry,
                crypto: StackCrypto {
                    signer: crypto,
                    verifier: crypto,
                    encryptor: crypto,
                },
                codecs,
            };
            let Some(transaction) = self.table.get_mut(&index) else {
                return;
            };
            let result = transaction.receive(packet, &mut ctx);
            match result {
                Ok(step) => {
                    let outcome = step.outcome;
                    self.apply(step.effects);
                    if outcome == Outcome::Done {
                        self.table.remove(&index);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "transaction rejected inbound packet");
                }
            }
            return;
        }

        if packet.header.cf {
            let mut ctx = self.context();
            match nack_stale(&packet, &mut ctx) {
                Ok(effects) => self.apply(effects),
                Err(e) => warn!(error = %e, "failed to nack stale packet"),
            }
            return;
        }

        self.spawn_correspondent(packet);
    }

    fn spawn_correspondent(&mut self, packet: RxPacket) {
        let now = Instant::now();
        match packet.header.tk {
            TransactionKind::Join => {
                let mut ctx = self.context();
                match Joinent::start(now, &packet, &mut ctx) {
                    Ok((joinent, step)) => {
                        let outcome = step.outcome;
                        self.apply(step.effects);
                        if outcome == Outcome::Live {
                            self.table.add(Transaction::Joinent(joinent));
                        }
                    }
                    Err(e) => warn!(error = %e, "join request rejected"),
                }
            }
            TransactionKind::Allow => {
                let mut ctx = self.context();
                match Allowent::start(now, &packet, &mut ctx) {
                    Ok((allowent, step)) => {
                        let outcome = step.outcome;
                        self.apply(step.effects);
                        if outcome == Outcome::Live {
                            self.table.add(Transaction::Allowent(allowent));
                        }
                    }
                    Err(e) => warn!(error = %e, "allow hello rejected"),
                }
            }
            TransactionKind::Message => {
                let Some(remote) = self.registry.get_remote(packet.header.se) else {
                    debug!(se = packet.header.se, "message from unknown remote, dropping");
                    return;
                };
                let verhex = remote.verhex.clone();
                let mut ctx = self.context();
                match packet.parse_inner(ctx.crypto.verifier, Some(ctx.crypto.encryptor), &verhex) {
                    Ok(value) => match Messengent::handle(&packet, value, &mut ctx) {
                        Ok(effects) => self.apply(effects),
                        Err(e) => warn!(error = %e, "failed to ack message"),
                    },
                    Err(_) => self.stats.bump("parsing_inner_error"),
                }
            }
            TransactionKind::Stale => {
                debug!("ignoring unsolicited stale packet with no matching transaction");
            }
        }
    }

    fn process_transactions(&mut self, now: Instant) {
        let effects = self.table.process_all(now);
        self.apply(effects);
    }

    fn service_tx_msgs(&mut self) {
        while let Some((body, deid)) = self.tx_msgs.pop_front() {
            let bf = deid == 0;
            let wf = self.config.wf;
            let ti = self.next_ti();
            let mut ctx = self.context();
            match Messenger::start(Instant::now(), ti, deid, body, bf, wf, &mut ctx) {
                Ok((messenger, step)) => {
                    let outcome = step.outcome;
                    self.apply(step.effects);
                    if outcome == Outcome::Live {
                        self.table.add(Transaction::Messenger(messenger));
                    }
                }
                Err(e) => warn!(error = %e, "failed to start message transaction"),
            }
        }
    }

    fn drain_tx_queue(&mut self) -> Result<()> {
        while let Some((bytes, addr)) = self.txes.pop_front() {
            match self.socket.send_to(&bytes, addr) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.txes.push_front((bytes, addr));
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn apply(&mut self, effects: Vec<raet_transaction::Effect>) {
        for effect in effects {
            self.apply_one(effect);
        }
    }

    fn apply_one(&mut self, effect: raet_transaction::Effect) {
        use raet_transaction::Effect;
        match effect {
            Effect::Send { bytes, host, port } => {
                if host.is_empty() {
                    let targets: Vec<SocketAddr> = self
                        .registry
                        .all_remotes()
                        .filter_map(|r| format!("{}:{}", r.host, r.port).parse().ok())
                        .collect();
                    for addr in targets {
                        self.txes.push_back((bytes.clone(), addr));
                    }
                } else if let Ok(addr) = format!("{host}:{port}").parse::<SocketAddr>() {
                    self.txes.push_back((bytes, addr));
                } else {
                    warn!(host = %host, port, "bad send target, dropping packet");
                }
            }
            Effect::Deliver(delivery) => {
                let _ = self.delivery_tx.send(delivery);
            }
            Effect::PersistLocal => {
                if let Err(e) = self.dump_local() {
                    warn!(error = %e, "failed to persist local estate");
                }
            }
            Effect::PersistRemote(eid) => {
                if let Err(e) = self.dump_remote(eid) {
                    warn!(error = %e, "failed to persist remote estate");
                }
            }
            Effect::Stat(name) => {
                self.stats.bump(name);
                debug!(stat = name, "stat");
            }
        }
    }
}
