use crate::arp::{ArpEvent, ArpResolver, ArpStats, ArpUpdate, Lookup, RejectReason};
use crate::config::StackConfig;
use crate::ip::{IpRecord, PayloadPool};
use crate::stream::{Beat, Channel, LayerPort};
use ethpipe_packets::{Ipv4Header, IPV4_ETHER_TYPE};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IpTxResolverCounters {
    /// Datagrams handed on with a resolved destination.
    pub frames: u64,
    /// Datagrams dropped because their next hop did not answer.
    pub arp_failed: u64,
    pub no_route: u64,
    /// Datagrams dropped because too many were already waiting on the same address.
    pub queue_full: u64,
    /// Payloads that arrived flagged bad.
    pub payload_early_termination: u64,
    /// Payloads longer than a buffer slot.
    pub oversize: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ingress {
    Idle,
    Collect(usize),
    Drop,
}

/// Holds outgoing datagrams until their next hop's link address is known.
///
/// Each datagram is read in full into a `PayloadPool` slot; the slot index is the descriptor the
/// ARP resolver queues. Datagrams leave in the order the resolver releases them, with the Ethernet
/// destination, source and type filled in. A zero total length is filled in from the payload
/// length, as is an unspecified source address. When every slot is taken the input is not read.
#[derive(Debug)]
pub struct IpTxResolver {
    config: StackConfig,
    resolver: ArpResolver<usize>,
    pool: PayloadPool<IpRecord>,
    ingress: Ingress,
    ready: VecDeque<usize>,
    egress: Option<(usize, usize)>,
    requests: VecDeque<Ipv4Addr>,
    counters: IpTxResolverCounters,
}

impl IpTxResolver {
    pub fn new(config: StackConfig) -> Self {
        IpTxResolver {
            config,
            resolver: ArpResolver::new(config.arp, config.interface),
            pool: PayloadPool::new(config.payload_slots, config.max_ip_payload_len()),
            ingress: Ingress::Idle,
            ready: VecDeque::new(),
            egress: None,
            requests: VecDeque::new(),
            counters: IpTxResolverCounters::default(),
        }
    }

    pub fn counters(&self) -> IpTxResolverCounters {
        self.counters
    }

    pub fn arp_stats(&self) -> ArpStats {
        self.resolver.stats()
    }

    pub fn resolver(&self) -> &ArpResolver<usize> {
        &self.resolver
    }

    pub fn busy(&self) -> bool {
        self.ingress != Ingress::Idle
            || self.egress.is_some()
            || !self.ready.is_empty()
            || !self.requests.is_empty()
            || self.resolver.is_busy()
    }

    /// Empties the ARP cache. Datagrams waiting on an address are dropped and counted as failed.
    pub fn clear_arp_cache(&mut self) {
        self.resolver.clear();
        self.drain_events();
    }

    pub fn step(
        &mut self,
        input: &mut LayerPort<IpRecord>,
        output: &mut LayerPort<IpRecord>,
        requests: &mut Channel<Ipv4Addr>,
        updates: &mut Channel<ArpUpdate>,
    ) {
        if let Some(update) = updates.accept() {
            self.resolver.reply(update.ip, update.mac);
        }
        self.resolver.tick();
        self.drain_events();

        if let Some(ip) = self.requests.pop_front() {
            if let Err(ip) = requests.offer(ip) {
                self.requests.push_front(ip);
            }
        }

        self.egress_step(output);
        self.ingress_step(input);
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.resolver.poll_event() {
            match event {
                ArpEvent::Request { ip, .. } => self.requests.push_back(ip),
                ArpEvent::Release {
                    mac, descriptor, ..
                } => {
                    self.pool.header_mut(descriptor).eth.dest_mac = mac;
                    self.ready.push_back(descriptor);
                }
                ArpEvent::Fail { ip, descriptor } => {
                    warn!(ip = %ip, "address resolution failed, dropping datagram");
                    self.counters.arp_failed += 1;
                    self.pool.release(descriptor);
                }
            }
        }
    }

    fn egress_step(&mut self, output: &mut LayerPort<IpRecord>) {
        if self.egress.is_none() && output.header.is_ready() {
            if let Some(slot) = self.ready.pop_front() {
                output.header.fill(*self.pool.header(slot));
                self.egress = Some((slot, 0));
                self.counters.frames += 1;
            }
        }

        let mut finished = None;
        if let Some((slot, index)) = self.egress.as_mut() {
            let payload = self.pool.payload(*slot);
            let last = *index + 1 == payload.len();
            if output
                .payload
                .offer(Beat::new(payload[*index]).with_last(last))
                .is_ok()
            {
                *index += 1;
                if last {
                    finished = Some(*slot);
                }
            }
        }
        if let Some(slot) = finished {
            self.pool.release(slot);
            self.egress = None;
        }
    }

    fn ingress_step(&mut self, input: &mut LayerPort<IpRecord>) {
        match self.ingress {
            Ingress::Idle => {
                if !input.header.is_valid() {
                    return;
                }
                if let Some(slot) = self.pool.allocate() {
                    if let Some(record) = input.header.accept() {
                        *self.pool.header_mut(slot) = record;
                        self.ingress = Ingress::Collect(slot);
                    }
                }
            }
            Ingress::Collect(slot) => {
                let beat = match input.payload.accept() {
                    Some(beat) => beat,
                    None => return,
                };
                if !self.pool.push(slot, beat.data) {
                    warn!(max = self.pool.max_len(), "datagram payload too long, dropping");
                    self.counters.oversize += 1;
                    self.pool.release(slot);
                    self.ingress = if beat.last { Ingress::Idle } else { Ingress::Drop };
                    return;
                }
                if beat.last {
                    self.ingress = Ingress::Idle;
                    if beat.error {
                        warn!("datagram payload ended early, dropping");
                        self.counters.payload_early_termination += 1;
                        self.pool.release(slot);
                    } else {
                        self.resolve(slot);
                    }
                }
            }
            Ingress::Drop => {
                if let Some(beat) = input.payload.accept() {
                    if beat.last {
                        self.ingress = Ingress::Idle;
                    }
                }
            }
        }
    }

    fn resolve(&mut self, slot: usize) {
        let payload_len = self.pool.payload(slot).len();
        let interface = self.config.interface;
        let record = self.pool.header_mut(slot);
        record.eth.src_mac = interface.local_mac;
        record.eth.ether_type = IPV4_ETHER_TYPE;
        if record.ip.source.is_unspecified() {
            record.ip.source = interface.local_ip;
        }
        if record.ip.total_length == 0 {
            record.ip.finalize(payload_len);
        }
        debug_assert!(usize::from(record.ip.total_length) >= Ipv4Header::LEN);
        let destination = record.ip.destination;

        match self.resolver.lookup(destination, slot) {
            Lookup::Hit { mac, descriptor } => {
                trace!(dst = %destination, mac = %mac, "next hop known");
                self.pool.header_mut(descriptor).eth.dest_mac = mac;
                self.ready.push_back(descriptor);
            }
            Lookup::Queued => debug!(dst = %destination, "datagram waiting on ARP"),
            Lookup::Rejected { descriptor, reason } => {
                warn!(dst = %destination, reason = ?reason, "datagram rejected by ARP");
                match reason {
                    RejectReason::NoRoute => self.counters.no_route += 1,
                    RejectReason::QueueFull => self.counters.queue_full += 1,
                }
                self.pool.release(descriptor);
            }
        }
        self.drain_events();
    }
}
