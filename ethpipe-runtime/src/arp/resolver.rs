use crate::arp::{ArpCache, LineState};
use crate::config::{ArpConfig, InterfaceConfig, NextHop};
use ethpipe_packets::MacAddr;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use tracing::{debug, trace, warn};

/// Outcome of `ArpResolver::lookup`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<D> {
    /// The link address is known; the descriptor goes straight back to the caller.
    Hit { mac: MacAddr, descriptor: D },
    /// The descriptor waits for the address; it comes back later as `Release` or `Fail`.
    Queued,
    /// The descriptor could not be queued and goes straight back to the caller.
    Rejected { descriptor: D, reason: RejectReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The address already has `max_pending_per_entry` descriptors waiting.
    QueueFull,
    /// Off-subnet destination and no gateway.
    NoRoute,
}

/// Output of the resolver, drained with `poll_event`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArpEvent<D> {
    /// Send a who-has request for `ip`. `attempt` counts from 1.
    Request { ip: Ipv4Addr, attempt: u32 },
    /// `ip` resolved to `mac`; the descriptor may go out.
    Release {
        ip: Ipv4Addr,
        mac: MacAddr,
        descriptor: D,
    },
    /// `ip` could not be resolved; the descriptor is dropped.
    Fail { ip: Ipv4Addr, descriptor: D },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArpStats {
    pub requests: u64,
    /// Descriptors failed, one per dropped frame.
    pub failures: u64,
    /// Addresses given up on after the last request timed out.
    pub timeouts: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rejected: u64,
}

/// The ARP resolution state machine.
///
/// Every cache line runs EMPTY -> PENDING -> VALID. A lookup on an empty address claims a line,
/// queues the caller's descriptor and emits a request. Lookups on a pending address only join the
/// queue, so an address never has more than one request outstanding. A reply validates the line
/// and releases its queue in lookup order. Without a reply, the line's timer re-sends the request
/// every `retry_interval` steps until `retry_count` requests have gone out, then waits
/// `request_timeout` more steps and fails the whole queue.
///
/// Time only advances through `tick`, so behavior is a pure function of the call sequence.
#[derive(Debug)]
pub struct ArpResolver<D> {
    config: ArpConfig,
    interface: InterfaceConfig,
    cache: ArpCache,
    queues: Vec<VecDeque<D>>,
    events: VecDeque<ArpEvent<D>>,
    now: u64,
    stats: ArpStats,
}

impl<D> ArpResolver<D> {
    pub fn new(config: ArpConfig, interface: InterfaceConfig) -> Self {
        assert!(
            config.max_pending_per_entry > 0,
            "ArpResolver max_pending_per_entry must be > 0"
        );
        assert!(config.retry_count > 0, "ArpResolver retry_count must be > 0");
        ArpResolver {
            config,
            interface,
            cache: ArpCache::new(config.cache_capacity),
            queues: (0..config.cache_capacity)
                .map(|_| VecDeque::with_capacity(config.max_pending_per_entry))
                .collect(),
            events: VecDeque::new(),
            now: 0,
            stats: ArpStats::default(),
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn stats(&self) -> ArpStats {
        self.stats
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }

    pub fn interface(&self) -> &InterfaceConfig {
        &self.interface
    }

    /// Descriptors waiting on `ip`.
    pub fn pending(&self, ip: Ipv4Addr) -> usize {
        match self.cache.find(ip) {
            Some(index) if self.cache.line(index).state == LineState::Pending => {
                self.queues[index].len()
            }
            _ => 0,
        }
    }

    /// True while any address is being resolved or any event has not been polled.
    pub fn is_busy(&self) -> bool {
        !self.events.is_empty()
            || self
                .cache
                .lines()
                .iter()
                .any(|line| line.state == LineState::Pending)
    }

    /// Resolves the next hop for `destination`. See `InterfaceConfig::next_hop`.
    pub fn lookup(&mut self, destination: Ipv4Addr, descriptor: D) -> Lookup<D> {
        let ip = match self.interface.next_hop(destination) {
            NextHop::Broadcast => {
                self.stats.hits += 1;
                return Lookup::Hit {
                    mac: MacAddr::BROADCAST,
                    descriptor,
                };
            }
            NextHop::Unreachable => {
                warn!(destination = %destination, "no route to destination");
                self.stats.rejected += 1;
                return Lookup::Rejected {
                    descriptor,
                    reason: RejectReason::NoRoute,
                };
            }
            NextHop::Resolve(ip) => ip,
        };

        match self.cache.find(ip) {
            Some(index) if self.cache.line(index).state == LineState::Valid => {
                self.stats.hits += 1;
                Lookup::Hit {
                    mac: self.cache.line(index).mac,
                    descriptor,
                }
            }
            Some(index) => {
                if self.queues[index].len() >= self.config.max_pending_per_entry {
                    warn!(ip = %ip, "ARP pending queue full, rejecting");
                    self.stats.rejected += 1;
                    return Lookup::Rejected {
                        descriptor,
                        reason: RejectReason::QueueFull,
                    };
                }
                trace!(ip = %ip, "queued behind pending ARP request");
                self.queues[index].push_back(descriptor);
                Lookup::Queued
            }
            None => {
                self.stats.misses += 1;
                let (index, eviction) = self.cache.insert_pending(ip, self.now);
                if let Some(eviction) = eviction {
                    self.stats.evictions += 1;
                    if eviction.state == LineState::Pending {
                        self.fail_queue(index, eviction.ip);
                    }
                }
                debug!(ip = %ip, index, "ARP line pending");
                self.queues[index].push_back(descriptor);
                self.send_request(index);
                Lookup::Queued
            }
        }
    }

    /// Applies a binding learned from the network. A pending line becomes valid and releases its
    /// queue; a valid line is refreshed; anything else is ignored.
    pub fn reply(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        let index = match self.cache.find(ip) {
            Some(index) => index,
            None => {
                trace!(ip = %ip, "ignoring unsolicited ARP binding");
                return;
            }
        };
        if self.cache.line(index).state == LineState::Valid {
            self.cache.refresh(ip, mac);
            return;
        }

        debug!(ip = %ip, mac = %mac, "ARP line valid");
        self.cache.set_valid(index, mac, self.now);
        while let Some(descriptor) = self.queues[index].pop_front() {
            self.events.push_back(ArpEvent::Release {
                ip,
                mac,
                descriptor,
            });
        }
    }

    /// Advances time by one step and runs the timers of pending lines, in line order.
    pub fn tick(&mut self) {
        self.now += 1;
        for index in 0..self.cache.capacity() {
            let line = *self.cache.line(index);
            if line.state != LineState::Pending || line.deadline > self.now {
                continue;
            }
            if line.attempts < self.config.retry_count {
                self.send_request(index);
            } else {
                warn!(ip = %line.ip, attempts = line.attempts, "ARP resolution failed");
                self.stats.timeouts += 1;
                self.fail_queue(index, line.ip);
                self.cache.invalidate(index);
            }
        }
    }

    /// Empties the cache. Descriptors still waiting on an address are failed.
    pub fn clear(&mut self) {
        debug!("ARP cache cleared");
        for index in 0..self.cache.capacity() {
            let line = *self.cache.line(index);
            if line.state == LineState::Pending {
                self.fail_queue(index, line.ip);
            }
        }
        self.cache.clear();
    }

    pub fn poll_event(&mut self) -> Option<ArpEvent<D>> {
        self.events.pop_front()
    }

    fn send_request(&mut self, index: usize) {
        let retry_count = self.config.retry_count;
        let (retry_interval, request_timeout) =
            (self.config.retry_interval, self.config.request_timeout);
        let now = self.now;

        let line = self.cache.line_mut(index);
        line.attempts += 1;
        line.deadline = now
            + if line.attempts < retry_count {
                retry_interval
            } else {
                request_timeout
            };
        let (ip, attempt) = (line.ip, line.attempts);

        trace!(ip = %ip, attempt, "ARP request");
        self.stats.requests += 1;
        self.events.push_back(ArpEvent::Request { ip, attempt });
    }

    fn fail_queue(&mut self, index: usize, ip: Ipv4Addr) {
        while let Some(descriptor) = self.queues[index].pop_front() {
            self.stats.failures += 1;
            self.events.push_back(ArpEvent::Fail { ip, descriptor });
        }
    }
}
