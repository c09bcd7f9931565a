use ethpipe_packets::MacAddr;
use std::net::Ipv4Addr;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineState {
    Empty,
    Pending,
    Valid,
}

/// One entry of the table. `since` is the step at which the line entered its current state and
/// orders lines for eviction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheLine {
    pub state: LineState,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    /// Requests sent so far while pending.
    pub attempts: u32,
    /// Step at which the pending line's timer expires.
    pub deadline: u64,
    pub since: u64,
}

impl CacheLine {
    const EMPTY: CacheLine = CacheLine {
        state: LineState::Empty,
        ip: Ipv4Addr::UNSPECIFIED,
        mac: MacAddr::ZERO,
        attempts: 0,
        deadline: 0,
        since: 0,
    };
}

/// A line that had to be reclaimed to make room for a new address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eviction {
    pub index: usize,
    pub ip: Ipv4Addr,
    pub state: LineState,
}

/// Fixed-capacity table of IPv4 to MAC bindings, looked up by scanning.
///
/// A new address takes the lowest numbered empty line. When every line is in use, the valid line
/// that has been valid the longest is reclaimed; only when no line is valid does the oldest
/// pending line go instead. Ties go to the lowest index.
#[derive(Clone, Debug)]
pub struct ArpCache {
    lines: Vec<CacheLine>,
}

impl ArpCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ArpCache capacity: {} must be > 0", capacity);
        ArpCache {
            lines: vec![CacheLine::EMPTY; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.lines.len()
    }

    /// Lines not in the `Empty` state.
    pub fn len(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.state != LineState::Empty)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> &CacheLine {
        &self.lines[index]
    }

    /// Index of the line holding `ip`, pending or valid.
    pub fn find(&self, ip: Ipv4Addr) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.state != LineState::Empty && line.ip == ip)
    }

    /// The resolved address of `ip`, if its line is valid.
    pub fn get(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.find(ip)
            .map(|index| &self.lines[index])
            .filter(|line| line.state == LineState::Valid)
            .map(|line| line.mac)
    }

    pub fn state(&self, ip: Ipv4Addr) -> LineState {
        self.find(ip)
            .map_or(LineState::Empty, |index| self.lines[index].state)
    }

    /// Claims a line for `ip` in the pending state, reclaiming one if the table is full.
    pub fn insert_pending(&mut self, ip: Ipv4Addr, now: u64) -> (usize, Option<Eviction>) {
        let (index, eviction) = match self
            .lines
            .iter()
            .position(|line| line.state == LineState::Empty)
        {
            Some(index) => (index, None),
            None => {
                let index = self
                    .oldest(LineState::Valid)
                    .or_else(|| self.oldest(LineState::Pending))
                    .unwrap_or(0);
                let line = &self.lines[index];
                debug!(index, ip = %line.ip, state = ?line.state, "ARP cache eviction");
                let eviction = Eviction {
                    index,
                    ip: line.ip,
                    state: line.state,
                };
                (index, Some(eviction))
            }
        };

        self.lines[index] = CacheLine {
            state: LineState::Pending,
            ip,
            mac: MacAddr::ZERO,
            attempts: 0,
            deadline: now,
            since: now,
        };
        (index, eviction)
    }

    pub fn set_valid(&mut self, index: usize, mac: MacAddr, now: u64) {
        let line = &mut self.lines[index];
        line.state = LineState::Valid;
        line.mac = mac;
        line.attempts = 0;
        line.since = now;
    }

    /// Refreshes the binding of `ip` if its line is valid. Returns whether anything changed.
    pub fn refresh(&mut self, ip: Ipv4Addr, mac: MacAddr) -> bool {
        match self.find(ip) {
            Some(index) if self.lines[index].state == LineState::Valid => {
                self.lines[index].mac = mac;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn line_mut(&mut self, index: usize) -> &mut CacheLine {
        &mut self.lines[index]
    }

    pub fn invalidate(&mut self, index: usize) {
        self.lines[index] = CacheLine::EMPTY;
    }

    pub fn clear(&mut self) {
        for line in self.lines.iter_mut() {
            *line = CacheLine::EMPTY;
        }
    }

    fn oldest(&self, state: LineState) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.state == state)
            .min_by_key(|(index, line)| (line.since, *index))
            .map(|(index, _)| index)
    }
}
