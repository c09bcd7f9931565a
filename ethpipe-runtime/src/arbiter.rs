use tracing::trace;

/// How an `Arbiter` breaks ties between simultaneous requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArbiterPolicy {
    /// The lowest numbered request wins, or the highest when `lsb_high` is false.
    FixedPriority { lsb_high: bool },
    /// The first request after the previously granted index wins, wrapping around.
    RoundRobin,
}

impl Default for ArbiterPolicy {
    fn default() -> Self {
        ArbiterPolicy::RoundRobin
    }
}

/// Returns the index of the winning request, lowest index first when `lsb_high`.
pub fn priority_encode(requests: &[bool], lsb_high: bool) -> Option<usize> {
    if lsb_high {
        requests.iter().position(|r| *r)
    } else {
        requests.iter().rposition(|r| *r)
    }
}

/// Picks one requester among `ports` per decision.
///
/// A blocking arbiter holds its grant across calls until `release` is called, which is how
/// frame-switching stages keep an output locked to one input for a whole frame. A non-blocking
/// arbiter re-decides on every call. Either way, a call with no active request issues no grant
/// and leaves the round-robin pointer where it was.
#[derive(Clone, Debug)]
pub struct Arbiter {
    ports: usize,
    policy: ArbiterPolicy,
    blocking: bool,
    grant: Option<usize>,
    last_grant: Option<usize>,
    grants: u64,
}

impl Arbiter {
    pub fn new(ports: usize, policy: ArbiterPolicy) -> Self {
        assert!(ports > 0, "Arbiter needs at least one port");
        Arbiter {
            ports,
            policy,
            blocking: true,
            grant: None,
            last_grant: None,
            grants: 0,
        }
    }

    /// Changes blocking mode, default value is `true`.
    pub fn blocking(self, blocking: bool) -> Self {
        Arbiter { blocking, ..self }
    }

    pub fn ports(&self) -> usize {
        self.ports
    }

    pub fn policy(&self) -> ArbiterPolicy {
        self.policy
    }

    /// The grant currently held, if any.
    pub fn grant(&self) -> Option<usize> {
        self.grant
    }

    /// The most recent grant, kept for round-robin tie-breaking.
    pub fn last_grant(&self) -> Option<usize> {
        self.last_grant
    }

    /// Number of new grants issued so far. A held grant is not re-counted.
    pub fn grants(&self) -> u64 {
        self.grants
    }

    pub fn arbitrate(&mut self, requests: &[bool]) -> Option<usize> {
        assert_eq!(
            requests.len(),
            self.ports,
            "Arbiter expects one request per port"
        );

        if self.blocking {
            if let Some(grant) = self.grant {
                return Some(grant);
            }
        }

        let winner = match self.policy {
            ArbiterPolicy::FixedPriority { lsb_high } => priority_encode(requests, lsb_high),
            ArbiterPolicy::RoundRobin => {
                let start = self.last_grant.map_or(0, |last| last + 1);
                (0..self.ports)
                    .map(|offset| (start + offset) % self.ports)
                    .find(|index| requests[*index])
            }
        };

        match winner {
            Some(index) => {
                if self.grant != Some(index) || self.blocking {
                    self.grants += 1;
                }
                trace!(port = index, "arbiter grant");
                self.grant = Some(index);
                self.last_grant = Some(index);
            }
            None => self.grant = None,
        }
        winner
    }

    /// Drops a held grant so the next `arbitrate` call decides afresh.
    pub fn release(&mut self) {
        self.grant = None;
    }
}
