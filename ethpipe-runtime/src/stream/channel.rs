//! `Channel` is the ready/valid handshake every stage uses to move one data unit one hop. It is a
//! single-producer single-consumer slot: the producer asserts "valid" by placing a unit in the slot
//! with `offer`, and the consumer transfers it out with `accept`. A transfer therefore happens only
//! when data is present and the consumer is ready to take it.
//!
//! The hold-until-accepted rule is enforced by ownership rather than by checking. `offer` on an
//! occupied slot hands the unit straight back to the producer, which keeps it and offers it again
//! on a later step. `accept` moves the unit out, so it can never be delivered twice, and nothing
//! else removes it, so it can never be lost. A producer may `withdraw` the unit it is currently
//! offering; once accepted, it is gone from the producer's reach.

use std::fmt;

pub struct Channel<T> {
    slot: Option<T>,
    transfers: u64,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Channel {
            slot: None,
            transfers: 0,
        }
    }

    /// True when the slot is free, meaning an offer this step will be held
    /// for the consumer instead of bounced.
    pub fn is_ready(&self) -> bool {
        self.slot.is_none()
    }

    /// True while a unit is being offered.
    pub fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    /// Producer side. Returns the unit back if the previous one has not been
    /// accepted yet.
    pub fn offer(&mut self, item: T) -> Result<(), T> {
        if self.slot.is_some() {
            return Err(item);
        }
        self.slot = Some(item);
        Ok(())
    }

    /// Producer side. Takes back the unit currently on offer, if any.
    pub fn withdraw(&mut self) -> Option<T> {
        self.slot.take()
    }

    /// Consumer side. Look at the unit on offer without transferring it.
    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Consumer side. Transfers the unit on offer, if any.
    pub fn accept(&mut self) -> Option<T> {
        let item = self.slot.take();
        if item.is_some() {
            self.transfers += 1;
        }
        item
    }

    /// Number of units transferred through this channel since creation.
    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    /// Producer side, for stages that have already checked `is_ready` this step.
    pub(crate) fn fill(&mut self, item: T) {
        assert!(self.slot.is_none(), "offered into an occupied channel");
        self.slot = Some(item);
    }
}

/// Moves the unit on offer in `from` into `to`, if there is one and `to` is ready. Returns a copy
/// of what moved so the caller can look at its side-band.
pub fn forward<T: Clone>(from: &mut Channel<T>, to: &mut Channel<T>) -> Option<T> {
    if !to.is_ready() {
        return None;
    }
    let item = from.accept()?;
    to.slot = Some(item.clone());
    Some(item)
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Channel::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel")
            .field("slot", &self.slot)
            .field("transfers", &self.transfers)
            .finish()
    }
}
