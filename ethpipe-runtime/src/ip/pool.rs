/// Fixed set of datagram buffers, each holding one header record and up to `max_len` payload
/// bytes. Every buffer is allocated up front; slots are handed out by index and recycled through a
/// free list, so steady-state operation never allocates.
#[derive(Debug)]
pub struct PayloadPool<H> {
    headers: Vec<H>,
    payloads: Vec<Vec<u8>>,
    free: Vec<usize>,
    max_len: usize,
}

impl<H: Default + Clone> PayloadPool<H> {
    pub fn new(slots: usize, max_len: usize) -> Self {
        assert!(slots > 0, "PayloadPool slots: {} must be > 0", slots);
        PayloadPool {
            headers: vec![H::default(); slots],
            payloads: (0..slots).map(|_| Vec::with_capacity(max_len)).collect(),
            // Popped from the back, so slot 0 goes first.
            free: (0..slots).rev().collect(),
            max_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.headers.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn allocate(&mut self) -> Option<usize> {
        let slot = self.free.pop()?;
        self.payloads[slot].clear();
        Some(slot)
    }

    pub fn release(&mut self, slot: usize) {
        debug_assert!(!self.free.contains(&slot), "slot {} released twice", slot);
        self.free.push(slot);
    }

    pub fn header(&self, slot: usize) -> &H {
        &self.headers[slot]
    }

    pub fn header_mut(&mut self, slot: usize) -> &mut H {
        &mut self.headers[slot]
    }

    pub fn payload(&self, slot: usize) -> &[u8] {
        &self.payloads[slot]
    }

    /// Appends a byte to the slot's payload. Returns false, leaving the payload unchanged, once
    /// the payload is `max_len` bytes long.
    pub fn push(&mut self, slot: usize, byte: u8) -> bool {
        let payload = &mut self.payloads[slot];
        if payload.len() == self.max_len {
            return false;
        }
        payload.push(byte);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_recycled() {
        let mut pool: PayloadPool<u8> = PayloadPool::new(2, 4);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.allocate(), None);

        assert!(pool.push(a, 1));
        *pool.header_mut(a) = 7;
        pool.release(a);
        assert_eq!(pool.available(), 1);

        let c = pool.allocate().unwrap();
        assert_eq!(c, a);
        assert!(pool.payload(c).is_empty());
    }

    #[test]
    fn payloads_are_bounded() {
        let mut pool: PayloadPool<()> = PayloadPool::new(1, 2);
        let slot = pool.allocate().unwrap();
        assert!(pool.push(slot, 1));
        assert!(pool.push(slot, 2));
        assert!(!pool.push(slot, 3));
        assert_eq!(pool.payload(slot), &[1, 2]);
    }
}
