//! Fixed-capacity slot map of live client connections.
//!
//! Only the event loop touches the registry. Slots are handed out by scanning
//! for the first free index, so iteration order is slot order, not accept order.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection registry is full ({capacity} slots)")]
    Full { capacity: usize },
}

/// Index of an occupied registry slot.
pub type Slot = usize;

pub struct ConnectionRegistry<T> {
    slots: Vec<Option<T>>,
    active: usize,
}

impl<T> ConnectionRegistry<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Place `conn` in the first free slot. On `Full` the connection is handed
    /// back so the caller can close it instead of leaking it.
    pub fn register(&mut self, conn: T) -> Result<Slot, (RegistryError, T)> {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(conn);
                self.active += 1;
                Ok(slot)
            }
            None => Err((
                RegistryError::Full {
                    capacity: self.capacity(),
                },
                conn,
            )),
        }
    }

    /// Free `slot`, returning whatever occupied it.
    pub fn unregister(&mut self, slot: Slot) -> Option<T> {
        let conn = self.slots.get_mut(slot)?.take();
        if conn.is_some() {
            self.active -= 1;
        }
        conn
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }

    /// Occupied slot indices, snapshotted so the caller may unregister while walking them.
    pub fn active_slots(&self) -> Vec<Slot> {
        self.iter().map(|(slot, _)| slot).collect()
    }

    /// Empty every slot, yielding the connections for teardown.
    pub fn drain(&mut self) -> Vec<T> {
        self.active = 0;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_until_full_then_refuse() {
        let mut reg = ConnectionRegistry::with_capacity(2);
        assert_eq!(reg.register("a").unwrap(), 0);
        assert_eq!(reg.register("b").unwrap(), 1);
        assert_eq!(reg.len(), reg.capacity());

        let (err, refused) = reg.register("c").unwrap_err();
        assert_eq!(err, RegistryError::Full { capacity: 2 });
        assert_eq!(refused, "c");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn freed_slot_is_reused_first() {
        let mut reg = ConnectionRegistry::with_capacity(3);
        reg.register(10).unwrap();
        reg.register(11).unwrap();
        reg.register(12).unwrap();

        assert_eq!(reg.unregister(1), Some(11));
        assert_eq!(reg.unregister(1), None);
        assert_eq!(reg.len(), 2);

        assert_eq!(reg.register(13).unwrap(), 1);
        let seen: Vec<_> = reg.iter().map(|(s, c)| (s, *c)).collect();
        assert_eq!(seen, vec![(0, 10), (1, 13), (2, 12)]);
    }

    #[test]
    fn unregister_out_of_range_is_none() {
        let mut reg: ConnectionRegistry<u8> = ConnectionRegistry::with_capacity(1);
        assert_eq!(reg.unregister(5), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn active_slots_and_drain() {
        let mut reg = ConnectionRegistry::with_capacity(4);
        reg.register(1).unwrap();
        reg.register(2).unwrap();
        reg.unregister(0);
        reg.register(3).unwrap();
        reg.register(4).unwrap();

        assert_eq!(reg.active_slots(), vec![0, 1, 2]);
        for slot in reg.active_slots() {
            if let Some(v) = reg.get_mut(slot) {
                *v *= 10;
            }
        }

        let mut drained = reg.drain();
        drained.sort();
        assert_eq!(drained, vec![20, 30, 40]);
        assert!(reg.is_empty());
        assert_eq!(reg.capacity(), 4);
    }
}
