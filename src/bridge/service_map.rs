//! Tracks the bridge's currently open services by local id. Grounded on
//! `adb/tcpusb/servicemap.py`.

use std::collections::BTreeMap;

pub struct ServiceMap<T> {
    remotes: BTreeMap<u32, T>,
}

impl<T> Default for ServiceMap<T> {
    fn default() -> Self {
        Self {
            remotes: BTreeMap::new(),
        }
    }
}

impl<T> ServiceMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.remotes.len()
    }

    /// Insert a new service. Panics (like the original's `ValueError`)
    /// if `local_id` is already in use — local ids are allocated by a
    /// [`crate::bridge::rolling_counter::RollingCounter`] sized well past
    /// this bridge's realistic concurrent-service count, so a collision
    /// indicates a caller bug, not a field condition to recover from.
    pub fn insert(&mut self, local_id: u32, service: T) {
        assert!(
            !self.remotes.contains_key(&local_id),
            "local id {local_id} is already in use"
        );
        self.remotes.insert(local_id, service);
    }

    pub fn get(&self, local_id: u32) -> Option<&T> {
        self.remotes.get(&local_id)
    }

    pub fn get_mut(&mut self, local_id: u32) -> Option<&mut T> {
        self.remotes.get_mut(&local_id)
    }

    pub fn remove(&mut self, local_id: u32) -> Option<T> {
        self.remotes.remove(&local_id)
    }

    /// Drain every service, handing each to `end` for teardown.
    pub fn end_all(&mut self, mut end: impl FnMut(T)) {
        for (_, service) in std::mem::take(&mut self.remotes) {
            end(service);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut map = ServiceMap::new();
        map.insert(1, "a");
        assert_eq!(map.get(1), Some(&"a"));
        assert_eq!(map.count(), 1);
        assert_eq!(map.remove(1), Some("a"));
        assert_eq!(map.get(1), None);
    }

    #[test]
    fn end_all_drains_and_tears_down() {
        let mut map = ServiceMap::new();
        map.insert(1, 10);
        map.insert(2, 20);
        let mut torn_down = Vec::new();
        map.end_all(|v| torn_down.push(v));
        torn_down.sort();
        assert_eq!(torn_down, vec![10, 20]);
        assert_eq!(map.count(), 0);
    }
}
