use rustc_hash::FxHashMap;

use crate::backend::HostObject;

// === HandleRegistry === //

/// Maps the small integers a guest holds onto live host objects of one kind.
///
/// Handles start at 1 and grow monotonically, so a released handle is not handed out again
/// while the counter has room. Handle `0` never names an object. None of these operations fail:
/// an unknown handle simply does nothing.
#[derive(Debug)]
pub struct HandleRegistry<T> {
    kind: &'static str,
    next: u32,
    entries: FxHashMap<u32, RegistryEntry<T>>,
}

#[derive(Debug)]
struct RegistryEntry<T> {
    refs: u32,
    object: T,
}

impl<T> HandleRegistry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            next: 0,
            entries: FxHashMap::default(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Registers `object` with one reference. Handles are never zero, and once the counter wraps
    /// it skips handles that are still live.
    pub fn create(&mut self, object: T) -> u32 {
        loop {
            self.next = self.next.wrapping_add(1).max(1);
            if !self.entries.contains_key(&self.next) {
                break;
            }
        }

        let handle = self.next;
        self.entries.insert(handle, RegistryEntry { refs: 1, object });
        handle
    }

    pub fn get(&self, handle: u32) -> Option<&T> {
        self.entries.get(&handle).map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, handle: u32) -> Option<&mut T> {
        self.entries.get_mut(&handle).map(|entry| &mut entry.object)
    }

    /// Like [`get`](Self::get), but logs a miss on a nonzero handle.
    pub fn lookup(&self, handle: u32) -> Option<&T> {
        let object = self.get(handle);
        if object.is_none() && handle != 0 {
            tracing::debug!(kind = self.kind, handle, "handle does not name a live object");
        }
        object
    }

    pub fn lookup_mut(&mut self, handle: u32) -> Option<&mut T> {
        let kind = self.kind;
        let object = self.entries.get_mut(&handle).map(|entry| &mut entry.object);
        if object.is_none() && handle != 0 {
            tracing::debug!(kind, handle, "handle does not name a live object");
        }
        object
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn add_ref(&mut self, handle: u32) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.refs = entry.refs.saturating_add(1);
        }
    }

    /// Drops one reference, handing back the object once the last one is gone. The object is
    /// not destroyed on the host; that is a separate explicit operation.
    pub fn release(&mut self, handle: u32) -> Option<T> {
        let entry = self.entries.get_mut(&handle)?;
        entry.refs -= 1;

        if entry.refs > 0 {
            return None;
        }

        tracing::debug!(kind = self.kind, handle, "released last reference");
        self.entries.remove(&handle).map(|entry| entry.object)
    }

    pub fn ref_count(&self, handle: u32) -> u32 {
        self.entries.get(&handle).map_or(0, |entry| entry.refs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: HostObject> HandleRegistry<T> {
    pub fn label(&self, handle: u32) -> Option<String> {
        self.get(handle).and_then(HostObject::label)
    }

    pub fn set_label(&mut self, handle: u32, label: &str) {
        if let Some(object) = self.get_mut(handle) {
            object.set_label(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_release_removes_entry() {
        let mut reg = HandleRegistry::new("Thing");
        let handle = reg.create("a");

        assert_eq!(handle, 1);
        assert_eq!(reg.release(handle), Some("a"));
        assert_eq!(reg.get(handle), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn add_ref_requires_two_releases() {
        let mut reg = HandleRegistry::new("Thing");
        let handle = reg.create(7);
        reg.add_ref(handle);

        assert_eq!(reg.release(handle), None);
        assert_eq!(reg.get(handle), Some(&7));
        assert_eq!(reg.ref_count(handle), 1);

        assert_eq!(reg.release(handle), Some(7));
        assert_eq!(reg.get(handle), None);
    }

    #[test]
    fn unknown_handles_are_ignored() {
        let mut reg = HandleRegistry::new("Thing");
        let handle = reg.create(1);

        for bogus in [0, 2, u32::MAX] {
            assert_eq!(reg.get(bogus), None);
            reg.add_ref(bogus);
            assert_eq!(reg.release(bogus), None);
        }

        assert_eq!(reg.ref_count(handle), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn handles_are_not_reused() {
        let mut reg = HandleRegistry::new("Thing");
        let first = reg.create(());
        reg.release(first);

        let second = reg.create(());
        assert_eq!(second, 2);
        assert!(!reg.contains(first));
    }

    #[test]
    fn wrapped_counter_skips_live_handles() {
        let mut reg = HandleRegistry::new("Thing");
        let live = reg.create("live");
        assert_eq!(live, 1);

        reg.next = u32::MAX - 1;
        assert_eq!(reg.create("last"), u32::MAX);
        assert_eq!(reg.create("fresh"), 2);

        assert_eq!(reg.get(live), Some(&"live"));
        assert_eq!(reg.get(2), Some(&"fresh"));
        assert_eq!(reg.len(), 3);
    }
}
