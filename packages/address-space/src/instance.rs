//! Instance payloads attached to nodes of managed object types.
//!
//! An ObjectType may register an [`InstanceLifecycle`]. Every node created
//! with that type as its type definition gets a payload from the
//! constructor, stored in an arena and addressed by an [`InstanceHandle`].
//! The destructor receives the payload back right before the node is
//! removed. Handles carry a generation, so a handle kept past the node's
//! deletion is detected as stale instead of aliasing a newer payload.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Error, NodeId};

/// A type-erased instance payload.
pub type Instance = Box<dyn Any + Send + Sync>;

/// Constructor/destructor pair registered on an ObjectType.
///
/// Both run while the address space is locked for writing and must not call
/// back into it.
pub trait InstanceLifecycle: Send + Sync {
    fn constructor(&self, node: &NodeId) -> Instance;

    fn destructor(&self, node: &NodeId, instance: Instance);
}

/// Refers to one payload in the arena.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    entry: Option<(Instance, Arc<dyn InstanceLifecycle>)>,
}

/// Generation-checked storage for instance payloads.
#[derive(Default)]
pub(crate) struct InstanceArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl InstanceArena {
    pub fn insert(
        &mut self,
        instance: Instance,
        lifecycle: Arc<dyn InstanceLifecycle>,
    ) -> InstanceHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some((instance, lifecycle));
                InstanceHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some((instance, lifecycle)),
                });
                InstanceHandle {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Take the payload out and invalidate the handle.
    pub fn remove(
        &mut self,
        handle: InstanceHandle,
    ) -> Result<(Instance, Arc<dyn InstanceLifecycle>), Error> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(Error::StaleHandle)?;
        let entry = slot.entry.take().ok_or(Error::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(entry)
    }

    pub fn get(&self, handle: InstanceHandle) -> Result<&(dyn Any + Send + Sync), Error> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
            .map(|(instance, _)| instance.as_ref())
            .ok_or(Error::StaleHandle)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl InstanceLifecycle for Noop {
        fn constructor(&self, _node: &NodeId) -> Instance {
            Box::new(())
        }

        fn destructor(&self, _node: &NodeId, _instance: Instance) {}
    }

    #[test]
    fn stale_handle_after_remove() {
        let mut arena = InstanceArena::default();
        let lifecycle: Arc<dyn InstanceLifecycle> = Arc::new(Noop);
        let first = arena.insert(Box::new(7u32), Arc::clone(&lifecycle));
        assert_eq!(arena.get(first).unwrap().downcast_ref::<u32>(), Some(&7));

        arena.remove(first).unwrap();
        assert!(matches!(arena.get(first), Err(Error::StaleHandle)));
        assert!(matches!(arena.remove(first), Err(Error::StaleHandle)));

        // The slot is reused under a new generation.
        let second = arena.insert(Box::new(8u32), lifecycle);
        assert_ne!(first, second);
        assert!(matches!(arena.get(first), Err(Error::StaleHandle)));
        assert_eq!(arena.get(second).unwrap().downcast_ref::<u32>(), Some(&8));
        assert_eq!(arena.len(), 1);
    }
}
