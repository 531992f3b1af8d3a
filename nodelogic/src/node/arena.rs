use nodelogic_ids::NodeId;

use super::Node;

/// Slotmap-style arena for every node in the engine, regardless of kind.
/// Mirrors [`crate::property::PropertyArena`]'s index+generation scheme.
#[derive(Default)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    generations: Vec<u32>,
    live: u32,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_index(id: NodeId) -> Option<usize> {
        if id.is_nil() {
            return None;
        }
        Some(id.index() as usize - 1)
    }

    pub fn insert(&mut self, build: impl FnOnce(NodeId) -> Node) -> NodeId {
        let (slot_idx, generation) = if let Some(idx) = self.slots.iter().position(Option::is_none)
        {
            self.generations[idx] = self.generations[idx].wrapping_add(1);
            (idx, self.generations[idx])
        } else {
            let idx = self.slots.len();
            self.slots.push(None);
            self.generations.push(0);
            (idx, 0)
        };
        let id = NodeId::from_parts((slot_idx + 1) as u32, generation);
        self.slots[slot_idx] = Some(build(id));
        self.live += 1;
        id
    }

    /// Like [`Self::insert`], but `build` may fail. On failure, no slot
    /// is committed (the arena is left exactly as it was).
    pub fn try_insert<E>(&mut self, build: impl FnOnce(NodeId) -> Result<Node, E>) -> Result<NodeId, E> {
        let slot_idx = self
            .slots
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.slots.len());
        let generation = if slot_idx < self.generations.len() {
            self.generations[slot_idx].wrapping_add(1)
        } else {
            0
        };
        let id = NodeId::from_parts((slot_idx + 1) as u32, generation);
        let node = build(id)?;
        if slot_idx == self.slots.len() {
            self.slots.push(None);
            self.generations.push(0);
        }
        self.generations[slot_idx] = generation;
        self.slots[slot_idx] = Some(node);
        self.live += 1;
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        self.slots.get(idx)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        self.slots.get_mut(idx)?.as_mut()
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        let out = self.slots.get_mut(idx)?.take()?;
        self.live -= 1;
        Some(out)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live as usize
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref().map(|n| {
                let generation = self.generations[idx];
                (NodeId::from_parts((idx + 1) as u32, generation), n)
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let generation = self.generations[idx];
            slot.as_mut()
                .map(|n| (NodeId::from_parts((idx + 1) as u32, generation), n))
        })
    }
}
