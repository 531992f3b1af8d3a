use nodelogic_ids::PropertyId;

use super::Property;

/// Slotmap-style arena for every property in the engine, across every
/// node. Mirrors the node arena's index+generation scheme (see
/// [`crate::node::arena::NodeArena`]) so property identity survives
/// serialization round-trips and stale [`PropertyId`]s held by a
/// half-destroyed link can never alias a reused slot.
#[derive(Default)]
pub struct PropertyArena {
    slots: Vec<Option<Property>>,
    generations: Vec<u32>,
    live: u32,
}

impl PropertyArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_index(id: PropertyId) -> Option<usize> {
        if id.is_nil() {
            return None;
        }
        Some(id.index() as usize - 1)
    }

    pub fn insert(&mut self, build: impl FnOnce(PropertyId) -> Property) -> PropertyId {
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
        let id = PropertyId::from_parts((slot_idx + 1) as u32, generation);
        self.slots[slot_idx] = Some(build(id));
        self.live += 1;
        id
    }

    pub fn insert_with_id(&mut self, id: PropertyId, property: Property) {
        let slot_idx = Self::slot_index(id).expect("cannot insert with nil PropertyId");
        if slot_idx >= self.slots.len() {
            self.slots.resize_with(slot_idx + 1, || None);
            self.generations.resize(slot_idx + 1, 0);
        }
        self.generations[slot_idx] = id.generation();
        self.slots[slot_idx] = Some(property);
        self.live += 1;
    }

    #[inline]
    pub fn get(&self, id: PropertyId) -> Option<&Property> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        self.slots.get(idx)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        self.slots.get_mut(idx)?.as_mut()
    }

    pub fn remove(&mut self, id: PropertyId) -> Option<Property> {
        let idx = Self::slot_index(id)?;
        if self.generations.get(idx) != Some(&id.generation()) {
            return None;
        }
        let out = self.slots.get_mut(idx)?.take()?;
        self.live -= 1;
        Some(out)
    }

    pub fn len(&self) -> usize {
        self.live as usize
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &Property)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.as_ref().map(|p| {
                let generation = self.generations[idx];
                (PropertyId::from_parts((idx + 1) as u32, generation), p)
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PropertyId, &mut Property)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let generation = self.generations[idx];
            slot.as_mut()
                .map(|p| (PropertyId::from_parts((idx + 1) as u32, generation), p))
        })
    }
}
