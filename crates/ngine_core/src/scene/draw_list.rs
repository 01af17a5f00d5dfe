use slotmap::{new_key_type, SlotMap};

use super::{GameObject, TransformMut};
use crate::render::ModelHandle;

new_key_type! {
    /// Key of a game object registered in the draw list
    pub struct GameObjectId;
}

/// Game objects to draw each frame, in insertion order
#[derive(Debug, Default)]
pub struct DrawList {
    objects: SlotMap<GameObjectId, GameObject>,
    order: Vec<GameObjectId>,
}

impl DrawList {
    /// Empty draw list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object; it is drawn after every object added before it
    pub fn push(&mut self, object: GameObject) -> GameObjectId {
        let id = self.objects.insert(object);
        self.order.push(id);
        id
    }

    /// Remove an object, keeping the relative order of the rest
    pub fn remove(&mut self, id: GameObjectId) -> Option<GameObject> {
        let object = self.objects.remove(id)?;
        self.order.retain(|entry| *entry != id);
        Some(object)
    }

    /// Look up an object
    #[must_use]
    pub fn get(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    /// Look up an object to move, rotate or scale it
    pub fn get_mut(&mut self, id: GameObjectId) -> Option<TransformMut<'_>> {
        self.objects.get_mut(id).map(TransformMut::new)
    }

    /// Objects in draw order
    pub fn iter(&self) -> impl Iterator<Item = (GameObjectId, &GameObject)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.objects.get(*id).map(|object| (*id, object)))
    }

    /// Whether any entry draws `model`
    #[must_use]
    pub fn references_model(&self, model: ModelHandle) -> bool {
        self.objects.values().any(|object| object.model() == model)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::ShaderHandle;

    fn object(model: u32) -> GameObject {
        GameObject::new(ShaderHandle(0), ModelHandle(model))
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut list = DrawList::new();
        let a = list.push(object(3));
        let b = list.push(object(1));
        let c = list.push(object(2));

        let ids: Vec<_> = list.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_remove_keeps_order_and_invalidates_id() {
        let mut list = DrawList::new();
        let a = list.push(object(0));
        let b = list.push(object(1));
        let c = list.push(object(2));

        assert!(list.remove(b).is_some());
        assert!(list.get(b).is_none());
        assert!(list.remove(b).is_none());

        let ids: Vec<_> = list.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(!list.references_model(ModelHandle(1)));
        assert!(list.references_model(ModelHandle(2)));
    }

    #[test]
    fn test_mutation_through_id() {
        let mut list = DrawList::new();
        let id = list.push(object(0));

        list.get_mut(id)
            .unwrap()
            .set_translation(Vec3::new(0.0, 1.0, 0.0));

        assert_eq!(list.get(id).unwrap().translation(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(list.len(), 1);
    }
}
