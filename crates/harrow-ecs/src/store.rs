//! The [`World`] component store.
//!
//! This is deliberately a narrow facade: registration-first typed component
//! storage with get/insert/remove by entity handle. There is no archetype
//! layout and no query engine here; systems that need to scan use
//! [`World::entities_with`] and read components one at a time.
//!
//! Component types must be registered before use. Registration assigns a
//! [`ComponentId`] and records the human-readable name used in diagnostics
//! and command-conflict reports.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::entity::{EntityAllocator, EntityRef};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// Opaque identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata recorded at registration time.
#[derive(Debug)]
struct ComponentInfo {
    name: String,
    type_id: TypeId,
}

/// One column: entity slot index -> boxed component value.
type Column = HashMap<u32, Box<dyn Any + Send + Sync>>;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Entity lifecycle plus typed component storage.
///
/// All mutation during simulation is expected to flow through the
/// [`CommandBuffer`](crate::command::CommandBuffer); direct `insert`/`remove`
/// calls are for setup, tests, and the terminal apply step that owns the
/// world exclusively.
pub struct World {
    allocator: EntityAllocator,
    by_type: HashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
    columns: Vec<Column>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.allocator.alive_count())
            .field("component_types", &self.infos.len())
            .finish()
    }
}

impl World {
    /// Create an empty world with no registered component types.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            by_type: HashMap::new(),
            infos: Vec::new(),
            columns: Vec::new(),
        }
    }

    // -- registration -------------------------------------------------------

    /// Register a component type under `name`.
    ///
    /// Registering the same Rust type twice returns the existing
    /// [`ComponentId`] and ignores the new name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered for a different type. This is a
    /// setup bug, not a runtime condition.
    pub fn register_component<T: Send + Sync + 'static>(&mut self, name: &str) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }
        assert!(
            !self.infos.iter().any(|info| info.name == name),
            "component name {name:?} is already registered for a different type"
        );
        let id = ComponentId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            name: name.to_owned(),
            type_id,
        });
        self.columns.push(Column::new());
        self.by_type.insert(type_id, id);
        id
    }

    /// The registered name of a component type, if any.
    pub fn component_name<T: 'static>(&self) -> Option<&str> {
        let id = self.lookup::<T>()?;
        Some(self.infos[id.0 as usize].name.as_str())
    }

    /// Names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.infos.iter().map(|i| i.name.as_str()).collect();
        names.sort();
        names
    }

    fn lookup<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    fn unknown_component<T: 'static>(&self) -> EcsError {
        EcsError::UnknownComponent {
            name: std::any::type_name::<T>().to_owned(),
            registered: self.registered_names().join(", "),
        }
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Spawn a new, empty entity.
    pub fn spawn(&mut self) -> EntityRef {
        self.allocator.allocate()
    }

    /// Despawn an entity, dropping all of its components.
    pub fn despawn(&mut self, entity: EntityRef) -> Result<(), EcsError> {
        if !self.allocator.free(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        for column in &mut self.columns {
            column.remove(&entity.index());
        }
        Ok(())
    }

    /// Whether the handle refers to a live entity.
    pub fn is_alive(&self, entity: EntityRef) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    // -- component access ---------------------------------------------------

    /// Insert or overwrite a component on an entity.
    pub fn insert<T: Send + Sync + 'static>(
        &mut self,
        entity: EntityRef,
        value: T,
    ) -> Result<(), EcsError> {
        let id = self.lookup::<T>().ok_or_else(|| self.unknown_component::<T>())?;
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        self.columns[id.0 as usize].insert(entity.index(), Box::new(value));
        Ok(())
    }

    /// Immutable component access. `None` for stale entities, unregistered
    /// types, or entities without the component.
    pub fn get<T: 'static>(&self, entity: EntityRef) -> Option<&T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let id = self.lookup::<T>()?;
        self.columns[id.0 as usize]
            .get(&entity.index())
            .and_then(|b| b.downcast_ref::<T>())
    }

    /// Mutable component access.
    pub fn get_mut<T: 'static>(&mut self, entity: EntityRef) -> Option<&mut T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let id = self.lookup::<T>()?;
        self.columns[id.0 as usize]
            .get_mut(&entity.index())
            .and_then(|b| b.downcast_mut::<T>())
    }

    /// Remove a component from an entity. Removing an absent component is a
    /// no-op.
    pub fn remove<T: 'static>(&mut self, entity: EntityRef) -> Result<(), EcsError> {
        let id = self.lookup::<T>().ok_or_else(|| self.unknown_component::<T>())?;
        if !self.allocator.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        self.columns[id.0 as usize].remove(&entity.index());
        Ok(())
    }

    /// Whether an entity carries a component of type `T`.
    pub fn has<T: 'static>(&self, entity: EntityRef) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Handles of all live entities carrying `T`, in slot order.
    ///
    /// Slot order keeps iteration deterministic across runs; the column map
    /// itself has no stable order.
    pub fn entities_with<T: 'static>(&self) -> Vec<EntityRef> {
        let Some(id) = self.lookup::<T>() else {
            return Vec::new();
        };
        let column = &self.columns[id.0 as usize];
        let mut found: Vec<EntityRef> = self
            .allocator
            .alive()
            .filter(|e| column.contains_key(&e.index()))
            .collect();
        found.sort_by_key(|e| e.index());
        found
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Armor(f32);

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Health>("health");
        world.register_component::<Armor>("armor");
        world
    }

    #[test]
    fn spawn_insert_get() {
        let mut world = setup_world();
        let e = world.spawn();
        world
            .insert(
                e,
                Health {
                    current: 20.0,
                    max: 20.0,
                },
            )
            .unwrap();
        assert_eq!(
            world.get::<Health>(e),
            Some(&Health {
                current: 20.0,
                max: 20.0
            })
        );
        assert!(!world.has::<Armor>(e));
    }

    #[test]
    fn insert_overwrites() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert(e, Armor(1.0)).unwrap();
        world.insert(e, Armor(4.0)).unwrap();
        assert_eq!(world.get::<Armor>(e), Some(&Armor(4.0)));
    }

    #[test]
    fn get_mut_modifies() {
        let mut world = setup_world();
        let e = world.spawn();
        world
            .insert(
                e,
                Health {
                    current: 10.0,
                    max: 10.0,
                },
            )
            .unwrap();
        if let Some(h) = world.get_mut::<Health>(e) {
            h.current = 3.0;
        }
        assert_eq!(world.get::<Health>(e).unwrap().current, 3.0);
    }

    #[test]
    fn despawn_drops_components() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert(e, Armor(2.0)).unwrap();
        world.despawn(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(world.get::<Armor>(e), None);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn recycled_slot_does_not_leak_components() {
        let mut world = setup_world();
        let e0 = world.spawn();
        world.insert(e0, Armor(9.0)).unwrap();
        world.despawn(e0).unwrap();
        let e1 = world.spawn();
        assert_eq!(e1.index(), e0.index());
        assert_eq!(world.get::<Armor>(e1), None);
    }

    #[test]
    fn stale_entity_errors() {
        let mut world = setup_world();
        let e = world.spawn();
        world.despawn(e).unwrap();
        assert!(matches!(
            world.insert(e, Armor(1.0)),
            Err(EcsError::StaleEntity { .. })
        ));
        assert!(world.despawn(e).is_err());
    }

    #[test]
    fn unregistered_type_errors() {
        let mut world = World::new();
        let e = world.spawn();
        let err = world.insert(e, Armor(1.0)).unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut world = setup_world();
        let e = world.spawn();
        world.remove::<Armor>(e).unwrap();
        assert!(!world.has::<Armor>(e));
    }

    #[test]
    fn entities_with_is_sorted_and_filtered() {
        let mut world = setup_world();
        let e0 = world.spawn();
        let e1 = world.spawn();
        let e2 = world.spawn();
        world.insert(e2, Armor(1.0)).unwrap();
        world.insert(e0, Armor(2.0)).unwrap();
        let _ = e1;
        assert_eq!(world.entities_with::<Armor>(), vec![e0, e2]);
    }

    #[test]
    fn same_type_registers_once() {
        let mut world = World::new();
        let a = world.register_component::<Armor>("armor");
        let b = world.register_component::<Armor>("armor_again");
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_name_panics() {
        let mut world = World::new();
        world.register_component::<Armor>("armor");
        world.register_component::<Health>("armor");
    }

    #[test]
    fn component_name_lookup() {
        let world = setup_world();
        assert_eq!(world.component_name::<Health>(), Some("health"));
        assert_eq!(world.component_name::<u128>(), None);
    }
}
