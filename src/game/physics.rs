//! # Physics boundary
//!
//! The simulation consumes physics through [`PhysicsBackend`]:
//! - `step` integrates motion and returns this tick's contact events as a
//!   plain list, consumed once by the collision dispatcher,
//! - `overlap_aabb` answers detection-box queries,
//! - `position` reports where the backend last saw a body.
//!
//! [`KinematicPhysics`] is the built-in backend: explicit Euler integration
//! of [`Velocity`] into [`Transform`], circle colliders, and a uniform grid
//! broad phase. Bodies are rebuilt from the world on every step, so the
//! backend holds no state that could drift from the component store.
//!
//! ## Filtering
//! Two colliders interact when each one's `belongs_to` intersects the
//! other's `collides_with`. A pair with at least one trigger produces a
//! [`EventKind::Trigger`] event, otherwise a [`EventKind::Collision`].

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::engine::error::ECSResult;
use crate::engine::systems::{access, Requirement, System, SystemContext};
use crate::engine::types::{AccessSets, Entity};
use crate::engine::component::ComponentRegistry;
use crate::engine::world::World;
use crate::game::components::{Collider, Transform, Velocity};

/// Collision layers used by the built-in prefabs.
pub mod layers {
    /// The player body.
    pub const PLAYER: u32 = 1 << 0;
    /// Enemy bodies.
    pub const ENEMY: u32 = 1 << 1;
    /// Player projectiles.
    pub const PROJECTILE: u32 = 1 << 2;
    /// Collectible gems.
    pub const GEM: u32 = 1 << 3;
}

/// Layer membership and mask of a collider or query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Layers this collider is on.
    pub belongs_to: u32,
    /// Layers this collider reacts to.
    pub collides_with: u32,
}

impl CollisionFilter {
    /// Filter on `belongs_to` that reacts to `collides_with`.
    pub const fn new(belongs_to: u32, collides_with: u32) -> Self {
        Self { belongs_to, collides_with }
    }

    /// Returns `true` if `a` and `b` may interact.
    #[inline]
    pub fn can_collide(a: CollisionFilter, b: CollisionFilter) -> bool {
        (a.belongs_to & b.collides_with) != 0 && (b.belongs_to & a.collides_with) != 0
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl Aabb {
    /// Box centred on `center` with half extents `half`.
    pub fn from_center(center: Vec2, half: Vec2) -> Self {
        Self { min: center - half, max: center + half }
    }

    /// Returns `true` if the circle touches the box.
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }
}

/// How two colliders met.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Two solid colliders touched.
    Collision,
    /// At least one trigger collider was involved.
    Trigger,
}

/// Unordered pair of entities whose colliders overlapped this step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CollisionEvent {
    /// First body.
    pub a: Entity,
    /// Second body.
    pub b: Entity,
    /// Solid contact or trigger overlap.
    pub kind: EventKind,
}

/// Resource holding the events of the latest physics step.
#[derive(Clone, Debug, Default)]
pub struct CollisionEvents {
    events: Vec<CollisionEvent>,
}

impl CollisionEvents {
    /// Replaces the stored events.
    pub fn replace(&mut self, events: Vec<CollisionEvent>) {
        self.events = events;
    }

    /// Appends one event.
    pub fn push(&mut self, event: CollisionEvent) {
        self.events.push(event);
    }

    /// Events in the order the backend reported them.
    pub fn iter(&self) -> std::slice::Iter<'_, CollisionEvent> {
        self.events.iter()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the step produced no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Physics collaborator.
pub trait PhysicsBackend: Send + Sync {
    /// Advances the simulation by `delta` seconds and returns contact events.
    fn step(&mut self, world: &World, delta: f32) -> ECSResult<Vec<CollisionEvent>>;

    /// Entities whose colliders touch `aabb` and pass `filter`, in a stable order.
    fn overlap_aabb(&self, aabb: &Aabb, filter: CollisionFilter) -> Vec<Entity>;

    /// Position of `entity` as of the latest step.
    fn position(&self, entity: Entity) -> Option<Vec2>;
}

/// Resource wrapping the active backend.
pub struct Physics(pub Box<dyn PhysicsBackend>);

impl Physics {
    /// Boxes `backend`.
    pub fn new(backend: impl PhysicsBackend + 'static) -> Self {
        Self(Box::new(backend))
    }
}

#[derive(Clone, Copy, Debug)]
struct Body {
    entity: Entity,
    position: Vec2,
    radius: f32,
    filter: CollisionFilter,
    trigger: bool,
}

/// Built-in backend with a uniform grid broad phase.
#[derive(Debug)]
pub struct KinematicPhysics {
    cell_size: f32,
    bodies: Vec<Body>,
    cells: HashMap<(i32, i32), Vec<usize>>,
    lookup: HashMap<Entity, usize>,
}

impl Default for KinematicPhysics {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl KinematicPhysics {
    /// Creates a backend with grid cells of `cell_size` units.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            bodies: Vec::new(),
            cells: HashMap::new(),
            lookup: HashMap::new(),
        }
    }

    /// Number of bodies seen by the latest sync.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn cell_of(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    fn cells_covering(&self, min: Vec2, max: Vec2) -> impl Iterator<Item = (i32, i32)> {
        let (x0, y0) = self.cell_of(min);
        let (x1, y1) = self.cell_of(max);
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn candidates(&self, min: Vec2, max: Vec2) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .cells_covering(min, max)
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Moves every entity with a velocity by `velocity * delta`.
    pub fn integrate(world: &World, delta: f32) -> ECSResult<()> {
        let query = world.query().with::<Velocity>().with::<Transform>().build()?;
        world.par_for_each_read_write::<Velocity, Transform, _>(&query, |_, velocity, transform| {
            transform.position += velocity.0 * delta;
        })
    }

    /// Rebuilds bodies and the broad phase from the current transforms.
    pub fn sync(&mut self, world: &World) -> ECSResult<()> {
        let query = world.query().with::<Transform>().with::<Collider>().build()?;
        let transforms = world.read::<Transform>()?;
        let colliders = world.read::<Collider>()?;

        self.bodies.clear();
        self.cells.clear();
        self.lookup.clear();
        for entity in world.iter(&query)? {
            let (Some(transform), Some(collider)) = (transforms.get(entity), colliders.get(entity))
            else {
                continue;
            };
            self.lookup.insert(entity, self.bodies.len());
            self.bodies.push(Body {
                entity,
                position: transform.position,
                radius: collider.radius,
                filter: collider.filter,
                trigger: collider.trigger,
            });
        }

        for index in 0..self.bodies.len() {
            let body = self.bodies[index];
            let reach = Vec2::splat(body.radius);
            let cells: Vec<_> = self.cells_covering(body.position - reach, body.position + reach).collect();
            for cell in cells {
                self.cells.entry(cell).or_default().push(index);
            }
        }
        Ok(())
    }

    /// Overlapping pairs of the latest sync, ordered by body index.
    pub fn detect(&self) -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        for (i, a) in self.bodies.iter().enumerate() {
            let reach = Vec2::splat(a.radius);
            for j in self.candidates(a.position - reach, a.position + reach) {
                if j <= i {
                    continue;
                }
                let b = &self.bodies[j];
                if !CollisionFilter::can_collide(a.filter, b.filter) {
                    continue;
                }
                let limit = a.radius + b.radius;
                if a.position.distance_squared(b.position) > limit * limit {
                    continue;
                }
                let kind = if a.trigger || b.trigger { EventKind::Trigger } else { EventKind::Collision };
                events.push(CollisionEvent { a: a.entity, b: b.entity, kind });
            }
        }
        events
    }
}

impl PhysicsBackend for KinematicPhysics {
    fn step(&mut self, world: &World, delta: f32) -> ECSResult<Vec<CollisionEvent>> {
        Self::integrate(world, delta)?;
        self.sync(world)?;
        Ok(self.detect())
    }

    fn overlap_aabb(&self, aabb: &Aabb, filter: CollisionFilter) -> Vec<Entity> {
        self.candidates(aabb.min, aabb.max)
            .into_iter()
            .map(|index| &self.bodies[index])
            .filter(|body| CollisionFilter::can_collide(filter, body.filter))
            .filter(|body| aabb.overlaps_circle(body.position, body.radius))
            .map(|body| body.entity)
            .collect()
    }

    fn position(&self, entity: Entity) -> Option<Vec2> {
        self.lookup.get(&entity).map(|&index| self.bodies[index].position)
    }
}

/// Steps the physics backend and publishes its events.
///
/// Registered first in the PhysicsReaction phase.
pub struct PhysicsStepSystem;

impl System for PhysicsStepSystem {
    fn name(&self) -> &'static str {
        "physics_step"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .write::<Transform>()
            .read::<Velocity>()
            .read::<Collider>()
            .write::<Physics>()
            .write::<CollisionEvents>()
            .build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::resource::<Physics>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let events = world.resource_mut::<Physics>()?.0.step(world, ctx.time().delta)?;
        log::trace!("physics step produced {} events", events.len());
        world.resource_mut::<CollisionEvents>()?.replace(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::register_components;

    const SOLID: CollisionFilter = CollisionFilter::new(1, 1);

    fn body(world: &mut World, position: Vec2, radius: f32, trigger: bool) -> Entity {
        let e = world.spawn().unwrap();
        world.attach(e, Transform::at(position)).unwrap();
        world.attach(e, Collider { radius, filter: SOLID, trigger }).unwrap();
        e
    }

    #[test]
    fn reports_each_overlapping_pair_once() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        let a = body(&mut world, Vec2::new(0.0, 0.0), 0.5, false);
        let b = body(&mut world, Vec2::new(0.9, 0.0), 0.5, true);
        let _far = body(&mut world, Vec2::new(10.0, 0.0), 0.5, false);

        let mut physics = KinematicPhysics::new(1.0);
        let events = physics.step(&world, 0.0).unwrap();
        assert_eq!(events, vec![CollisionEvent { a, b, kind: EventKind::Trigger }]);
    }

    #[test]
    fn filters_are_symmetric() {
        let player = CollisionFilter::new(layers::PLAYER, layers::ENEMY);
        let enemy = CollisionFilter::new(layers::ENEMY, layers::PLAYER | layers::PROJECTILE);
        let gem = CollisionFilter::new(layers::GEM, layers::PLAYER);
        assert!(CollisionFilter::can_collide(player, enemy));
        assert!(!CollisionFilter::can_collide(player, gem));
    }

    #[test]
    fn overlap_query_respects_box_and_filter() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        let near = body(&mut world, Vec2::new(1.5, 0.0), 0.5, false);
        let _far = body(&mut world, Vec2::new(5.0, 0.0), 0.5, false);

        let mut physics = KinematicPhysics::new(2.0);
        physics.sync(&world).unwrap();
        let hits = physics.overlap_aabb(&Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0)), SOLID);
        assert_eq!(hits, vec![near]);
        let none = physics.overlap_aabb(
            &Aabb::from_center(Vec2::ZERO, Vec2::splat(1.0)),
            CollisionFilter::new(2, 2),
        );
        assert!(none.is_empty());
    }
}
