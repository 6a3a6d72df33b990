//! # Collision dispatch
//!
//! After the physics step, [`CollisionDispatchSystem`] walks the events in
//! [`CollisionEvents`] once and hands each pair to the first resolver that
//! recognises it. Pairs are unordered, so every resolver checks both
//! orders. Events no resolver claims are ignored.
//!
//! Resolvers only append to damage buffers, bump counters and toggle
//! enabled bits. HP is never touched here; the damage pass drains the
//! buffers once per tick afterwards, which makes the order of events within
//! a tick irrelevant to the outcome.
//!
//! Duplicate events are not filtered: two reports of the same pair in one
//! tick are resolved twice.

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::systems::{access, System, SystemContext};
use crate::engine::types::{AccessSets, Entity};
use crate::engine::world::{ColumnMut, ColumnRef, EnabledFlags, World};
use crate::game::components::{
    DamageBuffer, DestroyFlag, EnemyAttackData, EnemyCooldownExpiration, EnemyTag,
    GemCollectedCount, GemTag, PlayerTag, ProjectileData, UpdateGemUiFlag,
};
use crate::game::cooldown::CooldownTimestamp;
use crate::game::physics::{CollisionEvent, CollisionEvents, EventKind};

/// Columns and flags a resolver may touch while handling one event.
pub struct Resolution<'w> {
    /// Elapsed time of the current tick.
    pub now: f64,
    /// Pending damage of every entity.
    pub damage: ColumnMut<'w, DamageBuffer>,
    /// Contact attack of each enemy.
    pub enemy_attacks: ColumnRef<'w, EnemyAttackData>,
    /// Next time each enemy may attack.
    pub enemy_cooldowns: ColumnMut<'w, EnemyCooldownExpiration>,
    /// Damage carried by projectiles.
    pub projectiles: ColumnRef<'w, ProjectileData>,
    /// Gem counters of collectors.
    pub gem_counts: ColumnMut<'w, GemCollectedCount>,
    /// Enabled bits of [`DestroyFlag`].
    pub destroy: EnabledFlags<'w>,
    /// Enabled bits of [`UpdateGemUiFlag`].
    pub gem_ui: EnabledFlags<'w>,
}

impl<'w> Resolution<'w> {
    /// Borrows everything the built-in resolvers need.
    pub fn borrow(world: &'w World, now: f64) -> ECSResult<Self> {
        Ok(Self {
            now,
            damage: world.write::<DamageBuffer>()?,
            enemy_attacks: world.read::<EnemyAttackData>()?,
            enemy_cooldowns: world.write::<EnemyCooldownExpiration>()?,
            projectiles: world.read::<ProjectileData>()?,
            gem_counts: world.write::<GemCollectedCount>()?,
            destroy: world.flags::<DestroyFlag>()?,
            gem_ui: world.flags::<UpdateGemUiFlag>()?,
        })
    }
}

/// Handles one kind of entity pair.
pub trait CollisionResolver: Send + Sync {
    /// Name used in trace logs.
    fn name(&self) -> &'static str;

    /// Event kind this resolver listens to.
    fn kind(&self) -> EventKind;

    /// Returns the pair as `(source, target)` if it belongs to this resolver.
    fn classify(&self, world: &World, a: Entity, b: Entity) -> Option<(Entity, Entity)>;

    /// Applies the effect. Returns `false` if the pair was gated off.
    fn resolve(&self, res: &mut Resolution<'_>, source: Entity, target: Entity) -> bool;
}

/// `(a, b)` or `(b, a)`, whichever has `a`-side `S` and `b`-side `T`.
fn ordered<S: 'static, T: 'static>(world: &World, a: Entity, b: Entity) -> Option<(Entity, Entity)> {
    if world.has::<S>(a) && world.has::<T>(b) {
        Some((a, b))
    } else if world.has::<S>(b) && world.has::<T>(a) {
        Some((b, a))
    } else {
        None
    }
}

/// Enemy touching the player. Gated by the enemy's cooldown.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnemyAttackResolver;

impl CollisionResolver for EnemyAttackResolver {
    fn name(&self) -> &'static str {
        "enemy_attack"
    }

    fn kind(&self) -> EventKind {
        EventKind::Collision
    }

    fn classify(&self, world: &World, a: Entity, b: Entity) -> Option<(Entity, Entity)> {
        ordered::<EnemyAttackData, PlayerTag>(world, a, b)
    }

    fn resolve(&self, res: &mut Resolution<'_>, enemy: Entity, player: Entity) -> bool {
        if res.enemy_cooldowns.is_enabled(enemy) {
            return false;
        }
        let Some(attack) = res.enemy_attacks.get(enemy).copied() else {
            return false;
        };
        let Some(cooldown) = res.enemy_cooldowns.get_mut(enemy) else {
            return false;
        };
        *cooldown = EnemyCooldownExpiration::until(res.now + attack.cooldown);
        res.enemy_cooldowns.set_enabled(enemy, true);
        if let Some(buffer) = res.damage.get_mut(player) {
            buffer.push(attack.damage);
        }
        true
    }
}

/// Projectile entering an enemy. Single use.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectileHitResolver;

impl CollisionResolver for ProjectileHitResolver {
    fn name(&self) -> &'static str {
        "projectile_hit"
    }

    fn kind(&self) -> EventKind {
        EventKind::Trigger
    }

    fn classify(&self, world: &World, a: Entity, b: Entity) -> Option<(Entity, Entity)> {
        ordered::<ProjectileData, EnemyTag>(world, a, b)
    }

    fn resolve(&self, res: &mut Resolution<'_>, projectile: Entity, enemy: Entity) -> bool {
        let Some(damage) = res.projectiles.get(projectile).map(|p| p.damage) else {
            return false;
        };
        if let Some(buffer) = res.damage.get_mut(enemy) {
            buffer.push(damage);
        }
        res.destroy.set(projectile, true);
        true
    }
}

/// Gem entering anything that counts gems.
#[derive(Clone, Copy, Debug, Default)]
pub struct GemPickupResolver;

impl CollisionResolver for GemPickupResolver {
    fn name(&self) -> &'static str {
        "gem_pickup"
    }

    fn kind(&self) -> EventKind {
        EventKind::Trigger
    }

    fn classify(&self, world: &World, a: Entity, b: Entity) -> Option<(Entity, Entity)> {
        ordered::<GemTag, GemCollectedCount>(world, a, b)
    }

    fn resolve(&self, res: &mut Resolution<'_>, gem: Entity, player: Entity) -> bool {
        let Some(count) = res.gem_counts.get_mut(player) else {
            return false;
        };
        count.0 += 1;
        res.gem_ui.set(player, true);
        res.destroy.set(gem, true);
        true
    }
}

/// Outcome of one dispatch pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events seen.
    pub events: usize,
    /// Events that applied an effect.
    pub resolved: usize,
    /// Events routed to a resolver that declined them.
    pub gated: usize,
    /// Events no resolver claimed.
    pub ignored: usize,
}

/// Routes `events` through `resolvers` against `world` at time `now`.
pub fn dispatch<'e>(
    world: &World,
    now: f64,
    events: impl IntoIterator<Item = &'e CollisionEvent>,
    resolvers: &[Box<dyn CollisionResolver>],
) -> ECSResult<DispatchStats> {
    let mut res = Resolution::borrow(world, now)?;
    let mut stats = DispatchStats::default();
    for event in events {
        stats.events += 1;
        let routed = resolvers.iter().find_map(|resolver| {
            if resolver.kind() != event.kind {
                return None;
            }
            resolver.classify(world, event.a, event.b).map(|pair| (resolver, pair))
        });
        match routed {
            Some((resolver, (source, target))) => {
                if resolver.resolve(&mut res, source, target) {
                    log::trace!("{}: {source} -> {target}", resolver.name());
                    stats.resolved += 1;
                } else {
                    stats.gated += 1;
                }
            }
            None => stats.ignored += 1,
        }
    }
    Ok(stats)
}

/// The three gameplay resolvers in routing order.
pub fn default_resolvers() -> Vec<Box<dyn CollisionResolver>> {
    vec![
        Box::new(EnemyAttackResolver),
        Box::new(ProjectileHitResolver),
        Box::new(GemPickupResolver),
    ]
}

/// Consumes the tick's [`CollisionEvents`].
pub struct CollisionDispatchSystem {
    resolvers: Vec<Box<dyn CollisionResolver>>,
}

impl Default for CollisionDispatchSystem {
    fn default() -> Self {
        Self::with_resolvers(default_resolvers())
    }
}

impl CollisionDispatchSystem {
    /// Dispatcher routing through `resolvers`, first match wins.
    pub fn with_resolvers(resolvers: Vec<Box<dyn CollisionResolver>>) -> Self {
        Self { resolvers }
    }
}

impl System for CollisionDispatchSystem {
    fn name(&self) -> &'static str {
        "collision_dispatch"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<CollisionEvents>()
            .read::<PlayerTag>()
            .read::<EnemyTag>()
            .read::<GemTag>()
            .read::<EnemyAttackData>()
            .read::<ProjectileData>()
            .write::<DamageBuffer>()
            .write::<EnemyCooldownExpiration>()
            .write::<GemCollectedCount>()
            .write::<DestroyFlag>()
            .write::<UpdateGemUiFlag>()
            .build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let events = world.resource::<CollisionEvents>()?;
        if events.is_empty() {
            return Ok(());
        }
        let stats = dispatch(world, ctx.time().elapsed, events.iter(), &self.resolvers)?;
        log::trace!("{stats:?}");
        Ok(())
    }
}
