//! Destruction pipeline.
//!
//! Consumes enabled [`DestroyFlag`]s at the end of PhysicsReaction. Side
//! effects happen here; removal itself is recorded on the
//! `EndPhysicsReaction` buffer so nothing downstream in the tick sees the
//! entity. Drops are recorded on `BeginTick` and appear next tick.

use std::sync::Arc;

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::scheduler::Barrier;
use crate::engine::systems::{access, System, SystemContext};
use crate::engine::types::{AccessSets, Entity};
use crate::game::components::{DestroyFlag, GemDrop, PlayerTag, SessionState, Transform};
use crate::game::presentation::UiSink;

/// Removes flagged entities, dropping gems and ending the session on player death.
pub struct DestructionSystem {
    ui: Arc<dyn UiSink>,
}

impl DestructionSystem {
    /// Destruction that reports game over to `ui`.
    pub fn new(ui: Arc<dyn UiSink>) -> Self {
        Self { ui }
    }
}

impl System for DestructionSystem {
    fn name(&self) -> &'static str {
        "destruction"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<DestroyFlag>()
            .read::<PlayerTag>()
            .read::<GemDrop>()
            .read::<Transform>()
            .write::<SessionState>()
            .build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let query = world.query().enabled::<DestroyFlag>().build()?;
        let doomed: Vec<Entity> = world.iter(&query)?.collect();
        if doomed.is_empty() {
            return Ok(());
        }

        let drops = world.read::<GemDrop>()?;
        let transforms = world.read::<Transform>()?;
        for entity in doomed {
            if world.has::<PlayerTag>(entity) {
                let mut session = world.resource_mut::<SessionState>()?;
                if !session.game_over {
                    session.game_over = true;
                    log::info!("player {entity} destroyed");
                    self.ui.show_game_over();
                }
            }

            if let (Some(drop), Some(transform)) = (drops.get(entity), transforms.get(entity)) {
                let commands = ctx.commands(Barrier::BeginTick);
                let gem = commands.instantiate(drop.0);
                commands.set_component(gem, Transform::at(transform.position));
            }

            ctx.commands(Barrier::EndPhysicsReaction).destroy(entity);
            log::debug!("destroy {entity} queued");
        }
        Ok(())
    }
}
