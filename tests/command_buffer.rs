use survivor_sim::engine::error::{ECSError, PlaybackError};
use survivor_sim::{CommandBuffer, Template, World};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Name(&'static str);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Armed;

fn world() -> World {
    let mut world = World::new();
    world.register_component::<Name>().unwrap();
    world.register_component::<Armed>().unwrap();
    world
}

#[test]
fn recording_does_not_touch_the_world() {
    let mut world = world();
    let template = world.register_template(Template::new("unit").with(Name("unit")));
    let e = world.spawn().unwrap();

    let mut buffer = CommandBuffer::new();
    buffer.instantiate(template);
    buffer.destroy(e);
    assert_eq!(buffer.len(), 2);
    assert_eq!(world.entity_count(), 1);
    assert!(world.is_alive(e));

    let report = world.playback(buffer).unwrap();
    assert_eq!(world.entity_count(), 1);
    assert!(!world.is_alive(e));
    assert_eq!(report.destroyed, 1);
    assert_eq!(report.applied, 2);
}

#[test]
fn provisional_handles_resolve_in_order() {
    let mut world = world();
    let template = world.register_template(
        Template::new("unit").with(Name("default")).with_disabled(Armed),
    );

    let mut buffer = CommandBuffer::new();
    let first = buffer.instantiate(template);
    let second = buffer.instantiate(template);
    buffer.set_component(second, Name("renamed"));
    buffer.set_enabled::<Armed>(first, true);
    let report = world.playback(buffer).unwrap();

    let first = report.resolve(first).unwrap();
    let second = report.resolve(second).unwrap();
    assert_eq!(world.cloned::<Name>(first), Some(Name("default")));
    assert_eq!(world.cloned::<Name>(second), Some(Name("renamed")));
    assert!(world.is_enabled::<Armed>(first));
    assert!(!world.is_enabled::<Armed>(second));
    assert!(first.index() < second.index());
}

#[test]
fn later_commands_see_earlier_ones() {
    let mut world = world();
    let mut buffer = CommandBuffer::new();
    let e = buffer.spawn();
    buffer.set_component(e, Name("a"));
    buffer.remove_component::<Name>(e);
    buffer.set_component(e, Armed);
    let report = world.playback(buffer).unwrap();

    let e = report.resolve(e).unwrap();
    assert!(!world.has::<Name>(e));
    assert!(world.has::<Armed>(e));
}

#[test]
fn stale_targets_are_skipped() {
    let mut world = world();
    let e = world.spawn().unwrap();

    let mut buffer = CommandBuffer::new();
    buffer.destroy(e);
    buffer.destroy(e);
    buffer.set_component(e, Name("ghost"));
    let report = world.playback(buffer).unwrap();

    assert_eq!(report.destroyed, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn destroying_a_provisional_entity_in_the_same_buffer() {
    let mut world = world();
    let mut buffer = CommandBuffer::new();
    let e = buffer.spawn();
    buffer.destroy(e);
    buffer.set_component(e, Name("late"));
    let report = world.playback(buffer).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn foreign_provisional_handle_is_an_error() {
    let mut world = world();
    let mut other = CommandBuffer::new();
    let foreign = other.spawn();

    let mut buffer = CommandBuffer::new();
    buffer.set_component(foreign, Name("x"));
    let err = world.playback(buffer).unwrap_err();
    assert!(matches!(err, ECSError::Playback(PlaybackError::ForeignProvisional(_))));
}

#[test]
fn unknown_template_fails_playback() {
    let mut world = world();
    let mut other = World::new();
    other.register_template(Template::new("a"));
    let missing = other.register_template(Template::new("b"));

    let mut buffer = CommandBuffer::new();
    buffer.instantiate(missing);
    assert!(world.playback(buffer).is_err());
    assert_eq!(world.entity_count(), 0);
}
