//! # Game Module
//!
//! Arena-survival gameplay built on [`crate::engine`].
//!
//! Each file holds one concern and the systems implementing it;
//! [`session::Game`] registers them in their phases. External
//! collaborators (physics, input, UI, camera) are traits or context objects
//! passed in at construction, never globals.

pub mod components;
pub mod config;
pub mod physics;
pub mod movement;
pub mod cooldown;
pub mod collision;
pub mod damage;
pub mod spawner;
pub mod destruction;
pub mod presentation;
pub mod prefabs;
pub mod session;
