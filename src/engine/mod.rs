//! # Engine Module
//!
//! Game-agnostic ECS core.
//!
//! This module contains the building blocks every gameplay system relies on:
//! - Entity allocation and component storage with enabled bits
//! - Queries over presence and enabled state
//! - Templates and deferred command buffers
//! - Systems, phases and the stage scheduler
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod component;
pub mod storage;
pub mod entity;
pub mod query;
pub mod template;
pub mod commands;
pub mod world;
pub mod time;
pub mod systems;
pub mod scheduler;
