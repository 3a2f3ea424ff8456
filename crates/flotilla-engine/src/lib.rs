//! Real-time 5v5 fleet combat simulation.
//!
//! This crate holds everything that happens inside a single match:
//!
//! - [`core`] - Per-vessel kinematic state, command-confidence decay, and the
//!   match-owned [`Roster`] that maps vessel identifiers to vessels
//! - [`engine`] - The per-tick systems: tactical targeting, admiral orders, pilot
//!   decisions, combat resolution, and the [`Battle`] loop that drives them
//!
//! # Tick Order
//!
//! Every tick of a [`Battle`] runs the same sequence:
//!
//! ```text
//! Pilot decisions (one VesselAction per living vessel)
//!     ↓
//! Admiral orders (every `command_interval_ticks`)
//!     ↓
//! Physics (thrust, integration, confidence decay)
//!     ↓
//! Targeting (assignment computed from post-physics state)
//!     ↓
//! Combat (damage, kills, termination check)
//! ```
//!
//! Vessels and assignments never own each other; both sides refer to vessels by
//! [`VesselId`] and resolve them through the roster owned by the battle.

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;
