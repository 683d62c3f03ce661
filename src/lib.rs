//! NPC Sensor Engine
//!
//! Lets scripted NPCs in a live, mutable spatial world perceive nearby
//! objects and agents through filtered sensing queries, one-shot or
//! periodically repeating, and receive distance-ordered detection events.
//!
//! Each region registered with [`engine::SensorEngine`] gets its own
//! spatial index, registry of repeating queries, background ingestion
//! worker, and one shared adaptive timer; there is no process-wide state.
//! The scene, NPC, and script-host collaborators plug in through the
//! seams in [`scene`] and [`sensor::events`].
//!
//! One-shot calls run synchronously on the caller's thread; hosts are
//! expected to serialize calls per script, while different scripts may
//! sense concurrently.

pub mod config;
pub mod engine;
pub mod error;
pub mod region;
pub mod scene;
pub mod sensor;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;
