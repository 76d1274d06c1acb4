//! Bridge daemon: wires the control plane, the relay and the trigger
//! listener around a stand-in attack engine.

pub mod daemon;
pub mod engine;
pub mod fixtures;
