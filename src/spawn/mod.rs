//! Request normalization and plan compilation
//!
//! Pure transformations from a [`request::SpawnRequest`] to a
//! [`plan::CompiledPlan`]. Nothing here touches the descriptor table.

pub mod actions;
pub mod descriptor;
pub mod normalize;
pub mod plan;
pub mod request;
