//! # CueLink Model
//!
//! Shared data model for the CueLink sync server:
//! - Show-data entities owned by the desktop document layer
//!   ([`CueStack`], [`Column`], [`Cue`])
//! - Snapshots served to polling clients ([`StackSnapshot`])
//! - Mutation messages handed to the document layer ([`CueMutation`])
//! - Wire payloads for every HTTP endpoint (the [`wire`] module)
//!
//! The server core never mutates show data directly; it routes
//! [`CueMutation`] values to the owning layer and reads snapshots back.

mod mutation;
mod show;
pub mod wire;

pub use mutation::{CueMutation, MutationOutcome};
pub use show::{Column, Cue, CueStack, StackSnapshot};
