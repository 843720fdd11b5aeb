//! Core data models for the audio resource service.
//!
//! `Resource` maps to the local `resources` table via `sqlx::FromRow`;
//! `MetadataRecord` is the JSON payload registered with the song service.

pub mod metadata;
pub mod resource;
