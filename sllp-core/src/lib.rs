//! # sllp-core
//!
//! Registry for the SLLP server engine.
//!
//! This crate provides:
//! - Variables backed by buffers shared with the embedding application
//! - The standard ALL/READ/WRITE groups and user-created groups
//! - Curves with pluggable block storage and MD5 checksums
//! - The before-read/after-write notification hook

pub mod curve;
pub mod error;
pub mod group;
pub mod hook;
pub mod registry;
pub mod variable;

pub use curve::{
    BlockReader, BlockWriter, Checksum, Curve, CurveDef, CurveId, MemoryCurve, CURVE_BLOCK_SIZE,
};
pub use error::CoreError;
pub use group::{Group, GroupId, GROUP_ALL_ID, GROUP_READ_ID, GROUP_WRITE_ID, STANDARD_GROUP_COUNT};
pub use hook::{Hook, Operation};
pub use registry::{Registry, MAX_CURVES, MAX_GROUPS, MAX_VARIABLES};
pub use variable::{UserTag, VarData, VarId, Variable, VariableDef};
