//! Copies the full content of one graph store into another.
//!
//! A copy runs in two phases. Nodes are streamed from a [`DataReader`],
//! written in batches by a bounded pool of [`DataWriter`] workers, and their
//! target ids recorded in an [`IdentityMap`]. Relationships follow once every
//! node has landed, with endpoints resolved through that map. A
//! [`SourceGuard`] can hold the source read-only while the copy runs.
//!
//! [`SqliteGraph`] is the bundled store; [`SqliteReader`] and [`SqliteWriter`]
//! adapt it to the copy pipeline.

pub mod backend;
pub mod errors;
pub mod graph;
pub mod guard;
pub mod identity;
pub mod options;
pub mod progress;
pub mod safety;
pub mod schema;
pub mod transfer;

pub use crate::backend::{DataReader, DataWriter, SqliteReader, SqliteWriter};
pub use crate::errors::{CopyError, GraphStoreError};
pub use crate::graph::{GraphNode, GraphRelationship, PropertyMap, SqliteGraph};
pub use crate::guard::{AccessMode, DatabaseAdmin, GuardPhase, Protection, SourceGuard};
pub use crate::identity::{IdentityMap, NodeMapping};
pub use crate::options::{CopyOptions, CopyOptionsBuilder};
pub use crate::progress::{ConsoleProgress, ProgressSink, SilentProgress};
pub use crate::safety::{SafetyReport, VerificationReport};
pub use crate::transfer::{Phase, TransferStats, copy_database, transfer};
