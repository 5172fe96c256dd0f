//! Bucket history collection and changeset planning.
//!
//! Objects are listed, their versions collected and merged, then sorted by
//! modification time and cut into changesets that each become one commit.

pub mod grouping;
pub mod listing;
pub mod model;
pub mod policy;

pub use grouping::{group_changesets, plan_changesets, sort_chronologically};
pub use listing::{list_objects, list_versions, KeyMatch, ObjectListing, VersionListing};
pub use model::{Changeset, ObjectRef, VersionRecord};
pub use policy::{FailurePolicy, Stage};
