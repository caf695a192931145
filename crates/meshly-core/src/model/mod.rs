//! Domain model -- the canonical entity types the store holds, plus
//! the partial-update deltas the reconciler feeds into it.

pub mod device;
pub mod group;
pub mod status;

pub use device::{Device, DeviceDelta, ProductType};
pub use group::{BROADCAST_GROUP_ID, Group, GroupDelta};
pub use status::{MeshStatus, RadioState, StatusDelta};
