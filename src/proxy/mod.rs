//! Front-line proxy nodes
//!
//! A proxy holds a cache of the master's mapping and no authority of its own:
//! reads fall through to the master on a miss, writes always go to it.

pub mod replica;

pub use replica::ReplicaProxy;
