//! # runctl graph
//!
//! A small dynamic value model and a cycle-safe deep cloner over it.
//!
//! [`Value`] covers primitives, symbols, functions, host handles and shared
//! mutable [`Object`]s. Objects carry a kind (plain, array, map, set, date,
//! regexp), an optional prototype and own properties with full descriptors.
//!
//! [`deep_clone`] copies a graph while preserving cycles, shared nodes,
//! symbol keys, accessors and descriptor flags. [`deep_equal`] compares two
//! graphs structurally.

mod clone;
mod equal;
mod value;

pub use clone::deep_clone;
pub use equal::deep_equal;
pub use value::{
    Function, HostHandle, Object, ObjectData, ObjectId, ObjectKind, Property, PropertyKey, Symbol,
    Value,
};
