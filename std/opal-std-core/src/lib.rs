//!
//! opal-std-core - Core Runtime Types
//!
//! This crate provides the fundamental types shared across all opal bridge
//! crates:
//!
//! - `HeapHeader` and `HeapTag` for reference-counted heap objects
//! - `OpalString` for heap-allocated, length-delimited byte strings
//! - `OpalArray` for heap-allocated dynamic arrays
//! - `OpalExternal` for native resources owned by the host, with a
//!   registered release callback invoked exactly once
//! - Exception handling primitives for the host's recoverable-failure
//!   representation
//!
//! All heap objects use atomic reference counting. Values cross the boundary
//! as raw pointers or inline 64-bit primitives.
//!

pub mod array;
pub mod exception;
pub mod external;
pub mod value;

pub use array::*;
pub use exception::*;
pub use external::*;
pub use value::*;
