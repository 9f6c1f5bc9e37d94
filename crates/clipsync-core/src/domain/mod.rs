//! Domain values for ClipSync.
//!
//! Pure types with no I/O.  The address is parsed here, but resolved and
//! dialled by the application crate.

pub mod address;

pub use address::{Address, AddressError};
