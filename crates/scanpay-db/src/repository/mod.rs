//! # Repositories
//!
//! One repository per stored document. Each is a cheap `Clone` over the
//! pool, handed out by [`crate::Database`].

pub mod cart_slot;
pub mod device;
