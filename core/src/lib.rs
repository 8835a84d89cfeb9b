//! Core library of Virtual Headquarters.
//!
//! [`storage`] maps project trees with stable item IDs onto directories on
//! disk; [`api`] exposes the same operations as tagged JSON requests.

pub mod api;
pub mod storage;
