//! HTTP handlers behind the generated route sets.

pub mod entity;
pub mod owned;
