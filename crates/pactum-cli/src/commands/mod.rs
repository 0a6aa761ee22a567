//! Command handlers.

pub(crate) mod bulk;
pub(crate) mod job;
