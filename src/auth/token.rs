//! Token record and secret models.

pub mod record;
pub mod secret;
