//! Wire models shared between the scan bridge service and its clients.

pub mod model;
pub mod requests;
pub mod responses;
