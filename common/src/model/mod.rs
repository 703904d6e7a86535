pub mod record;
pub mod scan;
