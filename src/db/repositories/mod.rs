pub mod runs;
pub mod tables;
