pub mod stats;
pub mod track;
