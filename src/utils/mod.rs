pub mod domain;
pub mod fs;
