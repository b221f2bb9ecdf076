pub mod acquisition;
pub mod domain;
pub mod error;
pub mod protocol;
