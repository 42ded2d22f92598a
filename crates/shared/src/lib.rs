pub mod domain;
pub mod error;
pub mod frame;
pub mod protocol;
