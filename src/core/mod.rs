pub mod error;
pub mod frame;
pub mod index;
