pub mod message;
pub mod range;
