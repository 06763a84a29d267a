pub mod com;
pub mod data;
pub mod protocol;
