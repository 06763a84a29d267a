pub mod file_storage_handler;
pub use file_storage_handler::*;

pub mod zmodem;
pub use zmodem::*;
