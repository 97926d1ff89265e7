pub mod logger;
pub mod num;
