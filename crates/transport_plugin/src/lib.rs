pub mod message;
pub mod plugin;
pub mod session;
