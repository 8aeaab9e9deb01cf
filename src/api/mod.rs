pub mod analysis;
pub mod chat;
pub mod files;
pub mod session;
pub mod upload;
