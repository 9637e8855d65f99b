pub mod cache;
pub mod database;
pub mod http;
pub mod network;
pub mod offline;
