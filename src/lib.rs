pub mod config;
pub mod dispatch;
pub mod exec;
pub mod judge;
pub mod routes;
pub mod sandbox;
pub mod web_server;
pub mod workspace;
