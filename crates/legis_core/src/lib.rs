pub mod action;
pub mod bill;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod html;
pub mod pipeline;
pub mod refresh;
pub mod roster;
pub mod schema;
pub mod vote;
