pub mod app_config;
pub mod auth;
pub mod constants;
pub mod error;
pub mod ip;
pub mod orm;
pub mod password;
pub mod prune;
pub mod query;
pub mod rate_limit;
pub mod render;
pub mod search;
pub mod soft_delete;
pub mod store;
pub mod web;
