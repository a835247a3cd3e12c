pub mod admin;
pub mod captcha;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod group;
pub mod messages;
pub mod polling;
pub mod store;
pub mod verifier;
