//! Bantah - social prediction events and peer-to-peer challenges
//!
//! This library provides the backend for Bantah: wallets, prediction
//! events, one-to-one challenges, notifications and the Telegram bot.
//!
//! # Architecture
//! - `storage`: SeaORM persistence (SQLite, MySQL, PostgreSQL)
//! - `services`: domain logic (users, wallets, events, challenges, linking)
//! - `telegram`: Bot API client, update handling, channel broadcasts, relay bot
//! - `api`: HTTP handlers, session auth and middleware
//! - `scheduler`: periodic jobs (expiry, reminders, notification delivery)
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod system;
pub mod telegram;
pub mod utils;
