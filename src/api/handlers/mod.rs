pub mod account;
pub mod admin;
pub mod challenges;
pub mod events;
pub mod health;
pub mod notifications;
pub mod telegram;
