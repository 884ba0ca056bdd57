#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod atomic;
pub mod bots;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod extension;
pub mod i18n;
pub mod provider;
pub mod session;
pub mod terminal;
pub mod tools;
