// tokencart_service/src/lib.rs

//! Checkout service: charges a card or wallet payment, records the order, then
//! accounts discount usage, credits tokens, and sends the confirmation email.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;
