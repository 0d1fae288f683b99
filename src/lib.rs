//! Kick station backend: serial kick pads, match state machine and an offline-first score queue.

pub mod config;
pub mod dao;
pub mod device;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod sync;
