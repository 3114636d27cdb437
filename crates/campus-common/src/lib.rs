//! # campus-common
//!
//! Shared types and utilities for the Campus messaging backend:
//! models, configuration, error types, the access evaluator, and the
//! room-event envelope used between the API and the realtime gateway.

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod room_event;
pub mod validation;
