//! Wellbeing Hub - staff wellbeing intranet
//!
//! Announcements, news, events, policy documents, downloads and staff
//! submissions behind passwordless (magic link) sign-in.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
