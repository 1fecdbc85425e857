//! AI Debate - guided role-play activities with structured reflection.
//!
//! A student chats with one or two AI-driven historical or fictional
//! characters, ends the chat, answers a short set of reflection questions
//! and receives an AI evaluation. The whole run can be exported as a
//! markdown transcript.
//!
//! The crate follows a hexagonal layout: `domain` holds the activity
//! lifecycle, `ports` the boundaries (AI service, translations, export),
//! `adapters` their implementations and `application` the handlers that
//! tie them together.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
