//! Looper: a conversational front end for Xtreamly loop trading and
//! market volatility state.
//!
//! Each inbound message is routed to at most one command action. A command
//! action composes the conversation, renders its extraction template, asks
//! the LLM for parameters, validates them against the command schema, then
//! dispatches the typed request or rejects it with a fixed reply.

pub mod actions;
pub mod agent;
pub mod bootstrap;
pub mod channels;
pub mod character;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod schema;
pub mod settings;
pub mod xtreamly;
