//! # Sheet Agent
//!
//! A tool-using LLM agent that reads, edits, formats and analyzes Excel
//! workbooks.
//!
//! This library provides:
//! - A text-protocol agent loop (`tool_call` fenced JSON blocks)
//! - Spreadsheet tools backed by `umya-spreadsheet` and `plotters`
//! - An OpenRouter client with retry on transient failures
//! - A SpreadsheetBench runner and evaluator
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sheet_agent::{agent::{Agent, AgentTask}, llm::OpenRouterClient, tools::ToolRegistry, Config};
//!
//! let config = Config::from_env()?;
//! let llm = Arc::new(OpenRouterClient::from_config(&config)?);
//! let agent = Agent::new(llm, Arc::new(ToolRegistry::spreadsheet(&config)));
//! let result = agent
//!     .run(&AgentTask::Interactive { request: "Summarize sales.xlsx".into(), file_path: None })
//!     .await?;
//! ```

pub mod agent;
pub mod benchmark;
pub mod config;
pub mod llm;
pub mod sheet;
pub mod tools;

pub use config::Config;
