//! llmprobe-core: check engine for LLM HTTP APIs.
//!
//! Probes endpoints speaking any of the three incompatible wire protocols
//! (OpenAI-style, Anthropic-style, Gemini-style) and reports, per provider
//! configuration, whether the endpoint is reachable, whether chat and
//! streaming work (with time-to-first-token), whether multi-turn context is
//! honored, and which models are listed.
//!
//! - [`protocol`]: adapter trait + the three wire-protocol implementations
//! - [`check`]: the per-configuration check battery and result types
//! - [`batch`]: bounded-concurrency fan-out over many configurations or keys
//! - [`registry`]: builtin provider presets
//! - [`config`]: typed JSON configuration resolved against the registry
//! - [`history`]: one-way sink contract for persisting results
//! - [`measure`]: latency measurement primitives
//!
//! # Quick Start
//!
//! ```no_run
//! use llmprobe_core::check::{CheckConfig, Checker};
//! use llmprobe_core::protocol::ProtocolKind;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let checker = Checker::new();
//! let config = CheckConfig {
//!     provider_id: "openai".into(),
//!     provider_name: "OpenAI".into(),
//!     base_url: "https://api.openai.com/v1".into(),
//!     api_key: "sk-...".into(),
//!     model: "gpt-4o-mini".into(),
//!     protocol: ProtocolKind::Openai,
//! };
//! let result = checker.run_check(&config).await?;
//! println!("{} items checked", result.results.len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod check;
pub mod config;
pub mod error;
pub mod history;
pub mod measure;
pub mod protocol;
pub mod registry;
