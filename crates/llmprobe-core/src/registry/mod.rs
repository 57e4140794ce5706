//! Builtin provider registry.
//!
//! Read-only presets for the well-known providers; consulted to fill
//! defaults when a configuration entry omits base URL, protocol or model.
//! Custom providers live entirely in the caller's configuration and never
//! touch this table.

use serde::Serialize;

use crate::protocol::ProtocolKind;

/// One builtin provider definition.
#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "baseURL")]
    pub base_url: &'static str,
    pub protocol: ProtocolKind,
    pub models: &'static [&'static str],
}

static PRESETS: &[Preset] = &[
    Preset {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        protocol: ProtocolKind::Openai,
        models: &["gpt-4o", "gpt-4o-mini", "o3-mini"],
    },
    Preset {
        id: "anthropic",
        name: "Anthropic",
        base_url: "https://api.anthropic.com/v1",
        protocol: ProtocolKind::Anthropic,
        models: &["claude-sonnet-4-20250514", "claude-3-5-haiku-20241022"],
    },
    Preset {
        id: "gemini",
        name: "Google Gemini",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        protocol: ProtocolKind::Gemini,
        models: &["gemini-2.0-flash", "gemini-1.5-pro"],
    },
    Preset {
        id: "deepseek",
        name: "DeepSeek",
        base_url: "https://api.deepseek.com/v1",
        protocol: ProtocolKind::Openai,
        models: &["deepseek-chat", "deepseek-reasoner"],
    },
    Preset {
        id: "groq",
        name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        protocol: ProtocolKind::Openai,
        models: &["llama-3.3-70b-versatile"],
    },
    Preset {
        id: "openrouter",
        name: "OpenRouter",
        base_url: "https://openrouter.ai/api/v1",
        protocol: ProtocolKind::Openai,
        models: &["anthropic/claude-sonnet-4-5", "openai/gpt-4o"],
    },
    Preset {
        id: "ollama",
        name: "Ollama",
        base_url: "http://localhost:11434/v1",
        protocol: ProtocolKind::Openai,
        models: &["llama3.2", "qwen2.5"],
    },
];

/// All builtin presets, in display order.
pub fn presets() -> &'static [Preset] {
    PRESETS
}

/// Look up a builtin preset by id.
pub fn find(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}
