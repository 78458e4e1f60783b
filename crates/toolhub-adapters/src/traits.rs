//! Core adapter trait and supporting types.
//!
//! Every provider adapter implements the [`Adapter`] trait, giving callers a
//! uniform way to discover tools and invoke them by name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The category of service an adapter provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Payments and billing (Stripe).
    Payments,
    /// Task and project trackers (Asana, ClickUp, Linear, Todoist, Airtable).
    Productivity,
    /// Developer tooling (GitLab, Sentry).
    DevTools,
    /// Web and news search (Brave, News API).
    Search,
    /// Hosted language and media models (Claude, OpenAI, Gemini, Hugging Face).
    LanguageModel,
    /// Translation services (DeepL).
    Translation,
    /// Vector databases (Pinecone).
    VectorDatabase,
    /// Market, media and lookup data (Alpha Vantage, CoinGecko, TMDB, Abstract).
    Data,
    /// Messaging and marketing (Twilio, Mailchimp).
    Messaging,
    /// Document processing and library docs (PDF.co, Context7).
    Documents,
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payments => write!(f, "payments"),
            Self::Productivity => write!(f, "productivity"),
            Self::DevTools => write!(f, "devtools"),
            Self::Search => write!(f, "search"),
            Self::LanguageModel => write!(f, "language_model"),
            Self::Translation => write!(f, "translation"),
            Self::VectorDatabase => write!(f, "vector_database"),
            Self::Data => write!(f, "data"),
            Self::Messaging => write!(f, "messaging"),
            Self::Documents => write!(f, "documents"),
        }
    }
}

/// A tool exposed by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Machine-readable tool name (e.g. `stripe_list_customers`).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub parameters: serde_json::Value,
}

/// Credentials an adapter reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequirement {
    /// The provider the credentials belong to (e.g. `stripe`).
    pub provider: String,
    /// Environment variables that must be set.
    pub env_vars: Vec<String>,
    /// Environment variables that are read when present.
    pub optional_env_vars: Vec<String>,
}

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// The universal adapter interface.
///
/// Adapters are stateless beyond their resolved credentials: every
/// [`Adapter::execute_tool`] call is an independent request/response
/// translation, so a single instance can serve concurrent calls.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Return the unique identifier for this adapter instance.
    fn id(&self) -> &str;

    /// Return the category of service this adapter provides.
    fn adapter_type(&self) -> AdapterType;

    /// Return the list of tools this adapter exposes.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with the given JSON parameters.
    ///
    /// Returns a JSON value representing the tool's output.
    async fn execute_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Return the authentication requirements for this adapter, if any.
    fn required_auth(&self) -> Option<AuthRequirement>;
}
