//! Provider registry.
//!
//! Builds every known provider from an injected [`Env`] and the TOML
//! configuration.  Providers whose mandatory credentials are missing are
//! skipped and remembered with the reason, so callers can report why a
//! tool is unavailable instead of "not found".

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ToolhubConfig;
use crate::credentials::Env;
use crate::error::{AdapterError, Result};
use crate::operation::{Provider, ServiceAdapter};
use crate::providers::*;
use crate::traits::{Adapter, AdapterType, ToolDefinition};
use crate::transport::HttpTransport;

// ---------------------------------------------------------------------------
// Provider status
// ---------------------------------------------------------------------------

/// Why a provider is or is not available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderState {
    Enabled,
    /// Turned off in the configuration file.
    Disabled,
    /// Construction failed, usually a missing credential.
    Skipped { reason: String },
}

/// One known provider and what became of it.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: &'static str,
    pub adapter_type: AdapterType,
    #[serde(flatten)]
    pub state: ProviderState,
    /// Tool definitions, available even when the provider is not enabled.
    #[serde(skip)]
    pub tools: Vec<ToolDefinition>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every provider adapter, built once and shared.
pub struct Registry {
    adapters: Vec<Arc<dyn Adapter>>,
    statuses: Vec<ProviderStatus>,
    /// Tool name to index into `adapters`.
    routes: HashMap<String, usize>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("enabled", &self.adapters.len())
            .field("known", &self.statuses.len())
            .finish()
    }
}

impl Registry {
    /// Build all providers, sharing one transport.
    pub fn from_env(env: &dyn Env, config: &ToolhubConfig, transport: HttpTransport) -> Self {
        let mut registry = Self {
            adapters: Vec::new(),
            statuses: Vec::new(),
            routes: HashMap::new(),
        };

        registry.register::<AbstractApi>(env, config, &transport);
        registry.register::<Airtable>(env, config, &transport);
        registry.register::<AlphaVantage>(env, config, &transport);
        registry.register::<Asana>(env, config, &transport);
        registry.register::<Brave>(env, config, &transport);
        registry.register::<Claude>(env, config, &transport);
        registry.register::<ClickUp>(env, config, &transport);
        registry.register::<CoinGecko>(env, config, &transport);
        registry.register::<Context7>(env, config, &transport);
        registry.register::<DeepL>(env, config, &transport);
        registry.register::<Gemini>(env, config, &transport);
        registry.register::<GitLab>(env, config, &transport);
        registry.register::<HuggingFace>(env, config, &transport);
        registry.register::<Linear>(env, config, &transport);
        registry.register::<Mailchimp>(env, config, &transport);
        registry.register::<NewsApi>(env, config, &transport);
        registry.register::<OpenAi>(env, config, &transport);
        registry.register::<PdfCo>(env, config, &transport);
        registry.register::<Pinecone>(env, config, &transport);
        registry.register::<Sentry>(env, config, &transport);
        registry.register::<Stripe>(env, config, &transport);
        registry.register::<Tmdb>(env, config, &transport);
        registry.register::<Todoist>(env, config, &transport);
        registry.register::<Twilio>(env, config, &transport);

        info!(
            enabled = registry.adapters.len(),
            known = registry.statuses.len(),
            tools = registry.routes.len(),
            "registry ready"
        );
        registry
    }

    fn register<P: Provider>(&mut self, env: &dyn Env, config: &ToolhubConfig, transport: &HttpTransport) {
        let settings = config.settings(P::ID);
        let tools = P::operations().iter().map(|op| op.definition()).collect();

        let state = if !settings.enabled {
            debug!(provider = P::ID, "disabled in configuration");
            ProviderState::Disabled
        } else {
            match ServiceAdapter::<P>::from_env(env, &settings, transport.clone()) {
                Ok(adapter) => {
                    let index = self.adapters.len();
                    for tool in adapter.tools() {
                        self.routes.insert(tool.name, index);
                    }
                    self.adapters.push(Arc::new(adapter));
                    info!(provider = P::ID, "provider enabled");
                    ProviderState::Enabled
                }
                Err(e) => {
                    warn!(provider = P::ID, reason = %e, "provider skipped");
                    ProviderState::Skipped {
                        reason: e.to_string(),
                    }
                }
            }
        };

        self.statuses.push(ProviderStatus {
            id: P::ID,
            adapter_type: P::ADAPTER_TYPE,
            state,
            tools,
        });
    }

    /// Every known provider, in registration order.
    pub fn statuses(&self) -> &[ProviderStatus] {
        &self.statuses
    }

    /// The built adapters.
    pub fn adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    /// The adapter serving `tool`, if its provider is enabled.
    pub fn find_tool(&self, tool: &str) -> Option<&Arc<dyn Adapter>> {
        self.routes.get(tool).map(|&i| &self.adapters[i])
    }

    /// Definition of any known tool, enabled or not.
    pub fn definition(&self, tool: &str) -> Option<&ToolDefinition> {
        self.statuses
            .iter()
            .flat_map(|s| s.tools.iter())
            .find(|t| t.name == tool)
    }

    /// Invoke a tool by name.
    ///
    /// A tool whose provider was skipped or disabled fails with a
    /// configuration error naming the reason.
    pub async fn call(&self, tool: &str, params: Value) -> Result<Value> {
        if let Some(adapter) = self.find_tool(tool) {
            return adapter.execute_tool(tool, params).await;
        }

        let owner = self
            .statuses
            .iter()
            .find(|s| s.tools.iter().any(|t| t.name == tool));
        match owner.map(|s| (s.id, &s.state)) {
            Some((id, ProviderState::Skipped { reason })) => Err(AdapterError::ConfigError(
                format!("provider `{id}` is not available: {reason}"),
            )),
            Some((id, _)) => Err(AdapterError::ConfigError(format!(
                "provider `{id}` is disabled in the configuration"
            ))),
            None => Err(AdapterError::ToolNotFound {
                adapter_id: "registry".into(),
                tool_name: tool.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::credentials::MapEnv;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::collections::HashSet;

    fn registry(env: MapEnv, config: ToolhubConfig) -> Registry {
        Registry::from_env(&env, &config, HttpTransport::new())
    }

    // -- Catalog --

    #[test]
    fn knows_all_providers_without_credentials() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        assert_eq!(r.statuses().len(), 24);
        assert!(r.adapters().is_empty());
        assert!(
            r.statuses()
                .iter()
                .all(|s| matches!(s.state, ProviderState::Skipped { .. }))
        );
    }

    #[test]
    fn tool_names_are_unique_and_prefixed() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        let mut seen = HashSet::new();
        for status in r.statuses() {
            assert!(!status.tools.is_empty(), "{} has no tools", status.id);
            for tool in &status.tools {
                assert!(
                    tool.name.starts_with(&format!("{}_", status.id)),
                    "{} is not prefixed with {}",
                    tool.name,
                    status.id
                );
                assert!(seen.insert(tool.name.clone()), "duplicate tool {}", tool.name);
            }
        }
    }

    #[test]
    fn established_tool_names_are_kept() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        for name in [
            "abstract_geolocate_ip",
            "alphavantage_get_stock_quote",
            "claude_compare_responses",
            "claude_multi_turn_conversation",
            "coingecko_get_coin_price",
            "deepl_translate_text",
            "newsapi_get_top_headlines",
            "pdfco_pdf_add_watermark",
            "pinecone_query_vectors",
            "tmdb_get_movie_credits",
            "tmdb_get_tv_credits",
            "todoist_complete_task",
            "twilio_lookup_phone_number",
        ] {
            assert!(r.definition(name).is_some(), "missing {name}");
        }
        assert!(r.definition("tmdb_get_credits").is_none());
    }

    #[test]
    fn skip_reason_names_the_variable() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        let stripe = r.statuses().iter().find(|s| s.id == "stripe").unwrap();
        let ProviderState::Skipped { reason } = &stripe.state else {
            panic!("stripe should be skipped");
        };
        assert!(reason.contains("STRIPE_API_KEY"));
    }

    // -- Enabling --

    #[test]
    fn credentials_enable_providers() {
        let env = MapEnv::new().with("STRIPE_API_KEY", "sk_test");
        let r = registry(env, ToolhubConfig::default());
        assert_eq!(r.adapters().len(), 1);
        assert!(r.find_tool("stripe_list_customers").is_some());
        assert!(r.find_tool("todoist_list_tasks").is_none());
        assert!(r.definition("todoist_list_tasks").is_some());
    }

    #[test]
    fn configuration_can_disable() {
        let mut config = ToolhubConfig::default();
        config.set(
            "stripe",
            ProviderSettings {
                enabled: false,
                base_url: None,
            },
        );
        let env = MapEnv::new().with("STRIPE_API_KEY", "sk_test");
        let r = registry(env, config);
        assert!(r.adapters().is_empty());
        let stripe = r.statuses().iter().find(|s| s.id == "stripe").unwrap();
        assert_eq!(stripe.state, ProviderState::Disabled);
    }

    // -- Dispatch --

    #[tokio::test]
    async fn calls_to_skipped_providers_are_configuration_errors() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        let err = r.call("stripe_list_customers", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("STRIPE_API_KEY"));
    }

    #[tokio::test]
    async fn unknown_tools_are_not_found() {
        let r = registry(MapEnv::new(), ToolhubConfig::default());
        let err = r.call("nope_nothing", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn local_tools_dispatch_without_network() {
        let env = MapEnv::new().with("ANTHROPIC_API_KEY", "k");
        let r = registry(env, ToolhubConfig::default());
        let out = r.call("claude_get_model_info", json!({})).await.unwrap();
        assert_eq!(out["context_window"], 200000);
    }
}
