//! Generic typed operations.
//!
//! A provider is a credential-carrying context type plus a table of
//! [`Operation`]s.  Each operation pairs a parameter schema with a builder
//! (arguments to [`RequestDescriptor`]) and a shaper (response to value).
//! [`ServiceAdapter`] implements [`Adapter`] once for every provider.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::credentials::Env;
use crate::error::{AdapterError, Result};
use crate::params::{self, Args, Param};
use crate::request::RequestDescriptor;
use crate::shape::{self, FanInShaper, Shaper, Slot};
use crate::traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};
use crate::transport::HttpTransport;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Builds one request from the provider context and caller arguments.
pub type BuildFn<C> = fn(&C, &Args) -> Result<RequestDescriptor>;

/// Builds several independent keyed requests.
pub type FanOutFn<C> = fn(&C, &Args) -> Result<Vec<(String, RequestDescriptor)>>;

/// Answers without any network call.
pub type LocalFn = fn(&Args) -> Result<Value>;

/// How an operation produces its result.
pub enum Handler<C> {
    /// One round trip, shaped by the operation's shaper.
    Request(BuildFn<C>),
    /// Several concurrent round trips, each captured independently.
    FanOut(FanOutFn<C>, FanInShaper),
    /// Local computation.
    Local(LocalFn),
}

/// One named, independently invocable tool.
pub struct Operation<C> {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<Param>,
    pub handler: Handler<C>,
    pub shape: Shaper,
}

impl<C> Operation<C> {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            handler: Handler::Local(no_handler),
            shape: shape::json,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn request(mut self, build: BuildFn<C>) -> Self {
        self.handler = Handler::Request(build);
        self
    }

    /// Replace the default JSON passthrough shaper.
    pub fn shape(mut self, shape: Shaper) -> Self {
        self.shape = shape;
        self
    }

    pub fn fan_out(mut self, build: FanOutFn<C>, shape: FanInShaper) -> Self {
        self.handler = Handler::FanOut(build, shape);
        self
    }

    pub fn local(mut self, run: LocalFn) -> Self {
        self.handler = Handler::Local(run);
        self
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: params::schema(&self.params),
        }
    }
}

fn no_handler(args: &Args) -> Result<Value> {
    Err(AdapterError::Internal(format!(
        "tool `{}` has no handler",
        args.tool()
    )))
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A third-party API exposed as a set of operations.
pub trait Provider: Send + Sync + Sized + 'static {
    /// Adapter id and tool-name prefix.
    const ID: &'static str;
    const ADAPTER_TYPE: AdapterType;
    /// Environment variables that must be set.
    const ENV_VARS: &'static [&'static str];
    /// Environment variables read when present.
    const OPTIONAL_ENV_VARS: &'static [&'static str] = &[];

    /// Resolve credentials and settings.  Fails with a configuration error
    /// when a mandatory variable is missing.
    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self>;

    fn operations() -> Vec<Operation<Self>>;
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// The [`Adapter`] implementation shared by every provider.
pub struct ServiceAdapter<P: Provider> {
    provider: P,
    operations: Vec<Operation<P>>,
    transport: HttpTransport,
}

impl<P: Provider> std::fmt::Debug for ServiceAdapter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAdapter")
            .field("id", &P::ID)
            .field("tools", &self.operations.len())
            .finish()
    }
}

impl<P: Provider> ServiceAdapter<P> {
    pub fn new(provider: P, transport: HttpTransport) -> Self {
        Self {
            provider,
            operations: P::operations(),
            transport,
        }
    }

    pub fn from_env(
        env: &dyn Env,
        settings: &ProviderSettings,
        transport: HttpTransport,
    ) -> Result<Self> {
        Ok(Self::new(P::from_env(env, settings)?, transport))
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn operation(&self, name: &str) -> Result<&Operation<P>> {
        self.operations
            .iter()
            .find(|op| op.name == name)
            .ok_or_else(|| AdapterError::ToolNotFound {
                adapter_id: P::ID.to_string(),
                tool_name: name.to_string(),
            })
    }

    /// Build the request(s) a tool would send, without sending anything.
    ///
    /// Local tools prepare no requests.
    pub fn prepare(&self, name: &str, params: Value) -> Result<Vec<RequestDescriptor>> {
        let op = self.operation(name)?;
        let args = Args::parse(name, params, &op.params)?;
        match &op.handler {
            Handler::Request(build) => Ok(vec![build(&self.provider, &args)?]),
            Handler::FanOut(build, _) => Ok(build(&self.provider, &args)?
                .into_iter()
                .map(|(_, desc)| desc)
                .collect()),
            Handler::Local(_) => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl<P: Provider> Adapter for ServiceAdapter<P> {
    fn id(&self) -> &str {
        P::ID
    }

    fn adapter_type(&self) -> AdapterType {
        P::ADAPTER_TYPE
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.operations.iter().map(Operation::definition).collect()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        let op = self.operation(name)?;
        let args = Args::parse(name, params, &op.params)?;
        debug!(adapter = P::ID, tool = name, "executing tool");

        match &op.handler {
            Handler::Request(build) => {
                let desc = build(&self.provider, &args)?;
                let response = self.transport.send(name, desc).await?;
                (op.shape)(&args, response)
            }
            Handler::FanOut(build, shape) => {
                let calls = build(&self.provider, &args)?;
                debug!(tool = name, calls = calls.len(), "fanning out");
                let slots = join_all(calls.into_iter().map(|(key, desc)| async move {
                    let outcome = self.transport.send(name, desc).await;
                    Slot { key, outcome }
                }))
                .await;
                shape(&args, slots)
            }
            Handler::Local(run) => run(&args),
        }
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            provider: P::ID.to_string(),
            env_vars: P::ENV_VARS.iter().map(|v| v.to_string()).collect(),
            optional_env_vars: P::OPTIONAL_ENV_VARS.iter().map(|v| v.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, MapEnv, require};
    use crate::payload::ParamSet;
    use crate::transport::ResponseEnvelope;
    use serde_json::json;

    struct Echo {
        key: Credential,
    }

    type Op = Operation<Echo>;

    impl Provider for Echo {
        const ID: &'static str = "echo";
        const ADAPTER_TYPE: AdapterType = AdapterType::Data;
        const ENV_VARS: &'static [&'static str] = &["ECHO_KEY"];

        fn from_env(env: &dyn Env, _settings: &ProviderSettings) -> Result<Self> {
            Ok(Self {
                key: require(env, Self::ID, "ECHO_KEY")?,
            })
        }

        fn operations() -> Vec<Operation<Self>> {
            vec![
                Op::new("echo_get", "Fetch a thing")
                    .param(Param::string("id").required())
                    .param(Param::integer("limit"))
                    .request(|cx, a| {
                        Ok(RequestDescriptor::get(format!(
                            "http://127.0.0.1:1/things/{}",
                            a.require_str("id")?
                        ))
                        .bearer(&cx.key)
                        .query(ParamSet::new().forward(a, "limit")))
                    })
                    .shape(|_, r: ResponseEnvelope| Ok(shape::pluck(&r.json()?, "/data"))),
                Op::new("echo_local", "Answer locally")
                    .local(|a| Ok(json!({ "tool": a.tool() }))),
            ]
        }
    }

    fn adapter() -> ServiceAdapter<Echo> {
        let env = MapEnv::new().with("ECHO_KEY", "k");
        ServiceAdapter::from_env(&env, &ProviderSettings::default(), HttpTransport::new()).unwrap()
    }

    // -- Construction --

    #[test]
    fn missing_credential_fails_construction() {
        let result = ServiceAdapter::<Echo>::from_env(
            &MapEnv::new(),
            &ProviderSettings::default(),
            HttpTransport::new(),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ECHO_KEY"));
    }

    #[test]
    fn tools_render_schemas() {
        let tools = adapter().tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "echo_get");
        assert_eq!(tools[0].parameters["required"], json!(["id"]));
    }

    #[test]
    fn required_auth_lists_env_vars() {
        let auth = adapter().required_auth().unwrap();
        assert_eq!(auth.provider, "echo");
        assert_eq!(auth.env_vars, vec!["ECHO_KEY".to_string()]);
    }

    // -- Prepare --

    #[test]
    fn prepare_omits_unsupplied_params() {
        let descs = adapter().prepare("echo_get", json!({"id": "a/b"})).unwrap();
        assert_eq!(descs.len(), 1);
        assert!(descs[0].query.is_empty());
        let descs = adapter()
            .prepare("echo_get", json!({"id": "a", "limit": 0}))
            .unwrap();
        assert_eq!(descs[0].query_value("limit"), Some("0"));
    }

    // -- Execute --

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let err = adapter().execute_tool("echo_nope", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("echo_nope"));
    }

    #[tokio::test]
    async fn validation_happens_before_network() {
        let err = adapter().execute_tool("echo_get", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn local_tools_do_not_touch_network() {
        let out = adapter().execute_tool("echo_local", json!({})).await.unwrap();
        assert_eq!(out["tool"], "echo_local");
    }
}
