//! Typed tool adapters for third-party HTTP APIs.
//!
//! Each provider in [`providers`] is a credential-carrying context plus a
//! table of named operations.  [`ServiceAdapter`] turns any provider into an
//! [`Adapter`]: it validates caller parameters, builds a
//! [`RequestDescriptor`], performs one round trip through [`HttpTransport`]
//! and shapes the response.  [`Registry`] builds every provider the
//! environment has credentials for and dispatches calls by tool name.

pub mod config;
pub mod credentials;
pub mod error;
pub mod graphql;
pub mod operation;
pub mod params;
pub mod payload;
pub mod providers;
pub mod registry;
pub mod request;
pub mod shape;
pub mod traits;
pub mod transport;

pub use config::{ProviderSettings, ToolhubConfig};
pub use credentials::{Credential, Env, MapEnv, ProcessEnv};
pub use error::{AdapterError, ErrorKind, Result};
pub use operation::{Operation, Provider, ServiceAdapter};
pub use registry::{ProviderState, ProviderStatus, Registry};
pub use request::{RequestDescriptor, TimeoutClass};
pub use traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};
pub use transport::{HttpTransport, ResponseEnvelope};
