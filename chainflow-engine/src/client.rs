//! Client for the orchestration service.
//!
//! A [`Client`] carries the app identity and the URLs needed to talk to the
//! orchestrator, owns the declared functions, and performs the registration
//! call that announces them. [`Client::serve`] turns it into the HTTP handler
//! the orchestrator calls back into.

use std::time::Duration;

use serde::Serialize;

use crate::error::{DurableError, DurableResult};
use crate::function::{FunctionConfig, ServableFunction};
use crate::serve::{ServeHandler, FRAMEWORK};

/// Register URL used in development mode when none is configured.
pub const DEV_REGISTER_URL: &str = "http://localhost:8288";
/// Register URL used outside development mode when none is configured.
pub const CLOUD_REGISTER_URL: &str = "https://api.inngest.com";
/// Path the serve handler appends to the register URL when syncing.
pub const REGISTER_PATH: &str = "/fn/register";
/// SDK identifier announced on registration.
pub const SDK_NAME: &str = concat!("rust:v", env!("CARGO_PKG_VERSION"));

/// Options for [`Client::new`]. Unset fields take the documented defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOpts {
    /// Application id, required
    pub app_id: String,
    /// Base URL registration requests go to
    pub register_url: Option<String>,
    /// Signing key sent as a bearer token when registering
    pub signing_key: Option<String>,
    /// Development mode flag, defaults to false
    pub dev: Option<bool>,
    /// URL the orchestrator invokes functions at
    pub url: Option<String>,
}

impl ClientOpts {
    /// Creates options for `app_id` with every other field unset.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }
}

/// Registration payload sent to `{register_url}/fn/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    /// URL the orchestrator should call
    pub url: String,
    /// Protocol version
    pub v: &'static str,
    /// How the registration was initiated
    pub deploy_type: &'static str,
    /// SDK identifier
    pub sdk: &'static str,
    /// HTTP framework identifier
    pub framework: &'static str,
    /// Application id
    pub app_name: String,
    /// Declared functions
    pub functions: Vec<FunctionConfig>,
}

/// Client for the orchestration service.
#[derive(Debug)]
pub struct Client {
    app_id: String,
    register_url: reqwest::Url,
    signing_key: Option<String>,
    dev: bool,
    url: reqwest::Url,
    functions: Vec<ServableFunction>,
    http_client: reqwest::Client,
}

impl Client {
    /// Creates a client from `opts`.
    ///
    /// Fails with [`DurableError::Validation`] when the app id is empty or a
    /// URL does not parse.
    pub fn new(opts: ClientOpts) -> DurableResult<Self> {
        if opts.app_id.trim().is_empty() {
            return Err(DurableError::validation("app id must not be empty"));
        }

        let dev = opts.dev.unwrap_or(false);
        let register_url = match opts.register_url {
            Some(url) => url,
            None if dev => DEV_REGISTER_URL.to_string(),
            None => CLOUD_REGISTER_URL.to_string(),
        };
        let register_url = parse_url("register URL", &register_url)?;
        let url = parse_url(
            "function URL",
            opts.url.as_deref().unwrap_or(crate::config::DEFAULT_FUNCTION_URL),
        )?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DurableError::validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            app_id: opts.app_id,
            register_url,
            signing_key: opts.signing_key.filter(|k| !k.is_empty()),
            dev,
            url,
            functions: Vec::new(),
            http_client,
        })
    }

    /// The application id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns true in development mode.
    pub fn is_dev(&self) -> bool {
        self.dev
    }

    /// The URL the orchestrator invokes functions at.
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// The base register URL.
    pub fn register_url(&self) -> &reqwest::Url {
        &self.register_url
    }

    /// The full URL registration requests are POSTed to.
    pub fn register_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.register_url.as_str().trim_end_matches('/'),
            REGISTER_PATH
        )
    }

    /// Returns true if a signing key is configured.
    pub fn has_signing_key(&self) -> bool {
        self.signing_key.is_some()
    }

    /// The declared functions, in declaration order.
    pub fn functions(&self) -> &[ServableFunction] {
        &self.functions
    }

    /// Finds a function by id or by app-qualified id.
    pub fn function(&self, id: &str) -> Option<&ServableFunction> {
        self.functions
            .iter()
            .find(|f| f.id() == id || f.slug(&self.app_id) == id)
    }

    pub(crate) fn add_function(&mut self, function: ServableFunction) -> DurableResult<()> {
        if self.functions.iter().any(|f| f.id() == function.id()) {
            return Err(DurableError::validation(format!(
                "function '{}' is already declared",
                function.id()
            )));
        }
        self.functions.push(function);
        Ok(())
    }

    /// Builds the registration payload for the declared functions.
    pub fn registration_request(&self) -> RegistrationRequest {
        RegistrationRequest {
            url: self.url.to_string(),
            v: "1",
            deploy_type: "ping",
            sdk: SDK_NAME,
            framework: FRAMEWORK,
            app_name: self.app_id.clone(),
            functions: self
                .functions
                .iter()
                .map(|f| f.config(&self.app_id, &self.url))
                .collect(),
        }
    }

    /// Announces the declared functions to the orchestrator.
    pub async fn register(&self) -> DurableResult<()> {
        let endpoint = self.register_endpoint();
        tracing::debug!(endpoint = %endpoint, functions = self.functions.len(), "Registering functions");

        let mut request = self
            .http_client
            .post(&endpoint)
            .json(&self.registration_request());
        if let Some(ref key) = self.signing_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            DurableError::registration(format!("request to {} failed: {}", endpoint, e), None)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DurableError::registration(
                format!("orchestrator responded with {}: {}", status, body),
                Some(status.as_u16()),
            ));
        }

        tracing::info!(endpoint = %endpoint, "Functions registered");
        Ok(())
    }

    /// Turns the client into the HTTP handler that serves its functions.
    pub fn serve(self) -> ServeHandler {
        ServeHandler::new(self)
    }
}

fn parse_url(what: &str, raw: &str) -> DurableResult<reqwest::Url> {
    reqwest::Url::parse(raw)
        .map_err(|e| DurableError::validation(format!("invalid {} '{}': {}", what, raw, e)))
}
