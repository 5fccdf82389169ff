use std::{fmt::Debug, sync::Arc};

use request_builder::RequestBuilder;
use url::Url;

use crate::{
    bridge::BridgeClient,
    config::{BridgeUrl, DEFAULT_CONNECT_BASE_URL},
    core::{
        object::{TypedParameter, UntypedObject},
        request::parameters::{AppId, Environment},
        util::AsyncHttpClient,
    },
    error::{IdKitError, Result},
};

pub mod request_builder;
pub mod session;

/// Entry point for relying parties: creates verification requests for one registered app.
#[derive(Debug, Clone)]
pub struct IdKit {
    app_id: AppId,
    bridge: BridgeClient,
    connect_base_url: Url,
    default_request_params: UntypedObject,
    environment: Environment,
    partner: bool,
}

impl IdKit {
    /// Build a new client.
    pub fn builder() -> IdKitBuilder {
        IdKitBuilder::default()
    }

    /// Begin building a new verification request.
    pub fn build_request(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id.0
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }
}

/// Builder struct for [IdKit].
#[derive(Clone, Default)]
pub struct IdKitBuilder {
    app_id: Option<String>,
    bridge_url: BridgeUrl,
    connect_base_url: Option<Url>,
    default_request_params: UntypedObject,
    environment: Environment,
    http_client: Option<Arc<dyn AsyncHttpClient + Send + Sync>>,
    partner: bool,
}

impl IdKitBuilder {
    /// Build the client.
    ///
    /// # Errors
    /// [IdKitError::InvalidConfiguration] if the app id or the HTTP client is missing, or the app
    /// id is not of the form `app_...`.
    pub fn build(self) -> Result<IdKit> {
        let Self {
            app_id,
            bridge_url,
            connect_base_url,
            default_request_params,
            environment,
            http_client,
            partner,
        } = self;

        let Some(app_id) = app_id else {
            return Err(IdKitError::InvalidConfiguration(
                "app id is required, see `with_app_id`".into(),
            ));
        };
        if !app_id.starts_with("app_") {
            return Err(IdKitError::InvalidConfiguration(format!(
                "app id must start with 'app_', found '{app_id}'"
            )));
        }

        let Some(http_client) = http_client else {
            return Err(IdKitError::InvalidConfiguration(
                "http client is required, see `with_http_client`".into(),
            ));
        };

        let connect_base_url = match connect_base_url {
            Some(url) => url,
            None => DEFAULT_CONNECT_BASE_URL
                .parse()
                .map_err(|e| IdKitError::InvalidConfiguration(format!("connect url: {e}")))?,
        };

        Ok(IdKit {
            app_id: AppId(app_id),
            bridge: BridgeClient::new(http_client, bridge_url),
            connect_base_url,
            default_request_params,
            environment,
            partner,
        })
    }

    /// Set the application id registered with the developer portal.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the HTTP client used to talk to the bridge.
    pub fn with_http_client(mut self, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Relay through a bridge other than the default one. The wallet learns about it from the
    /// connect URI.
    pub fn with_bridge_url(mut self, bridge_url: BridgeUrl) -> Self {
        self.bridge_url = bridge_url;
        self
    }

    /// Base of the deep link the wallet opens.
    pub fn with_connect_base_url(mut self, url: Url) -> Self {
        self.connect_base_url = Some(url);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Mark requests as coming from a partner integration (`partner=true` in the connect URI).
    pub fn partner(mut self, partner: bool) -> Self {
        self.partner = partner;
        self
    }

    /// Set default parameters that every request payload will contain.
    ///
    /// Parameters the request builder sets itself take precedence.
    pub fn with_default_request_parameter<T: TypedParameter>(mut self, t: T) -> Result<Self> {
        self.default_request_params
            .insert(t)
            .map_err(|e| IdKitError::InvalidConfiguration(format!("{e:#}")))?;
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use anyhow::bail;
    use async_trait::async_trait;
    use http::{Request, Response};

    use super::*;

    struct Unreachable;

    #[async_trait]
    impl AsyncHttpClient for Unreachable {
        async fn execute(&self, _: Request<Vec<u8>>) -> anyhow::Result<Response<Vec<u8>>> {
            bail!("no network in unit tests")
        }
    }

    #[test]
    fn build_requires_app_id_and_client() {
        let missing_app = IdKit::builder()
            .with_http_client(Arc::new(Unreachable))
            .build();
        assert!(matches!(
            missing_app,
            Err(IdKitError::InvalidConfiguration(_))
        ));

        let missing_client = IdKit::builder().with_app_id("app_staging_1").build();
        assert!(matches!(
            missing_client,
            Err(IdKitError::InvalidConfiguration(_))
        ));

        let bad_app = IdKit::builder()
            .with_app_id("staging_1")
            .with_http_client(Arc::new(Unreachable))
            .build();
        assert!(matches!(bad_app, Err(IdKitError::InvalidConfiguration(_))));
    }

    #[test]
    fn build_with_defaults() {
        let idkit = IdKit::builder()
            .with_app_id("app_staging_1")
            .with_http_client(Arc::new(Unreachable))
            .build()
            .unwrap();
        assert_eq!(idkit.app_id(), "app_staging_1");
        assert_eq!(idkit.environment(), Environment::Production);
        assert!(idkit.bridge().base_url().is_default());
        assert_eq!(idkit.connect_base_url.as_str(), DEFAULT_CONNECT_BASE_URL);
    }
}
