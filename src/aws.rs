use std::sync::Once;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::environment::{
    credentials::EnvironmentVariableCredentialsProvider, region::EnvironmentVariableRegionProvider,
};
use aws_config::meta::region::ProvideRegion;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::config::{ProvideCredentials, Region};
use aws_smithy_types::timeout::TimeoutConfig;
use color_eyre::eyre::{Context, Result, eyre};

use crate::dynamodb::DynamoDbClient;

#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Everything needed to reach the store. Nothing here is read implicitly
/// from the environment; use [`StoreConfig::from_env`] to opt into that.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub region: String,
    /// `None` falls back to the SDK's default credential chain.
    pub credentials: Option<StaticCredentials>,
    /// Endpoint override, e.g. DynamoDB Local.
    pub endpoint_url: Option<String>,
    pub operation_timeout: Option<Duration>,
    /// Artificial pause before every request.
    pub debug_delay: Option<Duration>,
}

impl StoreConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            credentials: None,
            endpoint_url: None,
            operation_timeout: None,
            debug_delay: None,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.credentials = Some(StaticCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        });
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn with_debug_delay(mut self, delay: Duration) -> Self {
        self.debug_delay = Some(delay);
        self
    }

    /// Read region and credentials once from `AWS_REGION`/`AWS_DEFAULT_REGION`
    /// and `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`/`AWS_SESSION_TOKEN`.
    pub async fn from_env() -> Result<Self> {
        let region_provider = EnvironmentVariableRegionProvider::new();
        let region = region_provider
            .region()
            .await
            .ok_or_else(|| eyre!("AWS region not set. Use AWS_REGION or AWS_DEFAULT_REGION."))?;

        let credentials = EnvironmentVariableCredentialsProvider::new()
            .provide_credentials()
            .await
            .map_err(|err| eyre!("AWS credentials not found in environment: {err}"))?;

        Ok(Self {
            credentials: Some(StaticCredentials {
                access_key_id: credentials.access_key_id().to_string(),
                secret_access_key: credentials.secret_access_key().to_string(),
                session_token: credentials.session_token().map(str::to_string),
            }),
            ..Self::new(region.to_string())
        })
    }
}

fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Another component may have installed one already, which is fine.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

pub async fn new_client(config: &StoreConfig) -> Result<aws_sdk_dynamodb::Client> {
    install_crypto_provider();

    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some(credentials) = &config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "dynaquery",
        ));
    }

    if let Some(url) = &config.endpoint_url {
        loader = loader.endpoint_url(url);
    }

    if let Some(timeout) = config.operation_timeout {
        loader = loader.timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(timeout)
                .build(),
        );
    }

    let sdk_config = loader.load().await;
    tracing::debug!(
        region = %config.region,
        endpoint_url = ?config.endpoint_url,
        static_credentials = config.credentials.is_some(),
        "Created DynamoDB client"
    );
    Ok(aws_sdk_dynamodb::Client::new(&sdk_config))
}

/// Build the SDK-backed storage client for a config.
pub async fn connect(config: &StoreConfig) -> Result<DynamoDbClient> {
    let client = new_client(config).await?;
    Ok(DynamoDbClient::new(client).with_debug_delay(config.debug_delay))
}

pub async fn validate_connection(client: &aws_sdk_dynamodb::Client) -> Result<()> {
    client
        .list_tables()
        .limit(1)
        .send()
        .await
        .map(|_| ())
        .wrap_err("Failed to connect to DynamoDB")
}
