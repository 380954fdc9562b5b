//! DynamoDB `UpdateItem` through `aws-sdk-dynamodb`.
//!
//! Only per-item conditional updates are issued; `BatchWriteItem` is never
//! used since it cannot carry a condition. SDK retries are disabled: the
//! writer's scheduler owns retry and backoff.

pub mod attr;

use std::collections::HashMap;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::Deserialize;

use fieldguard_api::{ConditionalStore, StoreError, StoreErrorKind, StoreFuture, UpdatePlan};

use crate::attr::to_attr;

// ═══════════════════════════════════════════════════════════════
//  DynamoStoreConfig
// ═══════════════════════════════════════════════════════════════

fn default_connect_timeout_ms() -> u64 {
    1000
}

/// Connection settings. Region and credentials come from the SDK default
/// chain (environment, profile, SSO, container and instance roles); the
/// fields here only override it.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoStoreConfig {
    #[serde(default)]
    pub region: Option<String>,
    /// Override of the regional endpoint (DynamoDB Local, LocalStack).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for DynamoStoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            profile: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  DynamoStore
// ═══════════════════════════════════════════════════════════════

pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Resolve the SDK configuration and build the client.
    ///
    /// Credentials are resolved lazily on the first call; only a missing
    /// region or a malformed override fails here.
    pub async fn new(config: &DynamoStoreConfig) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            if region.trim().is_empty() {
                return Err(StoreError::config("region must not be empty"));
            }
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk = loader.load().await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(StoreError::config(format!("endpoint '{endpoint}' must be an http(s) URL")));
            }
            builder = builder.endpoint_url(endpoint);
        }
        let conf = builder.build();

        let Some(region) = conf.region().cloned() else {
            return Err(StoreError::config(
                "no region (set store.dynamodb.region, AWS_REGION or a profile region)",
            ));
        };

        tracing::info!(
            region = %region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            profile = config.profile.as_deref().unwrap_or("default"),
            "dynamodb store ready"
        );

        Ok(Self {
            client: Client::from_conf(conf),
        })
    }
}

/// Attribute maps and expressions of one `UpdateItem` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub key: HashMap<String, AttributeValue>,
    pub update: String,
    pub condition: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

pub fn update_request(plan: &UpdatePlan) -> Result<UpdateRequest, StoreError> {
    let e = plan.expressions();

    let key = HashMap::from([(plan.key_field().to_string(), to_attr(plan.key())?)]);
    let mut values = HashMap::with_capacity(e.values.len());
    for (placeholder, v) in &e.values {
        values.insert(placeholder.clone(), to_attr(v)?);
    }

    Ok(UpdateRequest {
        key,
        update: e.update,
        condition: e.condition,
        names: e.names.into_iter().collect(),
        values,
    })
}

impl ConditionalStore for DynamoStore {
    fn name(&self) -> &str {
        "dynamodb"
    }

    fn update_if<'a>(&'a self, table: &'a str, plan: &'a UpdatePlan) -> StoreFuture<'a> {
        Box::pin(async move {
            let req = update_request(plan)?;
            self.client
                .update_item()
                .table_name(table)
                .set_key(Some(req.key))
                .update_expression(req.update)
                .condition_expression(req.condition)
                .set_expression_attribute_names(Some(req.names))
                .set_expression_attribute_values(Some(req.values))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| classify(e).with_context(format!("UpdateItem {table}")))
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Error mapping
// ═══════════════════════════════════════════════════════════════

fn classify(err: SdkError<UpdateItemError>) -> StoreError {
    match &err {
        SdkError::ServiceError(ctx) => {
            let e = ctx.err();
            let status = ctx.raw().status().as_u16();
            StoreError::new(service_kind(e, status), describe(e, status))
        }
        SdkError::TimeoutError(_) => StoreError::timeout(DisplayErrorContext(&err).to_string()),
        SdkError::DispatchFailure(d) if d.is_timeout() => StoreError::timeout(DisplayErrorContext(&err).to_string()),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::network(DisplayErrorContext(&err).to_string())
        }
        SdkError::ConstructionFailure(_) => StoreError::config(DisplayErrorContext(&err).to_string()),
        _ => StoreError::new(StoreErrorKind::Other, DisplayErrorContext(&err).to_string()),
    }
}

fn service_kind(e: &UpdateItemError, status: u16) -> StoreErrorKind {
    match e {
        UpdateItemError::ConditionalCheckFailedException(_) => StoreErrorKind::ConditionFailed,
        UpdateItemError::ProvisionedThroughputExceededException(_) | UpdateItemError::RequestLimitExceeded(_) => {
            StoreErrorKind::Throttled
        }
        UpdateItemError::InternalServerError(_) => StoreErrorKind::Network,
        UpdateItemError::ResourceNotFoundException(_) => StoreErrorKind::Config,
        _ => kind_for_code(e.code(), status),
    }
}

/// Kind for error codes the operation does not model (`ThrottlingException`,
/// `ValidationException`, auth failures).
fn kind_for_code(code: Option<&str>, status: u16) -> StoreErrorKind {
    match code.unwrap_or_default() {
        "ConditionalCheckFailedException" => StoreErrorKind::ConditionFailed,
        "ProvisionedThroughputExceededException" | "ThrottlingException" | "RequestLimitExceeded" => {
            StoreErrorKind::Throttled
        }
        "InternalServerError" | "ServiceUnavailable" => StoreErrorKind::Network,
        "ValidationException" | "SerializationException" => StoreErrorKind::Validation,
        "ResourceNotFoundException" => StoreErrorKind::Config,
        "AccessDeniedException"
        | "UnrecognizedClientException"
        | "MissingAuthenticationTokenException"
        | "InvalidSignatureException"
        | "ExpiredTokenException" => StoreErrorKind::Permission,
        _ if status >= 500 => StoreErrorKind::Network,
        _ => StoreErrorKind::Other,
    }
}

fn describe(e: &UpdateItemError, status: u16) -> String {
    match (e.code(), e.message()) {
        (Some(code), Some(msg)) => format!("{code}: {msg}"),
        (Some(code), None) => code.to_string(),
        (None, Some(msg)) => msg.to_string(),
        (None, None) => format!("HTTP {status}"),
    }
}
