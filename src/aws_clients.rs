use crate::config::Config;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;

// Builds the shared SDK configuration from `Config`.
// With a local endpoint and no access key in the environment, static test
// credentials stand in for the default provider chain.
pub async fn create_sdk_config(config: &Config) -> SdkConfig {
    tracing::info!(sdk_region = %config.aws_region, "Setting SDK region");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.aws_region.clone()));

    if let Some(endpoint_url) = &config.localstack_endpoint {
        tracing::info!("Using local endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);

        if std::env::var_os("AWS_ACCESS_KEY_ID").is_none() {
            tracing::debug!("No AWS_ACCESS_KEY_ID set, using static local credentials");
            config_loader = config_loader.credentials_provider(Credentials::new("test", "test", None, None, "localstack"));
        }
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

pub fn create_dynamodb_client(sdk_config: &SdkConfig) -> DynamoDbClient {
    DynamoDbClient::new(sdk_config)
}
