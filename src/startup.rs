use crate::{
    AppState,
    ai::GeminiClient,
    aws_clients::{create_dynamodb_client, create_sdk_config},
    config::{Config, StorageBackend},
    domain::{BidRepository, DuelRepository, MemeRepository, TextGenerator},
    errors::AppError,
    memory::{InMemoryBidRepository, InMemoryDuelRepository, InMemoryMemeRepository},
    repositories::{
        BIDS_TABLE, DUELS_TABLE, DynamoDbBidRepository, DynamoDbDuelRepository, DynamoDbMemeRepository, MEMES_TABLE,
    },
};
use aws_sdk_dynamodb::{
    Client as DynamoDbClient,
    error::SdkError as DynamoSdkError,
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
};
use backoff::{ExponentialBackoff, future::retry};
use std::{sync::Arc, time::Duration};

const TABLE_SETUP_MAX_ELAPSED: Duration = Duration::from_secs(30);

/// Creates a table keyed on `id` unless it already exists.
///
/// Connection failures are retried since a local DynamoDB may still be starting.
async fn create_table_if_not_exists(client: &DynamoDbClient, table_name: &str) -> Result<(), backoff::Error<AppError>> {
    let attribute = AttributeDefinition::builder()
        .attribute_name("id")
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| backoff::Error::permanent(AppError::InitError(format!("Failed to build attribute definition: {}", e))))?;
    let key = KeySchemaElement::builder()
        .attribute_name("id")
        .key_type(KeyType::Hash)
        .build()
        .map_err(|e| backoff::Error::permanent(AppError::InitError(format!("Failed to build key schema: {}", e))))?;

    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(attribute)
        .key_schema(key)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    match result {
        Ok(_) => {
            tracing::info!("Startup: Table '{}' created successfully or setup initiated.", table_name);
            Ok(())
        }
        Err(DynamoSdkError::ServiceError(service_err)) if service_err.err().is_resource_in_use_exception() => {
            tracing::info!("Startup: Table '{}' already exists, no action needed.", table_name);
            Ok(())
        }
        Err(e @ DynamoSdkError::ServiceError(_)) => {
            let context = format!("Startup: Service error creating DynamoDB table '{}'", table_name);
            tracing::error!("{}: {:?}", context, e);
            Err(backoff::Error::permanent(AppError::InitError(format!("{}: {}", context, e))))
        }
        Err(e) => {
            tracing::warn!("Startup: Could not reach DynamoDB for table '{}', retrying: {}", table_name, e);
            Err(backoff::Error::transient(AppError::InitError(format!(
                "Startup: SDK error creating DynamoDB table '{}': {}",
                table_name, e
            ))))
        }
    }
}

pub async fn ensure_tables(client: &DynamoDbClient, config: &Config) -> Result<(), AppError> {
    tracing::info!("Startup: Ensuring DynamoDB tables exist...");
    for base in [MEMES_TABLE, BIDS_TABLE, DUELS_TABLE] {
        let table_name = config.table_name(base);
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(TABLE_SETUP_MAX_ELAPSED),
            ..ExponentialBackoff::default()
        };
        retry(policy, || create_table_if_not_exists(client, &table_name)).await?;
    }
    tracing::info!("Startup: DynamoDB table initialization complete.");
    Ok(())
}

/// Wires repositories, the AI provider and the shared services from `config`.
pub async fn build_state(config: Config) -> Result<AppState, AppError> {
    let (memes, bids, duels): (Arc<dyn MemeRepository>, Arc<dyn BidRepository>, Arc<dyn DuelRepository>) =
        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                (
                    Arc::new(InMemoryMemeRepository::default()),
                    Arc::new(InMemoryBidRepository::default()),
                    Arc::new(InMemoryDuelRepository::default()),
                )
            }
            StorageBackend::DynamoDb => {
                let sdk_config = create_sdk_config(&config).await;
                let client = create_dynamodb_client(&sdk_config);
                ensure_tables(&client, &config).await?;
                (
                    Arc::new(DynamoDbMemeRepository::new(client.clone(), config.table_name(MEMES_TABLE))),
                    Arc::new(DynamoDbBidRepository::new(client.clone(), config.table_name(BIDS_TABLE))),
                    Arc::new(DynamoDbDuelRepository::new(client, config.table_name(DUELS_TABLE))),
                )
            }
        };

    let generator: Option<Arc<dyn TextGenerator>> = match &config.gemini_api_key {
        Some(api_key) => {
            let client = GeminiClient::new(&config.gemini_base_url, &config.gemini_model, api_key)
                .map_err(|e| AppError::InitError(format!("Failed to build Gemini client: {}", e)))?;
            tracing::info!(model = %config.gemini_model, "AI captions enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, captions and vibes use fallbacks");
            None
        }
    };

    Ok(AppState::new(config, memes, bids, duels, generator))
}
