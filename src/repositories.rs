use crate::{
    domain::{BidRepository, DuelRepository, MemeRepository},
    errors::RepoError,
    models::{Bid, Duel, DuelSide, Meme, UserId, VoteType},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client as DynamoDbClient,
    error::SdkError,
    operation::update_item::{UpdateItemError, UpdateItemOutput},
    types::{AttributeValue, ReturnValue},
};
use chrono::{DateTime, Utc};
use std::{collections::HashMap, str::FromStr};
use tracing::{self, info};
use uuid::Uuid;

type Item = HashMap<String, AttributeValue>;

pub const MEMES_TABLE: &str = "memes";
pub const BIDS_TABLE: &str = "bids";
pub const DUELS_TABLE: &str = "memeduels";

// --- Memes ---

#[derive(Debug, Clone)]
pub struct DynamoDbMemeRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbMemeRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbMemeRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl MemeRepository for DynamoDbMemeRepository {
    async fn create(&self, meme: &Meme) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(meme_to_item(meme)))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to put meme (id: {})", self.table_name, meme.id))?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError> {
        let item = get_item(&self.client, &self.table_name, id).await?;
        item.map(|item| {
            item_to_meme(&item).ok_or_else(|| {
                tracing::error!(meme_id = %id, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into Meme");
                RepoError::DataCorruption(format!("meme {} in table '{}'", id, self.table_name))
            })
        })
        .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Meme>, RepoError> {
        let items = scan_items(&self.client, &self.table_name, None).await?;
        let memes = parse_all(items, &self.table_name, item_to_meme)?;
        tracing::info!("DynamoDB (table: {}): Successfully listed {} memes", self.table_name, memes.len());
        Ok(memes)
    }

    async fn apply_vote(&self, id: Uuid, vote: VoteType) -> Result<Meme, RepoError> {
        let counter = match vote {
            VoteType::Up => "upvotes",
            VoteType::Down => "downvotes",
        };
        let output = increment_counter(&self.client, &self.table_name, id, counter)
            .await
            .map_err(|e| not_found_or_backend(e, "Meme", id, &self.table_name))?;
        updated_record(output, id, &self.table_name, item_to_meme)
    }

    async fn update_caption(&self, id: Uuid, caption: &str) -> Result<Meme, RepoError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET ai_caption = :caption")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":caption", AttributeValue::S(caption.to_string()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| not_found_or_backend(e, "Meme", id, &self.table_name))?;
        updated_record(output, id, &self.table_name, item_to_meme)
    }
}

// --- Bids ---

#[derive(Debug, Clone)]
pub struct DynamoDbBidRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbBidRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbBidRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl BidRepository for DynamoDbBidRepository {
    async fn create(&self, bid: &Bid) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(bid_to_item(bid)))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to put bid (id: {})", self.table_name, bid.id))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Bid>, RepoError> {
        let items = scan_items(&self.client, &self.table_name, None).await?;
        parse_all(items, &self.table_name, item_to_bid)
    }

    async fn list_for_meme(&self, meme_id: Uuid) -> Result<Vec<Bid>, RepoError> {
        let filter = ("meme_id = :meme_id", ":meme_id", AttributeValue::S(meme_id.to_string()));
        let items = scan_items(&self.client, &self.table_name, Some(filter)).await?;
        parse_all(items, &self.table_name, item_to_bid)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Bid>, RepoError> {
        let filter = ("user_id = :user_id", ":user_id", AttributeValue::N(user_id.to_string()));
        let items = scan_items(&self.client, &self.table_name, Some(filter)).await?;
        parse_all(items, &self.table_name, item_to_bid)
    }
}

// --- Duels ---

#[derive(Debug, Clone)]
pub struct DynamoDbDuelRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbDuelRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbDuelRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl DuelRepository for DynamoDbDuelRepository {
    async fn create(&self, duel: &Duel) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(duel_to_item(duel)))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to put duel (id: {})", self.table_name, duel.id))?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Duel>, RepoError> {
        let item = get_item(&self.client, &self.table_name, id).await?;
        item.map(|item| {
            item_to_duel(&item)
                .ok_or_else(|| RepoError::DataCorruption(format!("duel {} in table '{}'", id, self.table_name)))
        })
        .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Duel>, RepoError> {
        let items = scan_items(&self.client, &self.table_name, None).await?;
        parse_all(items, &self.table_name, item_to_duel)
    }

    async fn record_vote(&self, id: Uuid, side: DuelSide) -> Result<Duel, RepoError> {
        let counter = match side {
            DuelSide::First => "meme1Upvotes",
            DuelSide::Second => "meme2Upvotes",
        };
        let output = increment_counter(&self.client, &self.table_name, id, counter)
            .await
            .map_err(|e| not_found_or_backend(e, "Duel", id, &self.table_name))?;
        updated_record(output, id, &self.table_name, item_to_duel)
    }

    async fn end(&self, id: Uuid, at: DateTime<Utc>) -> Result<Duel, RepoError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET #timer = :timer")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_names("#timer", "timer")
            .expression_attribute_values(":timer", AttributeValue::S(at.to_rfc3339()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| not_found_or_backend(e, "Duel", id, &self.table_name))?;
        updated_record(output, id, &self.table_name, item_to_duel)
    }
}

// --- Shared DynamoDB helpers ---

async fn get_item(client: &DynamoDbClient, table_name: &str, id: Uuid) -> Result<Option<Item>, RepoError> {
    let resp = client
        .get_item()
        .table_name(table_name)
        .key("id", AttributeValue::S(id.to_string()))
        .send()
        .await
        .context(format!("DynamoDB (table: {}): Failed to get item (id: {})", table_name, id))?;
    Ok(resp.item)
}

/// Scans a whole table, following `LastEvaluatedKey` across pages.
async fn scan_items(
    client: &DynamoDbClient,
    table_name: &str,
    filter: Option<(&str, &str, AttributeValue)>,
) -> Result<Vec<Item>, RepoError> {
    tracing::debug!("DynamoDB: Scanning table '{}'", table_name);
    let mut items = Vec::new();
    let mut last_evaluated_key: Option<Item> = None;

    loop {
        let mut request_builder = client.scan().table_name(table_name);

        if let Some((expression, placeholder, value)) = &filter {
            request_builder = request_builder
                .filter_expression(*expression)
                .expression_attribute_values(*placeholder, value.clone());
        }

        // Apply ExclusiveStartKey if paginating from previous response
        if let Some(lek) = last_evaluated_key {
            request_builder = request_builder.set_exclusive_start_key(Some(lek));
        }

        let resp = request_builder
            .send()
            .await
            .context(format!("DynamoDB: Failed to scan table '{}'", table_name))?;

        if let Some(page) = resp.items {
            tracing::debug!("DynamoDB Scan (table: {}): Returned {} items", table_name, page.len());
            items.extend(page);
        }

        last_evaluated_key = resp.last_evaluated_key;
        if last_evaluated_key.is_none() {
            break;
        }
    }

    Ok(items)
}

async fn increment_counter(
    client: &DynamoDbClient,
    table_name: &str,
    id: Uuid,
    counter: &str,
) -> Result<UpdateItemOutput, SdkError<UpdateItemError>> {
    client
        .update_item()
        .table_name(table_name)
        .key("id", AttributeValue::S(id.to_string()))
        .update_expression("ADD #counter :one")
        .condition_expression("attribute_exists(id)")
        .expression_attribute_names("#counter", counter)
        .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
        .return_values(ReturnValue::AllNew)
        .send()
        .await
}

/// A failed `attribute_exists(id)` condition means the record is missing.
fn not_found_or_backend(
    err: SdkError<UpdateItemError>,
    kind: &'static str,
    id: Uuid,
    table_name: &str,
) -> RepoError {
    let missing = err
        .as_service_error()
        .map(|e| e.is_conditional_check_failed_exception())
        .unwrap_or(false);
    if missing {
        RepoError::NotFound(kind, id)
    } else {
        RepoError::BackendError(
            anyhow::Error::new(err).context(format!("DynamoDB (table: {}): Failed to update {} {}", table_name, kind, id)),
        )
    }
}

fn updated_record<T>(
    output: UpdateItemOutput,
    id: Uuid,
    table_name: &str,
    parse: fn(&Item) -> Option<T>,
) -> Result<T, RepoError> {
    output
        .attributes
        .as_ref()
        .and_then(parse)
        .ok_or_else(|| RepoError::DataCorruption(format!("updated item {} in table '{}'", id, table_name)))
}

fn parse_all<T>(items: Vec<Item>, table_name: &str, parse: fn(&Item) -> Option<T>) -> Result<Vec<T>, RepoError> {
    items
        .iter()
        .map(|item| {
            parse(item).ok_or_else(|| {
                let item_id = item.get("id").and_then(|v| v.as_s().ok());
                tracing::error!(item.id = ?item_id, table_name = %table_name, "DynamoDB: Failed to parse item from scan");
                // Fail fast if data in the table is corrupt
                RepoError::DataCorruption(format!("item {:?} during scan of table '{}'", item_id, table_name))
            })
        })
        .collect()
}

fn string_attr(item: &Item, key: &str) -> Option<String> {
    item.get(key)?.as_s().ok().cloned()
}

fn number_attr<T: FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)?.as_n().ok()?.parse().ok()
}

fn uuid_attr(item: &Item, key: &str) -> Option<Uuid> {
    Uuid::parse_str(item.get(key)?.as_s().ok()?).ok()
}

fn timestamp_attr(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    let raw = item.get(key)?.as_s().ok()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

fn string_list_attr(item: &Item, key: &str) -> Option<Vec<String>> {
    item.get(key)?
        .as_l()
        .ok()?
        .iter()
        .map(|v| v.as_s().ok().cloned())
        .collect()
}

fn meme_to_item(meme: &Meme) -> Item {
    let mut item = HashMap::from([
        ("id".to_string(), AttributeValue::S(meme.id.to_string())),
        ("title".to_string(), AttributeValue::S(meme.title.clone())),
        ("image_url".to_string(), AttributeValue::S(meme.image_url.clone())),
        (
            "tags".to_string(),
            AttributeValue::L(meme.tags.iter().cloned().map(AttributeValue::S).collect()),
        ),
        ("owner_id".to_string(), AttributeValue::N(meme.owner_id.to_string())),
        ("author".to_string(), AttributeValue::S(meme.author.clone())),
        ("author_avatar".to_string(), AttributeValue::S(meme.author_avatar.clone())),
        ("upvotes".to_string(), AttributeValue::N(meme.upvotes.to_string())),
        ("downvotes".to_string(), AttributeValue::N(meme.downvotes.to_string())),
        ("ai_caption".to_string(), AttributeValue::S(meme.ai_caption.clone())),
        ("vibe_analysis".to_string(), AttributeValue::S(meme.vibe_analysis.clone())),
        ("created_at".to_string(), AttributeValue::S(meme.created_at.to_rfc3339())),
    ]);
    if let Some(description) = &meme.description {
        item.insert("description".to_string(), AttributeValue::S(description.clone()));
    }
    item
}

fn item_to_meme(item: &Item) -> Option<Meme> {
    Some(Meme {
        id: uuid_attr(item, "id")?,
        title: string_attr(item, "title")?,
        image_url: string_attr(item, "image_url")?,
        description: string_attr(item, "description"),
        tags: string_list_attr(item, "tags")?,
        owner_id: number_attr(item, "owner_id")?,
        author: string_attr(item, "author")?,
        author_avatar: string_attr(item, "author_avatar")?,
        upvotes: number_attr(item, "upvotes").unwrap_or(0),
        downvotes: number_attr(item, "downvotes").unwrap_or(0),
        ai_caption: string_attr(item, "ai_caption").unwrap_or_default(),
        vibe_analysis: string_attr(item, "vibe_analysis").unwrap_or_default(),
        created_at: timestamp_attr(item, "created_at")?,
    })
}

fn bid_to_item(bid: &Bid) -> Item {
    HashMap::from([
        ("id".to_string(), AttributeValue::S(bid.id.to_string())),
        ("meme_id".to_string(), AttributeValue::S(bid.meme_id.to_string())),
        ("user_id".to_string(), AttributeValue::N(bid.user_id.to_string())),
        ("credits".to_string(), AttributeValue::N(bid.credits.to_string())),
        ("username".to_string(), AttributeValue::S(bid.username.clone())),
        ("created_at".to_string(), AttributeValue::S(bid.created_at.to_rfc3339())),
    ])
}

fn item_to_bid(item: &Item) -> Option<Bid> {
    Some(Bid {
        id: uuid_attr(item, "id")?,
        meme_id: uuid_attr(item, "meme_id")?,
        user_id: number_attr(item, "user_id")?,
        credits: number_attr(item, "credits")?,
        username: string_attr(item, "username")?,
        created_at: timestamp_attr(item, "created_at")?,
    })
}

fn duel_to_item(duel: &Duel) -> Item {
    HashMap::from([
        ("id".to_string(), AttributeValue::S(duel.id.to_string())),
        ("meme1".to_string(), AttributeValue::S(duel.meme1.to_string())),
        ("meme2".to_string(), AttributeValue::S(duel.meme2.to_string())),
        ("timer".to_string(), AttributeValue::S(duel.timer.to_rfc3339())),
        ("meme1Upvotes".to_string(), AttributeValue::N(duel.meme1_upvotes.to_string())),
        ("meme2Upvotes".to_string(), AttributeValue::N(duel.meme2_upvotes.to_string())),
        ("host".to_string(), AttributeValue::S(duel.host.clone())),
        ("created_at".to_string(), AttributeValue::S(duel.created_at.to_rfc3339())),
    ])
}

fn item_to_duel(item: &Item) -> Option<Duel> {
    Some(Duel {
        id: uuid_attr(item, "id")?,
        meme1: uuid_attr(item, "meme1")?,
        meme2: uuid_attr(item, "meme2")?,
        timer: timestamp_attr(item, "timer")?,
        meme1_upvotes: number_attr(item, "meme1Upvotes").unwrap_or(0),
        meme2_upvotes: number_attr(item, "meme2Upvotes").unwrap_or(0),
        host: string_attr(item, "host")?,
        created_at: timestamp_attr(item, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_meme() -> Meme {
        Meme {
            id: Uuid::new_v4(),
            title: "Stonks".to_string(),
            image_url: "https://picsum.photos/200".to_string(),
            description: None,
            tags: vec!["stonks".to_string(), "finance".to_string()],
            owner_id: 3,
            author: "stonksguy".to_string(),
            author_avatar: "https://i.pravatar.cc/150?u=3".to_string(),
            upvotes: 4,
            downvotes: 1,
            ai_caption: "Number go up".to_string(),
            vibe_analysis: "Retro Stonks Vibes".to_string(),
            created_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc),
        }
    }

    #[test]
    fn meme_items_keep_tag_order() {
        let meme = sample_meme();
        let item = meme_to_item(&meme);
        assert!(!item.contains_key("description"));
        assert_eq!(item_to_meme(&item), Some(meme));
    }

    #[test]
    fn meme_without_counters_defaults_to_zero() {
        let mut item = meme_to_item(&sample_meme());
        item.remove("upvotes");
        let meme = item_to_meme(&item).unwrap();
        assert_eq!(meme.upvotes, 0);
    }

    #[test]
    fn corrupt_meme_item_is_rejected() {
        let mut item = meme_to_item(&sample_meme());
        item.insert("id".to_string(), AttributeValue::S("not-a-uuid".to_string()));
        assert!(item_to_meme(&item).is_none());
        assert!(matches!(
            parse_all(vec![item], "memes", item_to_meme),
            Err(RepoError::DataCorruption(_))
        ));
    }

    #[test]
    fn duel_items_use_camel_case_counters() {
        let now = Utc::now();
        let duel = Duel {
            id: Uuid::new_v4(),
            meme1: Uuid::new_v4(),
            meme2: Uuid::new_v4(),
            timer: now + Duration::minutes(1),
            meme1_upvotes: 2,
            meme2_upvotes: 7,
            host: "vibelord".to_string(),
            created_at: now,
        };
        let item = duel_to_item(&duel);
        assert_eq!(item.get("meme2Upvotes").and_then(|v| v.as_n().ok()).map(String::as_str), Some("7"));
        let parsed = item_to_duel(&item).unwrap();
        assert_eq!(parsed.meme2_upvotes, 7);
        assert_eq!(parsed.timer.timestamp(), duel.timer.timestamp());
    }
}
