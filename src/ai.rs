//! Caption and vibe generation with static fallbacks.

use crate::{cache::CacheService, domain::TextGenerator, errors::AiError};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};

pub const FALLBACK_CAPTIONS: [&str; 10] = [
    "YOLO to the moon! 🚀",
    "When life gives you memes... 😎",
    "This hits different 💯",
    "Big mood energy ⚡",
    "POV: You're winning at life 🏆",
    "No cap, this is fire 🔥",
    "Main character energy 👑",
    "It's giving legendary vibes ✨",
    "That's some premium content 💎",
    "Certified meme classic 📜",
];

pub const FALLBACK_VIBES: [&str; 10] = [
    "Retro Stonks Vibes",
    "Chaotic Good Energy",
    "Vintage Flex Mode",
    "Premium Meme Tier",
    "Galaxy Brain Status",
    "Sigma Grindset",
    "Based and Meme-pilled",
    "Absolute Unit Energy",
    "Touch Grass Reminder",
    "NPC Behavior Detected",
];

const MAX_VIBE_CHARS: usize = 50;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 0.8,
                "topK": 40,
                "maxOutputTokens": 100
            }
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub caption: String,
    pub vibe: String,
}

/// Wraps an optional generator. Without one, every call resolves to a fallback.
#[derive(Clone)]
pub struct AiService {
    generator: Option<Arc<dyn TextGenerator>>,
    cache: CacheService,
}

impl AiService {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, cache: CacheService) -> Self {
        if generator.is_none() {
            tracing::warn!("AI provider not configured - AI features will use fallbacks");
        }
        Self { generator, cache }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn generate_caption(&self, tags: &[String], title: &str) -> String {
        let Some(generator) = &self.generator else {
            tracing::warn!("AI provider not available, using fallback caption");
            return fallback_caption();
        };

        let prompt = caption_prompt(tags, title);
        if let Some(cached) = self.cache.get_ai_response(&prompt).await {
            tracing::debug!("Using cached AI caption");
            return cached;
        }

        match generator.generate(&prompt).await {
            Ok(caption) => {
                let caption = caption.trim().to_string();
                self.cache.set_ai_response(&prompt, &caption).await;
                tracing::info!(caption = %caption.chars().take(50).collect::<String>(), "Generated AI caption");
                caption
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate AI caption");
                fallback_caption()
            }
        }
    }

    pub async fn generate_vibe(&self, tags: &[String], title: &str) -> String {
        let Some(generator) = &self.generator else {
            tracing::warn!("AI provider not available, using fallback vibe");
            return fallback_vibe();
        };

        let prompt = vibe_prompt(tags, title);
        if let Some(cached) = self.cache.get_ai_response(&prompt).await {
            tracing::debug!("Using cached AI vibe analysis");
            return cached;
        }

        match generator.generate(&prompt).await {
            Ok(vibe) => {
                let vibe = vibe.trim().to_string();
                if vibe.is_empty() || vibe.chars().count() > MAX_VIBE_CHARS {
                    tracing::warn!(length = vibe.chars().count(), "Invalid vibe response, using fallback");
                    return fallback_vibe();
                }
                self.cache.set_ai_response(&prompt, &vibe).await;
                tracing::info!(%vibe, "Generated AI vibe");
                vibe
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate AI vibe analysis");
                fallback_vibe()
            }
        }
    }

    pub async fn generate_both(&self, tags: &[String], title: &str) -> GeneratedContent {
        if self.generator.is_none() {
            tracing::warn!("AI provider not available, using fallbacks");
            return GeneratedContent {
                caption: fallback_caption(),
                vibe: fallback_vibe(),
            };
        }

        let (caption, vibe) = tokio::join!(self.generate_caption(tags, title), self.generate_vibe(tags, title));
        tracing::debug!(%caption, %vibe, "Generated AI content");
        GeneratedContent { caption, vibe }
    }
}

fn caption_prompt(tags: &[String], title: &str) -> String {
    let title_part = if title.is_empty() {
        String::new()
    } else {
        format!(" and title: \"{}\"", title)
    };
    format!(
        "Generate a funny, witty caption for a meme with these tags: {}{}. Keep it under 100 characters, use internet slang, and make it engaging. Don't include quotes in the response.",
        tags.join(", "),
        title_part
    )
}

fn vibe_prompt(tags: &[String], title: &str) -> String {
    let title_part = if title.is_empty() {
        String::new()
    } else {
        format!(" (title: \"{}\")", title)
    };
    format!(
        "You are a meme expert. Analyze the vibe/mood of a meme with these tags: {}{}. Respond with ONLY a short 2-4 word phrase describing the vibe/energy (like \"Retro Stonks Vibes\", \"Chaotic Good Energy\", etc.). Use internet culture terms and be creative. No explanation needed.",
        tags.join(", "),
        title_part
    )
}

pub fn fallback_caption() -> String {
    let caption = FALLBACK_CAPTIONS.choose(&mut rand::rng()).copied().unwrap_or(FALLBACK_CAPTIONS[0]);
    tracing::debug!(%caption, "Using fallback caption");
    caption.to_string()
}

pub fn fallback_vibe() -> String {
    let vibe = FALLBACK_VIBES.choose(&mut rand::rng()).copied().unwrap_or(FALLBACK_VIBES[0]);
    tracing::debug!(%vibe, "Using fallback vibe");
    vibe.to_string()
}
