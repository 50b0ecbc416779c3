use crate::errors::AppError;
use url::Url;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 50;
pub const MIN_BID: i64 = 1;
pub const MAX_BID: i64 = 1000;
pub const MAX_LEADERBOARD_TOP: u32 = 100;

/// Collects every problem with a new meme rather than stopping at the first.
pub fn validate_meme(
    title: &str,
    image_url: &str,
    tags: &[String],
    description: Option<&str>,
) -> Result<(), AppError> {
    let mut details = Vec::new();

    let title_len = title.trim().chars().count();
    if title_len == 0 {
        details.push("\"title\" is not allowed to be empty".to_string());
    } else if title.chars().count() > MAX_TITLE_CHARS {
        details.push(format!("\"title\" length must be less than or equal to {} characters long", MAX_TITLE_CHARS));
    }

    match Url::parse(image_url) {
        Ok(url) if url.has_host() => {}
        _ => details.push("\"image_url\" must be a valid uri".to_string()),
    }

    if tags.is_empty() {
        details.push("\"tags\" must contain at least 1 items".to_string());
    } else if tags.len() > MAX_TAGS {
        details.push(format!("\"tags\" must contain less than or equal to {} items", MAX_TAGS));
    }
    for (index, tag) in tags.iter().enumerate() {
        let len = tag.trim().chars().count();
        if len == 0 {
            details.push(format!("\"tags[{}]\" is not allowed to be empty", index));
        } else if tag.chars().count() > MAX_TAG_CHARS {
            details.push(format!("\"tags[{}]\" length must be less than or equal to {} characters long", index, MAX_TAG_CHARS));
        }
    }

    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            details.push(format!(
                "\"description\" length must be less than or equal to {} characters long",
                MAX_DESCRIPTION_CHARS
            ));
        }
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(details))
    }
}

pub fn validate_bid_credits(credits: i64) -> Result<u32, AppError> {
    if !(MIN_BID..=MAX_BID).contains(&credits) {
        return Err(AppError::Validation(vec![format!(
            "\"credits\" must be between {} and {}",
            MIN_BID, MAX_BID
        )]));
    }
    Ok(credits as u32)
}

pub fn validate_top(top: u32) -> Result<usize, AppError> {
    if top == 0 || top > MAX_LEADERBOARD_TOP {
        return Err(AppError::InvalidQuery(vec![format!(
            "\"top\" must be between 1 and {}",
            MAX_LEADERBOARD_TOP
        )]));
    }
    Ok(top as usize)
}
