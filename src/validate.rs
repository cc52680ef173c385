//! Boundary checks that turn loosely typed input into typed requests.
//!
//! Nothing here touches the store: a request that fails validation has no
//! side effects.

use crate::model::NewImage;
use serde_json::{Map, Value};

/// Largest page size served; larger requests are capped silently.
pub const MAX_LIMIT: u64 = 50;
/// Page used when the query omits `page` or it does not parse.
pub const DEFAULT_PAGE: i64 = 1;
/// Page size used when the query omits `limit` or it does not parse.
pub const DEFAULT_LIMIT: i64 = 10;

/// A request rejected before reaching the store.
///
/// The `Display` text is the user-facing summary; [`ValidationError::reason`]
/// is a stable machine-checkable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Page must be greater than 0")]
    PageNotPositive,
    #[error("Limit must be greater than 0")]
    LimitNotPositive,
    #[error("id is required")]
    IdRequired,
    #[error("hearts is required")]
    HeartsRequired,
    #[error("id must be a number")]
    IdNotNumber,
    #[error("hearts must be a number")]
    HeartsNotNumber,
    #[error("id must be a non-negative integer")]
    IdNotInteger,
    #[error("hearts must be an integer")]
    HeartsNotInteger,
    #[error("hearts must be non-negative")]
    HeartsNegative,
    #[error("imageUrl and prompt are required")]
    PublishFieldsRequired,
    #[error("imageUrl is required")]
    ImageUrlRequired,
    #[error("prompt is required")]
    PromptRequired,
    #[error("imageUrl cannot be empty")]
    ImageUrlEmpty,
    #[error("prompt must be a string")]
    PromptNotString,
    #[error("Prompt is required")]
    GeneratePromptRequired,
    #[error("Invalid JSON body")]
    MalformedBody,
}

impl ValidationError {
    /// Stable snake_case code for clients and tests.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::PageNotPositive => "page_not_positive",
            ValidationError::LimitNotPositive => "limit_not_positive",
            ValidationError::IdRequired => "id_required",
            ValidationError::HeartsRequired => "hearts_required",
            ValidationError::IdNotNumber => "id_not_number",
            ValidationError::HeartsNotNumber => "hearts_not_number",
            ValidationError::IdNotInteger => "id_not_integer",
            ValidationError::HeartsNotInteger => "hearts_not_integer",
            ValidationError::HeartsNegative => "hearts_negative",
            ValidationError::PublishFieldsRequired => "publish_fields_required",
            ValidationError::ImageUrlRequired => "image_url_required",
            ValidationError::PromptRequired => "prompt_required",
            ValidationError::ImageUrlEmpty => "image_url_empty",
            ValidationError::PromptNotString => "prompt_not_string",
            ValidationError::GeneratePromptRequired => "generate_prompt_required",
            ValidationError::MalformedBody => "malformed_body",
        }
    }
}

/// A validated feed window request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    /// 1-based page number.
    pub page: u64,
    /// Page size in `1..=MAX_LIMIT`.
    pub limit: u64,
}

/// A validated absolute hearts write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartsUpdate {
    pub id: u64,
    pub hearts: u64,
}

/// Fails unless `page >= 1`.
pub fn validate_page(page: i64) -> Result<u64, ValidationError> {
    u64::try_from(page)
        .ok()
        .filter(|&p| p >= 1)
        .ok_or(ValidationError::PageNotPositive)
}

/// Fails unless `limit >= 1`; anything above [`MAX_LIMIT`] is capped.
pub fn validate_limit(limit: i64) -> Result<u64, ValidationError> {
    u64::try_from(limit)
        .ok()
        .filter(|&l| l >= 1)
        .map(|l| l.min(MAX_LIMIT))
        .ok_or(ValidationError::LimitNotPositive)
}

impl FeedQuery {
    /// Build from raw query-string values.
    ///
    /// Each value is read as a leading integer (`"3abc"` is 3); a missing or
    /// non-numeric value falls back to the default.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Result<Self, ValidationError> {
        let page = page.and_then(parse_int_prefix).unwrap_or(DEFAULT_PAGE);
        let limit = limit.and_then(parse_int_prefix).unwrap_or(DEFAULT_LIMIT);
        Ok(FeedQuery {
            page: validate_page(page)?,
            limit: validate_limit(limit)?,
        })
    }

    /// Index of the first record on this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Validate a `{id, hearts}` body.
///
/// Checks run in a fixed order (presence, type, range) so the first failure
/// reported is deterministic.
pub fn validate_hearts_update(body: &Value) -> Result<HeartsUpdate, ValidationError> {
    let fields = body.as_object();
    let id = present(fields, "id").ok_or(ValidationError::IdRequired)?;
    let hearts = present(fields, "hearts").ok_or(ValidationError::HeartsRequired)?;

    if !id.is_number() {
        return Err(ValidationError::IdNotNumber);
    }
    if !hearts.is_number() {
        return Err(ValidationError::HeartsNotNumber);
    }
    if hearts.as_f64().is_some_and(|h| h < 0.0) {
        return Err(ValidationError::HeartsNegative);
    }

    Ok(HeartsUpdate {
        id: whole_number(id).ok_or(ValidationError::IdNotInteger)?,
        hearts: whole_number(hearts).ok_or(ValidationError::HeartsNotInteger)?,
    })
}

/// A non-negative integral number that fits in `u64`, whether written as
/// `5`, `5.0` or `5e0`.
fn whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n < u64::MAX as f64)
            .map(|n| n as u64)
    })
}

/// Validate a `{imageUrl, prompt}` body. An empty prompt is accepted.
pub fn validate_publish_payload(body: &Value) -> Result<NewImage, ValidationError> {
    let fields = body.as_object();
    let image_url = present(fields, "imageUrl");
    let prompt = present(fields, "prompt");

    let (image_url, prompt) = match (image_url, prompt) {
        (None, None) => return Err(ValidationError::PublishFieldsRequired),
        (None, Some(_)) => return Err(ValidationError::ImageUrlRequired),
        (Some(_), None) => return Err(ValidationError::PromptRequired),
        (Some(image_url), Some(prompt)) => (image_url, prompt),
    };

    let image_url = image_url
        .as_str()
        .filter(|url| !url.trim().is_empty())
        .ok_or(ValidationError::ImageUrlEmpty)?;
    let prompt = prompt.as_str().ok_or(ValidationError::PromptNotString)?;

    Ok(NewImage {
        image_url: image_url.to_string(),
        prompt: prompt.to_string(),
    })
}

/// Validate a `{prompt}` generation body. The prompt must be a non-empty
/// string.
pub fn validate_generate_prompt(body: &Value) -> Result<String, ValidationError> {
    present(body.as_object(), "prompt")
        .and_then(Value::as_str)
        .filter(|prompt| !prompt.is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::GeneratePromptRequired)
}

/// A field counts as absent when it is missing or `null`.
fn present<'a>(fields: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a Value> {
    fields?.get(key).filter(|v| !v.is_null())
}

/// Leading-integer parse: optional whitespace, optional sign, then digits.
/// Trailing garbage is ignored; no digits at all is `None`.
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    // Saturate instead of failing: a huge page is just past the end.
    let magnitude = rest[..digits_end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_must_be_positive() {
        assert_eq!(validate_page(1), Ok(1));
        assert_eq!(validate_page(0), Err(ValidationError::PageNotPositive));
        assert_eq!(validate_page(-4), Err(ValidationError::PageNotPositive));
    }

    #[test]
    fn limit_is_capped_not_rejected() {
        assert_eq!(validate_limit(50), Ok(50));
        assert_eq!(validate_limit(51), Ok(50));
        assert_eq!(validate_limit(10_000), Ok(50));
        assert_eq!(validate_limit(0), Err(ValidationError::LimitNotPositive));
        assert_eq!(validate_limit(-1), Err(ValidationError::LimitNotPositive));
    }

    #[test]
    fn query_defaults_and_prefix_parsing() {
        assert_eq!(
            FeedQuery::from_params(None, None),
            Ok(FeedQuery { page: 1, limit: 10 })
        );
        assert_eq!(
            FeedQuery::from_params(Some("abc"), Some("")),
            Ok(FeedQuery { page: 1, limit: 10 })
        );
        assert_eq!(
            FeedQuery::from_params(Some("3xyz"), Some(" 7")),
            Ok(FeedQuery { page: 3, limit: 7 })
        );
        assert_eq!(
            FeedQuery::from_params(Some("0"), None),
            Err(ValidationError::PageNotPositive)
        );
        assert_eq!(
            FeedQuery::from_params(None, Some("-5")),
            Err(ValidationError::LimitNotPositive)
        );
    }

    #[test]
    fn offset_is_zero_based() {
        let q = FeedQuery { page: 2, limit: 5 };
        assert_eq!(q.offset(), 5);
    }

    #[test]
    fn hearts_update_checks_in_order() {
        let cases = [
            (json!({}), ValidationError::IdRequired),
            (json!({"id": null, "hearts": 1}), ValidationError::IdRequired),
            (json!({"id": 1}), ValidationError::HeartsRequired),
            (json!({"id": "1", "hearts": 1}), ValidationError::IdNotNumber),
            (json!({"id": 1, "hearts": "1"}), ValidationError::HeartsNotNumber),
            (json!({"id": 1, "hearts": -1}), ValidationError::HeartsNegative),
            (json!({"id": 1, "hearts": -0.5}), ValidationError::HeartsNegative),
            (json!({"id": 1.5, "hearts": 1}), ValidationError::IdNotInteger),
            (json!({"id": -2, "hearts": 1}), ValidationError::IdNotInteger),
            (json!({"id": 1, "hearts": 2.5}), ValidationError::HeartsNotInteger),
            (json!({"id": 1e30, "hearts": 1}), ValidationError::IdNotInteger),
            (json!([1, 2]), ValidationError::IdRequired),
        ];
        for (body, expected) in cases {
            assert_eq!(validate_hearts_update(&body), Err(expected), "{body}");
        }
        assert_eq!(
            validate_hearts_update(&json!({"id": 7, "hearts": 0})),
            Ok(HeartsUpdate { id: 7, hearts: 0 })
        );

        let integral = [
            (json!({"id": 1, "hearts": 5.0}), HeartsUpdate { id: 1, hearts: 5 }),
            (json!({"id": 1.0, "hearts": 5}), HeartsUpdate { id: 1, hearts: 5 }),
            (json!({"id": 2, "hearts": 1e3}), HeartsUpdate { id: 2, hearts: 1000 }),
            (json!({"id": 3, "hearts": -0.0}), HeartsUpdate { id: 3, hearts: 0 }),
        ];
        for (body, expected) in integral {
            assert_eq!(validate_hearts_update(&body), Ok(expected), "{body}");
        }
    }

    #[test]
    fn publish_payload_rules() {
        let cases = [
            (json!({}), ValidationError::PublishFieldsRequired),
            (json!({"prompt": "cat"}), ValidationError::ImageUrlRequired),
            (json!({"imageUrl": "http://x"}), ValidationError::PromptRequired),
            (json!({"imageUrl": "", "prompt": "cat"}), ValidationError::ImageUrlEmpty),
            (json!({"imageUrl": "   ", "prompt": "cat"}), ValidationError::ImageUrlEmpty),
            (json!({"imageUrl": 5, "prompt": "cat"}), ValidationError::ImageUrlEmpty),
            (json!({"imageUrl": "http://x", "prompt": 3}), ValidationError::PromptNotString),
        ];
        for (body, expected) in cases {
            assert_eq!(validate_publish_payload(&body), Err(expected), "{body}");
        }

        let ok = validate_publish_payload(&json!({"imageUrl": "http://x/y.png", "prompt": ""}))
            .unwrap();
        assert_eq!(ok.image_url, "http://x/y.png");
        assert_eq!(ok.prompt, "");
    }

    #[test]
    fn generate_prompt_must_be_non_empty_string() {
        assert_eq!(validate_generate_prompt(&json!({"prompt": "a fox"})), Ok("a fox".into()));
        for body in [json!({}), json!({"prompt": ""}), json!({"prompt": 4}), json!(null)] {
            assert_eq!(
                validate_generate_prompt(&body),
                Err(ValidationError::GeneratePromptRequired)
            );
        }
    }

    #[test]
    fn reason_codes_are_distinct() {
        let all = [
            ValidationError::PageNotPositive,
            ValidationError::LimitNotPositive,
            ValidationError::IdRequired,
            ValidationError::HeartsRequired,
            ValidationError::IdNotNumber,
            ValidationError::HeartsNotNumber,
            ValidationError::IdNotInteger,
            ValidationError::HeartsNotInteger,
            ValidationError::HeartsNegative,
            ValidationError::PublishFieldsRequired,
            ValidationError::ImageUrlRequired,
            ValidationError::PromptRequired,
            ValidationError::ImageUrlEmpty,
            ValidationError::PromptNotString,
            ValidationError::GeneratePromptRequired,
            ValidationError::MalformedBody,
        ];
        let reasons: std::collections::HashSet<_> = all.iter().map(|e| e.reason()).collect();
        assert_eq!(reasons.len(), all.len());
    }
}
