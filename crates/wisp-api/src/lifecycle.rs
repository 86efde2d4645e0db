//! Message lifecycle: Pending → Viewed → gone.
//!
//! Every transition is a single compare-and-set against the store, keyed by
//! the token lookup key or the message id, so two concurrent viewers cannot
//! both win the one-time view. Expiry is derived from `expires_at` at read
//! time; a purge loop in the server merely bounds residue.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use wisp_crypto::{envelope, wordtoken};
use wisp_db::Database;
use wisp_db::models::{MessageRow, format_ts, parse_ts};
use wisp_db::queries::is_unique_violation;

use crate::error::ApiError;

/// Collision retries before token allocation gives up.
pub const ALLOC_BUDGET: usize = 8;
/// Tokens shorter than this are rejected before any store lookup.
pub const MIN_TOKEN_LEN: usize = 4;
const MAX_TOKEN_LEN: usize = 64;

/// Creation-time default and ceiling for the expiry horizon.
pub const DEFAULT_HORIZON_HOURS: u32 = 168;
pub const MAX_HORIZON_HOURS: u32 = 168;

const MAX_CONTENT_ITEMS: usize = 100;
const MAX_ITEM_CHARS: usize = 64;
const MAX_RESPONSE_CHARS: usize = 8;

pub struct NewMessage {
    pub creator_id: Uuid,
    pub content: Vec<String>,
    pub expires_in_hours: Option<u32>,
    pub secret: bool,
}

pub struct CreatedMessage {
    pub id: Uuid,
    /// The shareable view token. For secret messages this is the only copy
    /// of the bearer secret that will ever exist.
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct MessageUpdate {
    pub content: Option<Vec<String>>,
    pub expires_in_hours: Option<u32>,
}

pub struct UpdatedMessage {
    pub id: Uuid,
    /// Some when a secret message was re-sealed: the old link is dead.
    pub share_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

pub struct ViewedMessage {
    pub content: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pick an unused word token, bumping structural complexity on every
/// collision. `is_taken` is the store pre-check; the UNIQUE constraint at
/// insert time stays the authoritative backstop.
pub fn allocate_view_token(
    mut is_taken: impl FnMut(&str) -> anyhow::Result<bool>,
) -> Result<String, ApiError> {
    let mut complexity = 2;
    for _ in 0..ALLOC_BUDGET {
        let candidate = wordtoken::generate(complexity);
        complexity += 1;
        if candidate.len() < MIN_TOKEN_LEN {
            continue;
        }
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
        warn!("view token collision at complexity {}", complexity - 1);
    }
    Err(ApiError::AllocationExhausted)
}

pub fn create_message(
    db: &Database,
    kdf_salt: &[u8],
    req: &NewMessage,
    now: DateTime<Utc>,
) -> Result<CreatedMessage, ApiError> {
    validate_content(&req.content)?;
    let expires_at = now + horizon(req.expires_in_hours)?;
    let plaintext =
        serde_json::to_string(&req.content).map_err(|e| ApiError::Internal(e.into()))?;

    let id = Uuid::new_v4();
    let mut row = MessageRow {
        id: id.to_string(),
        creator_id: req.creator_id.to_string(),
        content: plaintext,
        view_token: String::new(),
        secret: req.secret,
        expires_at: format_ts(expires_at),
        viewed_at: None,
        response: None,
        created_at: format_ts(now),
    };

    let share_token = if req.secret {
        let sealed = envelope::seal(row.content.as_bytes(), kdf_salt)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
        row.content = sealed.record;
        row.view_token = sealed.digest;
        db.insert_message(&row)?;
        sealed.token
    } else {
        let mut races = 0;
        loop {
            let token = allocate_view_token(|candidate| db.token_exists(candidate))?;
            row.view_token = token.clone();
            match db.insert_message(&row) {
                Ok(()) => break token,
                Err(e) if is_unique_violation(&e) && races < ALLOC_BUDGET => {
                    // Lost the check-then-insert race to a concurrent writer.
                    races += 1;
                    warn!("view token raced at insert, retrying ({})", races);
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    Ok(CreatedMessage {
        id,
        share_token,
        expires_at,
        created_at: now,
    })
}

/// The one-time view. On success `viewed_at` is set atomically and the
/// content is returned exactly once; any later attempt gets the same
/// uniform not-found as a missing or expired message.
pub fn view_message(
    db: &Database,
    kdf_salt: &[u8],
    vtoken: &str,
    now: DateTime<Utc>,
) -> Result<ViewedMessage, ApiError> {
    check_token_shape(vtoken)?;

    let key = envelope::lookup_key(vtoken);
    let row = db.find_by_view_token(&key)?.ok_or(ApiError::NotFound)?;

    let now_s = format_ts(now);
    if row.viewed_at.is_some() || row.expires_at <= now_s {
        return Err(ApiError::NotFound);
    }
    // CAS: of two concurrent viewers, exactly one passes.
    if !db.mark_viewed(&key, &now_s)? {
        return Err(ApiError::NotFound);
    }

    let plaintext = if row.secret {
        let opened = envelope::open(&row.content, vtoken, kdf_salt).map_err(|_| ApiError::Auth)?;
        String::from_utf8(opened).map_err(|_| ApiError::Auth)?
    } else {
        row.content
    };
    let content =
        serde_json::from_str(&plaintext).map_err(|e| ApiError::Internal(e.into()))?;

    Ok(ViewedMessage {
        content,
        expires_at: parse_ts(&row.expires_at),
        created_at: parse_ts(&row.created_at),
    })
}

/// Attach the single short response. Allowed once, after the view and
/// before expiry; everything else is the uniform not-found.
pub fn respond_to_message(
    db: &Database,
    vtoken: &str,
    response: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    check_token_shape(vtoken)?;
    let chars = response.chars().count();
    if chars == 0 || chars > MAX_RESPONSE_CHARS {
        return Err(ApiError::Validation("response must be 1..=8 characters"));
    }

    if !db.set_response(&envelope::lookup_key(vtoken), response, &format_ts(now))? {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub fn update_message(
    db: &Database,
    kdf_salt: &[u8],
    creator_id: Uuid,
    id: Uuid,
    update: &MessageUpdate,
    now: DateTime<Utc>,
) -> Result<UpdatedMessage, ApiError> {
    let row = db.get_message(&id.to_string())?.ok_or(ApiError::NotFound)?;
    if row.creator_id != creator_id.to_string() {
        // Other creators' messages look nonexistent.
        return Err(ApiError::NotFound);
    }
    if row.viewed_at.is_some() {
        return Err(ApiError::Validation("cannot update a viewed message"));
    }

    let mut share_token = None;
    if let Some(content) = &update.content {
        validate_content(content)?;
        let plaintext =
            serde_json::to_string(content).map_err(|e| ApiError::Internal(e.into()))?;

        let (stored, token, secret) = if row.secret {
            // Re-seal under a fresh secret; the old share link is dead.
            let sealed = envelope::seal(plaintext.as_bytes(), kdf_salt)
                .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;
            share_token = Some(sealed.token);
            (sealed.record, sealed.digest, true)
        } else {
            (plaintext, row.view_token.clone(), false)
        };

        if !db.update_content(&row.id, &row.creator_id, &stored, &token, secret)? {
            // Viewed between the check and the write.
            return Err(ApiError::Validation("cannot update a viewed message"));
        }
    }

    let mut expires_at = parse_ts(&row.expires_at);
    if let Some(hours) = update.expires_in_hours {
        let extended = now + horizon(Some(hours))?;
        if !db.update_expiry(&row.id, &row.creator_id, &format_ts(extended))? {
            return Err(ApiError::Validation("cannot update a viewed message"));
        }
        expires_at = extended;
    }

    Ok(UpdatedMessage {
        id,
        share_token,
        expires_at,
    })
}

/// Creator-initiated deletion, allowed from any state.
pub fn delete_message(db: &Database, creator_id: Uuid, id: Uuid) -> Result<(), ApiError> {
    if !db.delete_message(&id.to_string(), &creator_id.to_string())? {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

fn validate_content(content: &[String]) -> Result<(), ApiError> {
    if content.is_empty() || content.len() > MAX_CONTENT_ITEMS {
        return Err(ApiError::Validation("content must have 1..=100 elements"));
    }
    if content
        .iter()
        .any(|item| item.is_empty() || item.chars().count() > MAX_ITEM_CHARS)
    {
        return Err(ApiError::Validation("content element must be 1..=64 characters"));
    }
    Ok(())
}

fn horizon(requested: Option<u32>) -> Result<Duration, ApiError> {
    let hours = requested.unwrap_or(DEFAULT_HORIZON_HOURS);
    if hours < 1 || hours > MAX_HORIZON_HOURS {
        return Err(ApiError::Validation("expiry horizon must be 1..=168 hours"));
    }
    Ok(Duration::hours(i64::from(hours)))
}

/// Cheap shape check so scanning junk never reaches the store.
fn check_token_shape(vtoken: &str) -> Result<(), ApiError> {
    let len_ok = vtoken.len() >= MIN_TOKEN_LEN && vtoken.len() <= MAX_TOKEN_LEN;
    let charset_ok = vtoken
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if len_ok && charset_ok {
        Ok(())
    } else {
        Err(ApiError::Validation("view token is invalid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_returns_an_unused_token() {
        let token = allocate_view_token(|_| Ok(false)).unwrap();
        assert!(token.len() >= MIN_TOKEN_LEN);
        assert!(!envelope::is_secret_token(&token));
    }

    #[test]
    fn allocator_gives_up_after_its_budget() {
        let mut calls = 0;
        let result = allocate_view_token(|_| {
            calls += 1;
            Ok(true)
        });

        assert!(matches!(result, Err(ApiError::AllocationExhausted)));
        assert_eq!(calls, ALLOC_BUDGET);
    }

    #[test]
    fn allocator_surfaces_store_errors() {
        let result = allocate_view_token(|_| Err(anyhow::anyhow!("store down")));
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[test]
    fn token_shape_gate() {
        assert!(check_token_shape("brave-falcon").is_ok());
        assert!(check_token_shape("eZm9vYmFyYmF6cXV4").is_ok());
        assert!(check_token_shape("abc").is_err()); // too short
        assert!(check_token_shape("no spaces here").is_err());
        assert!(check_token_shape(&"x".repeat(65)).is_err());
    }

    #[test]
    fn horizon_bounds() {
        assert_eq!(horizon(None).unwrap(), Duration::hours(168));
        assert_eq!(horizon(Some(24)).unwrap(), Duration::hours(24));
        assert!(horizon(Some(0)).is_err());
        assert!(horizon(Some(169)).is_err());
    }
}
