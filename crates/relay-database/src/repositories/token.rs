//! OAuth access token lookups.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::MySqlPool;

use relay_core::error::AppError;
use relay_core::result::AppResult;
use relay_core::traits::{TokenDirectory, TokenRecord};

use crate::connection::db_error;

/// Token directory over `oauth_access_tokens`.
#[derive(Debug, Clone)]
pub struct SqlTokenDirectory {
    pool: MySqlPool,
}

impl SqlTokenDirectory {
    /// Creates a directory over `pool`.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenDirectory for SqlTokenDirectory {
    async fn find_active_token(&self, token_id: &str) -> AppResult<Option<TokenRecord>> {
        let row = sqlx::query(
            "SELECT CAST(user_id AS UNSIGNED) AS user_id, scopes, \
             CAST(COALESCE(verified, 0) AS UNSIGNED) AS verified \
             FROM oauth_access_tokens \
             WHERE revoked = false AND expires_at > now() AND id = ?",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to look up access token", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: u64 = row
            .try_get("user_id")
            .map_err(|e| db_error("Failed to read token owner", e))?;
        let scopes: Option<String> = row
            .try_get("scopes")
            .map_err(|e| db_error("Failed to read token scopes", e))?;
        let verified: u64 = row
            .try_get("verified")
            .map_err(|e| db_error("Failed to read token verification", e))?;

        Ok(Some(TokenRecord {
            user_id,
            scopes: parse_scopes(scopes.as_deref())?,
            verified: verified != 0,
        }))
    }
}

/// Parses the JSON scope list stored with a token.
fn parse_scopes(raw: Option<&str>) -> AppResult<Vec<String>> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::database(format!("Token scopes are not a JSON list: {e}"))),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes(Some(r#"["chat.read","identify"]"#)).unwrap(),
            vec!["chat.read".to_string(), "identify".to_string()]
        );
        assert!(parse_scopes(None).unwrap().is_empty());
        assert!(parse_scopes(Some("{}")).is_err());
    }
}
