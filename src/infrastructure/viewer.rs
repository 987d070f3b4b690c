// Viewer context - who is making the current request.

use crate::error::{AppError, AppResult};
use crate::infrastructure::security::TokenType;

#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub user_id: Option<String>,
    pub token_type: Option<TokenType>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        Self {
            user_id: None,
            token_type: None,
            request_id,
        }
    }

    pub fn authenticated(user_id: String, token_type: TokenType, request_id: String) -> Self {
        Self {
            user_id: Some(user_id),
            token_type: Some(token_type),
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Viewer id for reads that personalise output (`liked_by_user`).
    pub fn viewer_id(&self) -> Option<&str> {
        match self.token_type {
            Some(TokenType::Access) => self.user_id.as_deref(),
            _ => None,
        }
    }

    /// The acting user for mutations. Only access tokens qualify.
    pub fn require_user(&self) -> AppResult<&str> {
        match (&self.user_id, self.token_type) {
            (Some(user_id), Some(TokenType::Access)) => Ok(user_id),
            (Some(_), Some(TokenType::Refresh)) => {
                Err(AppError::unauthorized("Access token required"))
            }
            _ => Err(AppError::unauthorized("Authentication required")),
        }
    }

    /// The user behind a refresh token, for token renewal only.
    pub fn require_refresh(&self) -> AppResult<&str> {
        match (&self.user_id, self.token_type) {
            (Some(user_id), Some(TokenType::Refresh)) => Ok(user_id),
            (Some(_), _) => Err(AppError::unauthorized("Refresh token required")),
            _ => Err(AppError::unauthorized("Authentication required")),
        }
    }
}
