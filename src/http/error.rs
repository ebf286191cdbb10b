use rouille::Response;
use serde_json::json;

use crate::storage::error::StatsError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::MissingTrackId => ApiError::BadRequest("track id is required".into()),

            StatsError::MissingUserId => ApiError::BadRequest("userId is required".into()),

            StatsError::Storage(e) => {
                log::error!("Stats storage failure: {e}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => msg,
        };
        Response::json(&json!({ "message": message })).with_status_code(status)
    }
}
