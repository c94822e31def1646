//! A captured request/response pair, as replayed from JSON lines.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_body: Option<String>,
    /// Send time in epoch milliseconds; the interceptor clock is used when absent.
    #[serde(default)]
    pub sent_at: Option<i64>,
}

impl Exchange {
    pub fn get(url: impl Into<String>, response_body: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            response_body: Some(response_body.into()),
            ..Self::default()
        }
    }

    pub fn post(
        url: impl Into<String>,
        request_body: impl Into<String>,
        response_body: impl Into<String>,
    ) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            request_body: Some(request_body.into()),
            response_body: Some(response_body.into()),
            ..Self::default()
        }
    }
}
