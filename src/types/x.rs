use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// X API v2 wraps every payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /users/{id}/tweets` response.
#[derive(Debug, Deserialize)]
pub struct TimelineResponse {
    #[serde(default)]
    pub data: Option<Vec<Tweet>>,
    #[serde(default)]
    pub meta: Option<TimelineMeta>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineMeta {
    #[serde(default)]
    pub result_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeResult {
    #[serde(default)]
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateTweetRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LikeRequest<'a> {
    pub tweet_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_parses_created_at_and_meta() {
        let body = r#"{
            "data": [{"id": "1", "text": "hi", "created_at": "2025-03-01T10:15:00.000Z"}],
            "meta": {"result_count": 1, "newest_id": "1"}
        }"#;
        let parsed: TimelineResponse = serde_json::from_str(body).unwrap();
        let tweets = parsed.data.unwrap();
        assert_eq!(parsed.meta.unwrap().result_count, Some(1));
        assert_eq!(
            tweets[0].created_at.unwrap().to_rfc3339(),
            "2025-03-01T10:15:00+00:00"
        );
    }

    #[test]
    fn empty_timeline_has_no_data() {
        let parsed: TimelineResponse = serde_json::from_str(r#"{"meta":{"result_count":0}}"#).unwrap();
        assert!(parsed.data.is_none());
    }
}
