//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::catalog::{Account, Track};

/// Response from caption generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub caption: String,
}

/// Body of `/analyze-emotion` and `/recommend-songs`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionRequest {
    /// Text to classify; missing means empty
    #[serde(default)]
    pub caption: String,
}

/// Response from song recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongsResponse {
    pub songs: Vec<Track>,
}

/// Response for the connected catalog account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    /// Display name of the account
    pub account: Option<String>,
    pub id: String,
    pub uri: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account: account.display_name,
            id: account.id,
            uri: account.uri,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_request_defaults_to_empty() {
        let req: CaptionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.caption, "");
    }

    #[test]
    fn test_account_response_fields() {
        let resp = AccountResponse::from(Account {
            display_name: Some("Listener".to_string()),
            id: "abc".to_string(),
            uri: "spotify:user:abc".to_string(),
        });

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "account": "Listener",
                "id": "abc",
                "uri": "spotify:user:abc"
            })
        );
    }

    #[test]
    fn test_songs_response_shape() {
        let resp = SongsResponse {
            songs: vec![Track {
                name: "Song".to_string(),
                artist: "Artist".to_string(),
                uri: "spotify:track:1".to_string(),
            }],
        };

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["songs"][0]["artist"], "Artist");
    }
}
