use anyhow::{Result, anyhow};
use log::info;
use serde_json::json;

use crate::config::MatrixConfig;

/// Matrix chat notifier posting text messages to a fixed room.
///
/// Every call performs a fresh password login; no session state is kept
/// between messages. Callers log failures and do not retry.
pub struct Notifier {
    homeserver: String,
    username: String,
    password: String,
    room_id: String,
    client: reqwest::Client,
}

impl Notifier {
    /// Create a new Notifier with the provided Matrix settings.
    pub fn new(matrix: MatrixConfig) -> Self {
        Self {
            homeserver: matrix.homeserver,
            username: matrix.username,
            password: matrix.password,
            room_id: matrix.room_id,
            client: reqwest::Client::new(),
        }
    }

    /// Log in with the configured password and return an access token.
    async fn login(&self) -> Result<String> {
        let payload = json!({
            "type": "m.login.password",
            "identifier": {
                "type": "m.id.user",
                "user": self.username,
            },
            "password": self.password,
        });

        let response = self
            .client
            .post(format!("{}/_matrix/client/v3/login", self.homeserver))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to log in to Matrix: HTTP {}",
                response.status()
            ));
        }

        let body: serde_json::Value = response.json().await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Matrix login response carried no access token"))
    }

    /// Post one `m.text` message to the configured room.
    ///
    /// # Errors
    ///
    /// Returns an error if the login or the send request fails; neither is
    /// retried.
    pub async fn send_message(&self, body: &str) -> Result<()> {
        let access_token = self.login().await?;

        // The transaction id only has to be unique per access token.
        let txn_id = chrono::Utc::now().timestamp_millis();
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            self.homeserver, self.room_id, txn_id
        );

        let response = self
            .client
            .put(url)
            .bearer_auth(access_token)
            .json(&json!({ "msgtype": "m.text", "body": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to send Matrix message: HTTP {}",
                response.status()
            ));
        }

        let reply: serde_json::Value = response.json().await?;
        info!(
            "sent text message(msg={:?}) => {}",
            body,
            reply["event_id"].as_str().unwrap_or("")
        );

        Ok(())
    }
}
