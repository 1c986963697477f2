//! Dropbox sink: uploads under an account-scoped root folder.
//!
//! Talks to the Dropbox HTTP API directly. Content uploads go to the content
//! host with their arguments in the `Dropbox-API-Arg` header; metadata calls
//! are JSON RPCs on the API host.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::Sink;
use crate::error::{Error, Result};

const CONTENT_HOST: &str = "https://content.dropboxapi.com/2";
const API_HOST: &str = "https://api.dropboxapi.com/2";

/// The account a token belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct DropboxAccount {
    pub name: DropboxName,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropboxName {
    pub display_name: String,
}

/// Remote sink backed by a Dropbox account.
#[derive(Clone)]
pub struct DropboxSink {
    client: Client,
    token: String,
    root_path: String,
}

impl DropboxSink {
    /// `root_path` is the folder all logical paths are placed under, e.g.
    /// `/reports`. For app-folder tokens it is relative to the app folder.
    pub fn new(client: Client, token: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            root_path: root_path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Full Dropbox path for a logical path.
    pub fn remote_path(&self, path: &str) -> String {
        format!("{}/{}", self.root_path, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Look up the account owning the token.
    pub async fn current_account(&self) -> Result<DropboxAccount> {
        let response = self
            .client
            .post(format!("{}/users/get_current_account", API_HOST))
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, "application/json")
            .body("null")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: "users/get_current_account".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<DropboxAccount>().await?)
    }
}

/// Serialize a JSON value for an HTTP header, escaping non-ASCII characters
/// as `\uXXXX` since header values must be ASCII.
pub(crate) fn header_safe_json(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[async_trait]
impl Sink for DropboxSink {
    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        let remote = self.remote_path(path);
        let arg = header_safe_json(&json!({
            "path": remote,
            "mode": "overwrite",
            "mute": true,
        }));

        let response = self
            .client
            .post(format!("{}/files/upload", CONTENT_HOST))
            .header(AUTHORIZATION, self.bearer())
            .header("Dropbox-API-Arg", arg)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload {
                path: remote,
                status: status.as_u16(),
                body,
            });
        }
        debug!("Uploaded {} bytes to dropbox:{}", content.len(), remote);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let remote = self.remote_path(path);
        let response = self
            .client
            .post(format!("{}/files/get_metadata", API_HOST))
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "path": remote }))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            // path/not_found is reported as an endpoint-specific 409
            StatusCode::CONFLICT => Ok(false),
            s => Err(Error::Status {
                url: format!("files/get_metadata {}", remote),
                status: s.as_u16(),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("dropbox:{}", self.root_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path_joins_root() {
        let sink = DropboxSink::new(Client::new(), "t", "/reports-conan/");
        assert_eq!(sink.root_path(), "/reports-conan");
        assert_eq!(
            sink.remote_path("conan/index_x.html"),
            "/reports-conan/conan/index_x.html"
        );
        assert_eq!(sink.remote_path("/files/a.pdf"), "/reports-conan/files/a.pdf");
    }

    #[test]
    fn test_header_safe_json_escapes_non_ascii() {
        let value = json!({"path": "/r/caf\u{e9}.pdf"});
        assert_eq!(header_safe_json(&value), r#"{"path":"/r/caf\u00e9.pdf"}"#);
    }

    #[test]
    fn test_header_safe_json_surrogate_pairs() {
        let value = json!("\u{1F4C4}");
        assert_eq!(header_safe_json(&value), r#""\ud83d\udcc4""#);
    }

    #[test]
    fn test_describe() {
        let sink = DropboxSink::new(Client::new(), "t", "/reports");
        assert_eq!(sink.describe(), "dropbox:/reports");
    }
}
