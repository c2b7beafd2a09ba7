use crate::errors::RelayError;
use crate::payload::RowsetEntry;

/// Sends a complete rowset to the bulk upsert endpoint in a single request.
pub struct RowsetClient<'a> {
    client: &'a reqwest::Client,
    url: &'a str,
}

impl<'a> RowsetClient<'a> {
    pub fn new(client: &'a reqwest::Client, url: &'a str) -> Self {
        RowsetClient { client, url }
    }

    /// Returns the platform's response body when it sent one. A body that is
    /// not JSON is passed back as a string.
    pub async fn upsert(
        &self,
        token: &str,
        entries: &[RowsetEntry<'_>],
    ) -> Result<Option<serde_json::Value>, RelayError> {
        let response = self
            .client
            .post(self.url)
            .bearer_auth(token)
            .json(entries)
            .send()
            .await
            .map_err(RelayError::UpsertTransport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(RelayError::UpsertRejected { status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(RelayError::UpsertTransport)?;
        if bytes.is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Row;
    use crate::payload::build_rowset;
    use hyper::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serves one response whose body ends long before its declared length.
    async fn truncated_response_server(status_line: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 100\r\nconnection: close\r\n\r\npartial"
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
        });

        format!("http://{addr}/hub/v1/dataevents/key:Email_Field_Entries/rowset")
    }

    #[tokio::test]
    async fn test_rejection_with_unreadable_body() {
        let url = truncated_response_server("500 Internal Server Error").await;
        let client = reqwest::Client::new();
        let rows = vec![Row {
            email_name: "Welcome Email".into(),
            field_name: "subject".into(),
            field_value: "Hi".into(),
            entry_timestamp: "2026-10-19T12:00:00.000Z".into(),
        }];

        let err = RowsetClient::new(&client, &url)
            .upsert("tok-1", &build_rowset(&rows))
            .await
            .unwrap_err();

        match err {
            RelayError::UpsertRejected { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.starts_with("<unreadable body:"), "{body}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
