//! Resolution of single-use signed upload URLs.

use serde::Deserialize;

use crate::config::ServiceSettings;
use crate::error::{Result, VolleyError};
use crate::http::{HttpClient, HttpRequest};

/// Service route issuing a signed upload URL for one package.
pub const UPLOAD_URL_PATH: &str = "/app-icon/generate-upload-url";

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    #[serde(rename = "uploadURL")]
    upload_url: String,
}

/// Ask the service for a URL the item's icon can be PUT to.
///
/// Returns `None` on any failure; the reason is logged here and the caller only reports that
/// no URL could be obtained.
pub async fn resolve_upload_url<H: HttpClient>(
    http_client: &H,
    settings: &ServiceSettings,
    package_name: &str,
) -> Option<String> {
    match request_upload_url(http_client, settings, package_name).await {
        Ok(url) => {
            tracing::trace!(package_name, "Resolved signed upload URL");
            Some(url)
        }
        Err(e) => {
            tracing::warn!(package_name, error = %e, "Failed to get upload URL");
            None
        }
    }
}

async fn request_upload_url<H: HttpClient>(
    http_client: &H,
    settings: &ServiceSettings,
    package_name: &str,
) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        &settings.url(UPLOAD_URL_PATH),
        &[("packageName", package_name)],
    )
    .map_err(|e| VolleyError::Other(anyhow::anyhow!("Invalid service endpoint: {}", e)))?;

    let request = HttpRequest::get(url.as_str())
        .bearer(&settings.token)
        .header("Accept", "*/*");

    let response = http_client.execute(&request).await?;
    if !response.is_success() {
        return Err(VolleyError::Other(anyhow::anyhow!(
            "HTTP {}",
            response.status
        )));
    }

    let parsed: UploadUrlResponse = serde_json::from_str(&response.body)?;
    if parsed.upload_url.is_empty() {
        return Err(VolleyError::Other(anyhow::anyhow!(
            "Response contained an empty uploadURL"
        )));
    }
    Ok(parsed.upload_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpResponse, MockHttpClient};

    fn settings() -> ServiceSettings {
        ServiceSettings {
            endpoint: "https://stats.example.com".to_string(),
            token: "test-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolves_url_from_body() {
        let mock = MockHttpClient::new();
        mock.add_response(
            "GET /app-icon/generate-upload-url",
            Ok(HttpResponse::new(
                200,
                r#"{"uploadURL":"https://storage.example.com/icons/a.png?sig=abc"}"#,
            )),
        );

        let url = resolve_upload_url(&mock, &settings(), "com.example.a").await;
        assert_eq!(
            url.as_deref(),
            Some("https://storage.example.com/icons/a.png?sig=abc")
        );

        let calls = mock.calls_for(HttpMethod::Get, UPLOAD_URL_PATH);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query.as_deref(), Some("packageName=com.example.a"));
        assert_eq!(calls[0].header("Authorization"), Some("Bearer test-token"));
    }

    #[tokio::test]
    async fn test_package_name_is_encoded() {
        let mock = MockHttpClient::new();
        mock.add_response(
            "GET /app-icon/generate-upload-url",
            Ok(HttpResponse::new(200, r#"{"uploadURL":"https://x.example.com/u"}"#)),
        );

        resolve_upload_url(&mock, &settings(), "weird name&more").await;

        let calls = mock.get_calls();
        assert_eq!(calls[0].query.as_deref(), Some("packageName=weird+name%26more"));
    }

    #[tokio::test]
    async fn test_failures_yield_none() {
        let cases = [
            Ok(HttpResponse::new(403, "forbidden")),
            Ok(HttpResponse::new(200, "not json")),
            Ok(HttpResponse::new(200, r#"{"url":"https://x.example.com/u"}"#)),
            Ok(HttpResponse::new(200, r#"{"uploadURL":42}"#)),
            Ok(HttpResponse::new(200, r#"{"uploadURL":""}"#)),
            Err(VolleyError::Other(anyhow::anyhow!("timed out"))),
        ];

        for case in cases {
            let mock = MockHttpClient::new();
            mock.add_response("GET /app-icon/generate-upload-url", case);
            assert!(
                resolve_upload_url(&mock, &settings(), "com.example.a")
                    .await
                    .is_none()
            );
        }
    }
}
