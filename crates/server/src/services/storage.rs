//! S3-compatible object storage for uploaded images.
//!
//! Requests are signed with AWS Signature Version 4 using `hmac`/`sha2`.
//! Objects are addressed virtual-hosted style on AWS
//! (`https://{bucket}.s3.{region}.amazonaws.com/{key}`) or path style when
//! a custom endpoint is configured (`{endpoint}/{bucket}/{key}`).

use chrono::{DateTime, Utc};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid object URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request signing failed")]
    Signing,
}

/// Outcome of deleting one key in a batch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteFailure {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeletedObject {
    #[serde(rename = "Key")]
    pub key: String,
}

/// Result of `delete_objects`: which keys went away and which failed.
#[derive(Debug, Default, Serialize)]
pub struct DeleteReport {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteFailure>,
}

/// Folder under `uploads/images/` that an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFolder {
    Category,
    CategoryBanner,
    ProductBanner,
    SpecialOfferBanner,
    CustomerProfile,
}

impl UploadFolder {
    const fn path(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::CategoryBanner => "category_banner",
            Self::ProductBanner => "product_banner",
            Self::SpecialOfferBanner => "special_offers_banner",
            Self::CustomerProfile => "customer/profile",
        }
    }
}

/// Object key for a new upload: `uploads/images/{folder}/{millis}_{name}`.
///
/// Path separators and control characters in the client-supplied file name
/// are replaced so the key stays inside its folder.
#[must_use]
pub fn upload_key(folder: UploadFolder, file_name: &str, now: DateTime<Utc>) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    let name = if name.trim().is_empty() { "upload".to_string() } else { name };
    format!(
        "uploads/images/{}/{}_{name}",
        folder.path(),
        now.timestamp_millis()
    )
}

#[derive(Clone)]
pub struct ObjectStorage {
    client: reqwest::Client,
    region: String,
    bucket: String,
    access_key_id: String,
    secret_access_key: SecretString,
    endpoint: Option<String>,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ObjectStorage {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &StorageConfig) -> Self {
        Self {
            client,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Public URL of `key`.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        let path = encode_key(key);
        match &self.endpoint {
            Some(endpoint) => format!("{endpoint}/{}/{path}", self.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{path}",
                self.bucket, self.region
            ),
        }
    }

    /// Upload `body` under `key` and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the upload is rejected or the store is unreachable.
    #[instrument(skip(self, body), fields(size = body.len()))]
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = self.public_url(key);
        let signed = self.sign("PUT", &url, &body, Utc::now())?;

        let response = signed
            .apply(self.client.put(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        check(response).await?;

        tracing::info!(key, "Object uploaded");
        Ok(url)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete is rejected or the store is unreachable.
    #[instrument(skip(self))]
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let url = self.public_url(key);
        let signed = self.sign("DELETE", &url, &[], Utc::now())?;

        let response = signed.apply(self.client.delete(&url)).send().await?;
        check(response).await?;

        tracing::info!(key, "Object deleted");
        Ok(())
    }

    /// Delete every key concurrently and report per-key results.
    pub async fn delete_objects(&self, keys: &[String]) -> DeleteReport {
        let results = join_all(keys.iter().map(|key| self.delete_object(key))).await;

        let mut report = DeleteReport::default();
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(()) => report.deleted.push(DeletedObject { key: key.clone() }),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Failed to delete object");
                    report.errors.push(DeleteFailure {
                        key: key.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    fn sign(
        &self,
        method: &str,
        url: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, StorageError> {
        let parsed = url::Url::parse(url)?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(StorageError::Url(url::ParseError::EmptyHost)),
        };

        let request = CanonicalRequest {
            method,
            path: parsed.path(),
            host: &host,
            payload_hash: hex::encode(Sha256::digest(payload)),
            amz_date: now.format("%Y%m%dT%H%M%SZ").to_string(),
        };
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);

        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{scope}\n{}",
            request.amz_date,
            hex::encode(Sha256::digest(request.render().as_bytes()))
        );
        let key = signing_key(
            self.secret_access_key.expose_secret(),
            &date,
            &self.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
                self.access_key_id
            ),
            amz_date: request.amz_date,
            content_sha256: request.payload_hash,
        })
    }
}

struct CanonicalRequest<'a> {
    method: &'a str,
    path: &'a str,
    host: &'a str,
    payload_hash: String,
    amz_date: String,
}

impl CanonicalRequest<'_> {
    /// The canonical request string. The path is already URI-encoded.
    fn render(&self) -> String {
        format!(
            "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{SIGNED_HEADERS}\n{}",
            self.method, self.path, self.host, self.payload_hash, self.amz_date, self.payload_hash
        )
    }
}

struct SignedHeaders {
    authorization: String,
    amz_date: String,
    content_sha256: String,
}

impl SignedHeaders {
    fn apply(self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(reqwest::header::AUTHORIZATION, self.authorization)
            .header("x-amz-date", self.amz_date)
            .header("x-amz-content-sha256", self.content_sha256)
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

/// URI-encode each segment of an object key, keeping `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| StorageError::Signing)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 signing key: `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`.
fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn storage(endpoint: Option<&str>) -> ObjectStorage {
        ObjectStorage::new(
            reqwest::Client::new(),
            &StorageConfig {
                region: "eu-west-2".to_string(),
                bucket: "nextgen-media".to_string(),
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: SecretString::from("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
                endpoint: endpoint.map(String::from),
            },
        )
    }

    #[test]
    fn test_signing_key_matches_aws_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_public_url_virtual_hosted_and_path_style() {
        assert_eq!(
            storage(None).public_url("uploads/images/category/1_a b.png"),
            "https://nextgen-media.s3.eu-west-2.amazonaws.com/uploads/images/category/1_a%20b.png"
        );
        assert_eq!(
            storage(Some("http://localhost:9001")).public_url("uploads/x.png"),
            "http://localhost:9001/nextgen-media/uploads/x.png"
        );
    }

    #[test]
    fn test_upload_key_sanitizes_file_name() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(
            upload_key(UploadFolder::CustomerProfile, "../me.png", now),
            "uploads/images/customer/profile/1700000000000_.._me.png"
        );
        assert_eq!(
            upload_key(UploadFolder::Category, "", now),
            "uploads/images/category/1700000000000_upload"
        );
    }

    #[test]
    fn test_sign_includes_scope_and_port() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let store = storage(Some("http://localhost:9001"));
        let signed = store
            .sign("PUT", &store.public_url("a.png"), b"img", now)
            .unwrap();

        assert_eq!(signed.amz_date, "20250601T120000Z");
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20250601/eu-west-2/s3/aws4_request, SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        assert_eq!(signed.content_sha256, hex::encode(Sha256::digest(b"img")));
    }

    #[test]
    fn test_canonical_request_layout() {
        let request = CanonicalRequest {
            method: "DELETE",
            path: "/bucket/a.png",
            host: "localhost:9001",
            payload_hash: "e3b0".to_string(),
            amz_date: "20250601T120000Z".to_string(),
        };
        assert_eq!(
            request.render(),
            "DELETE\n/bucket/a.png\n\nhost:localhost:9001\nx-amz-content-sha256:e3b0\nx-amz-date:20250601T120000Z\n\nhost;x-amz-content-sha256;x-amz-date\ne3b0"
        );
    }
}
