//! S3 Signature Version 4 query-string presigning
//!
//! Produces path-style `PUT` URLs (`{endpoint}/{bucket}/{key}`) signed with
//! `UNSIGNED-PAYLOAD`, so the client uploads the asset body directly to the
//! bucket.

use chrono::{DateTime, Utc};
use ensayo_common::config::StorageConfig;
use ensayo_common::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Signs upload URLs for one bucket
#[derive(Debug, Clone)]
pub struct Presigner {
    scheme: String,
    host: String,
    bucket: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    expiry_secs: u64,
}

impl Presigner {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let (access_key_id, secret_access_key) = config.credentials()?;
        let (scheme, host) = split_endpoint(&config.endpoint)?;
        if config.bucket.trim().is_empty() {
            return Err(Error::Config("storage bucket must not be empty".to_string()));
        }
        Ok(Self {
            scheme,
            host,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            access_key_id,
            secret_access_key,
            expiry_secs: config.presign_expiry_secs,
        })
    }

    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// Presigned `PUT` URL for `key`, valid from `now` for the configured expiry
    pub fn presign_put(&self, key: &str, now: DateTime<Utc>) -> Result<String> {
        if key.is_empty() {
            return Err(Error::Upstream("object key must not be empty".to_string()));
        }

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let canonical_uri = format!("/{}/{}", uri_encode(&self.bucket, true), uri_encode(key, false));

        // Already in lexicographic order
        let query = [
            ("X-Amz-Algorithm", ALGORITHM.to_string()),
            (
                "X-Amz-Credential",
                format!("{}/{}", self.access_key_id, scope),
            ),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", self.expiry_secs.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", k, uri_encode(v, true)))
        .collect::<Vec<_>>()
        .join("&");

        let canonical_request = format!(
            "PUT\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            canonical_uri, query, self.host
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_access_key, &date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            self.scheme, self.host, canonical_uri, query, signature
        ))
    }
}

/// `https://host[:port][/...]` → (`https`, `host[:port]`)
fn split_endpoint(endpoint: &str) -> Result<(String, String)> {
    let (scheme, rest) = endpoint
        .split_once("://")
        .ok_or_else(|| Error::Config(format!("storage endpoint '{}' has no scheme", endpoint)))?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || !matches!(scheme, "http" | "https") {
        return Err(Error::Config(format!("invalid storage endpoint '{}'", endpoint)));
    }
    Ok((scheme.to_string(), host.to_string()))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Upstream(format!("HMAC key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the SigV4 signing key for one day, region and service
pub(crate) fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding as SigV4 requires; `/` is kept unless `encode_slash`
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
