//! AK/SK request signing (`SDK-HMAC-SHA256`)
//!
//! Every FlexibleEngine API call is authenticated by signing a canonical form
//! of the request with the secret key. The signature covers the method, the
//! path, the sorted query string, a set of headers and the SHA-256 of the body.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_SDK_DATE: &str = "x-sdk-date";
pub const HEADER_SECURITY_TOKEN: &str = "x-security-token";
pub const HEADER_PROJECT_ID: &str = "x-project-id";
pub const SDK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Access key credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: &str, secret_key: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: &str) -> Self {
        self.security_token = Some(token.to_string());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("security_token", &self.security_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Sign a request.
///
/// `headers` uses lowercase names. `host` and `x-sdk-date` are inserted when
/// missing, along with `x-security-token` for temporary credentials. Returns
/// the value of the `Authorization` header.
pub fn sign(
    credentials: &Credentials,
    method: &str,
    url: &Url,
    headers: &mut BTreeMap<String, String>,
    body: &[u8],
    now: DateTime<Utc>,
) -> String {
    if !headers.contains_key("host") {
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.insert("host".to_string(), host);
        }
    }
    headers
        .entry(HEADER_SDK_DATE.to_string())
        .or_insert_with(|| now.format(SDK_DATE_FORMAT).to_string());
    if let Some(token) = &credentials.security_token {
        headers.insert(HEADER_SECURITY_TOKEN.to_string(), token.clone());
    }

    let signed_headers = signed_headers(headers);
    let canonical = canonical_request(method, url, headers, &signed_headers, body);
    let date = headers
        .get(HEADER_SDK_DATE)
        .cloned()
        .unwrap_or_default();
    let string_to_sign = string_to_sign(&canonical, &date);
    let signature = hex::encode(hmac_sha256(
        credentials.secret_key.as_bytes(),
        string_to_sign.as_bytes(),
    ));

    format!(
        "{} Access={}, SignedHeaders={}, Signature={}",
        SIGN_ALGORITHM,
        credentials.access_key,
        signed_headers.join(";"),
        signature
    )
}

fn signed_headers(headers: &BTreeMap<String, String>) -> Vec<String> {
    // BTreeMap iteration is already sorted
    headers.keys().map(|k| k.to_ascii_lowercase()).collect()
}

/// Build the canonical request string that gets hashed into the string to sign.
pub fn canonical_request(
    method: &str,
    url: &Url,
    headers: &BTreeMap<String, String>,
    signed_headers: &[String],
    body: &[u8],
) -> String {
    let canonical_headers: String = signed_headers
        .iter()
        .map(|name| {
            let value = headers.get(name).map(|v| v.trim()).unwrap_or_default();
            format!("{}:{}\n", name, value)
        })
        .collect();

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        canonical_uri(url),
        canonical_query(url),
        canonical_headers,
        signed_headers.join(";"),
        hex::encode(Sha256::digest(body))
    )
}

fn canonical_uri(url: &Url) -> String {
    let mut uri: String = url
        .path()
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/");
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn string_to_sign(canonical_request: &str, date: &str) -> String {
    format!(
        "{}\n{}\n{}",
        SIGN_ALGORITHM,
        date,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

/// HMAC-SHA256 (RFC 2104)
///
/// Infallible: HMAC pads short keys and hashes long ones, so
/// `new_from_slice` never returns `InvalidLength` for `Hmac<Sha256>`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hmac_sha256_rfc4231() {
        assert_eq!(
            hex::encode(hmac_sha256(&[0x0b; 20], b"Hi There")),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
        assert_eq!(
            hex::encode(hmac_sha256(b"Jefe", b"what do ya want for nothing?")),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert_eq!(
            hex::encode(hmac_sha256(
                &[0xaa; 131],
                b"Test Using Larger Than Block-Size Key - Hash Key First"
            )),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn test_hmac_sha256_empty_key() {
        // RFC 2104 pads an empty key with zeros
        assert_eq!(
            hex::encode(hmac_sha256(b"", b"")),
            "b613679a0814d9ec772f95d778c35fc5ff1697c493715653c6c712144292c5ad"
        );
    }

    #[test]
    fn test_canonical_request_layout() {
        let url = Url::parse(
            "https://vpc.eu-west-0.prod-cloud-ocb.orange-business.com/v1/p1/vpcs?limit=10&marker=a b",
        )
        .unwrap();
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert(
            "host".to_string(),
            "vpc.eu-west-0.prod-cloud-ocb.orange-business.com".to_string(),
        );
        headers.insert(HEADER_SDK_DATE.to_string(), "20240102T030405Z".to_string());
        let signed = signed_headers(&headers);

        let canonical = canonical_request("get", &url, &headers, &signed, b"");
        let expected = "GET\n\
            /v1/p1/vpcs/\n\
            limit=10&marker=a%20b\n\
            content-type:application/json\n\
            host:vpc.eu-west-0.prod-cloud-ocb.orange-business.com\n\
            x-sdk-date:20240102T030405Z\n\
            \n\
            content-type;host;x-sdk-date\n\
            e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(canonical, expected);
    }

    #[test]
    fn test_sign_inserts_headers() {
        let url = Url::parse("http://127.0.0.1:8080/v2.0/security-groups").unwrap();
        let creds = Credentials::new("AK", "SK").with_security_token("tok");
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut headers = BTreeMap::new();

        let auth = sign(&creds, "POST", &url, &mut headers, b"{}", now);

        assert_eq!(headers.get("host").map(String::as_str), Some("127.0.0.1:8080"));
        assert_eq!(
            headers.get(HEADER_SDK_DATE).map(String::as_str),
            Some("20240102T030405Z")
        );
        assert_eq!(headers.get(HEADER_SECURITY_TOKEN).map(String::as_str), Some("tok"));
        assert!(auth.starts_with(
            "SDK-HMAC-SHA256 Access=AK, SignedHeaders=host;x-sdk-date;x-security-token, Signature="
        ));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signature_is_deterministic() {
        let url = Url::parse("https://rds.eu-west-0.example.com/v3/p1/instances?id=x").unwrap();
        let creds = Credentials::new("AK", "SK");
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let first = sign(&creds, "GET", &url, &mut BTreeMap::new(), b"", now);
        let second = sign(&creds, "GET", &url, &mut BTreeMap::new(), b"", now);
        let other_key = sign(
            &Credentials::new("AK", "other"),
            "GET",
            &url,
            &mut BTreeMap::new(),
            b"",
            now,
        );

        assert_eq!(first, second);
        assert_ne!(first, other_key);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("AK", "super-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AK"));
        assert!(!debug.contains("super-secret"));
    }
}
