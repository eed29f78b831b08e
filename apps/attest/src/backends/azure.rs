//! # Azure Blob Storage Backend
//!
//! A `PolicyStore` over the Blob service REST API, authenticated with
//! Shared Key signing.
//!
//! ## Connection Strings
//!
//! Accepts the standard `Key=Value;...` form:
//! - `DefaultEndpointsProtocol`, `AccountName`, `AccountKey`, `EndpointSuffix`
//! - `BlobEndpoint` (overrides the derived endpoint)
//! - `UseDevelopmentStorage=true` (local emulator with the well-known account)

use super::block_on;
use attest_core::{AttestError, PolicyInfo, PolicyName, PolicyStore, validate_content};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
const API_VERSION: &str = "2021-08-06";

const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

fn storage_err(e: impl std::fmt::Display) -> AttestError {
    AttestError::Storage(e.to_string())
}

// =============================================================================
// CONNECTION STRING
// =============================================================================

/// Parsed account credentials and blob endpoint.
#[derive(Clone)]
pub struct ConnectionString {
    pub account_name: String,
    account_key: Vec<u8>,
    pub blob_endpoint: Url,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    /// Parse a `Key=Value;...` connection string.
    pub fn parse(raw: &str) -> Result<Self, AttestError> {
        let fields: BTreeMap<&str, &str> = raw
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let config_err = |msg: &str| AttestError::Config(format!("connection string: {}", msg));

        if fields
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::from_parts(DEV_ACCOUNT, DEV_KEY, DEV_BLOB_ENDPOINT);
        }

        let account = fields
            .get("AccountName")
            .copied()
            .ok_or_else(|| config_err("missing AccountName"))?;
        let key = fields
            .get("AccountKey")
            .copied()
            .ok_or_else(|| config_err("missing AccountKey"))?;

        let endpoint = match fields.get("BlobEndpoint") {
            Some(endpoint) => (*endpoint).to_string(),
            None => {
                let protocol = fields.get("DefaultEndpointsProtocol").copied().unwrap_or("https");
                let suffix = fields.get("EndpointSuffix").copied().unwrap_or("core.windows.net");
                format!("{}://{}.blob.{}", protocol, account, suffix)
            }
        };
        Self::from_parts(account, key, &endpoint)
    }

    fn from_parts(account: &str, key: &str, endpoint: &str) -> Result<Self, AttestError> {
        let account_key = BASE64
            .decode(key)
            .map_err(|e| AttestError::Config(format!("connection string: AccountKey: {}", e)))?;
        let blob_endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| AttestError::Config(format!("connection string: endpoint: {}", e)))?;
        if blob_endpoint.cannot_be_a_base() {
            return Err(AttestError::Config(format!(
                "connection string: endpoint '{}' is not a base URL",
                endpoint
            )));
        }
        Ok(Self {
            account_name: account.to_string(),
            account_key,
            blob_endpoint,
        })
    }
}

// =============================================================================
// SHARED KEY SIGNING
// =============================================================================

/// The Shared Key string-to-sign for a Blob service request.
///
/// `ms_headers` holds the `x-ms-*` headers, lowercase, and is sorted by name.
pub fn string_to_sign(
    method: &Method,
    content_length: usize,
    content_type: &str,
    ms_headers: &BTreeMap<String, String>,
    account: &str,
    url: &Url,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut out = String::new();
    out.push_str(method.as_str());
    out.push('\n');
    // Content-Encoding, Content-Language
    out.push_str("\n\n");
    out.push_str(&length);
    out.push('\n');
    // Content-MD5
    out.push('\n');
    out.push_str(content_type);
    out.push('\n');
    // Date, If-Modified-Since, If-Match, If-None-Match, If-Unmodified-Since, Range
    out.push_str("\n\n\n\n\n\n");

    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name, value.trim()));
    }

    out.push('/');
    out.push_str(account);
    out.push_str(url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{}:{}", name, values.join(",")));
    }
    out
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the decoded account key.
pub fn sign(key: &[u8], string_to_sign: &str) -> Result<String, AttestError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(storage_err)?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// =============================================================================
// LISTING XML
// =============================================================================

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Contents of every `<tag>...</tag>` in `xml`, in document order.
fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut found = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let body = &rest[start + open.len()..];
        let Some(end) = body.find(&close) else { break };
        found.push(&body[..end]);
        rest = &body[end + close.len()..];
    }
    found
}

fn element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    elements(xml, tag).into_iter().next()
}

/// One page of a List Blobs response.
#[derive(Debug, PartialEq, Eq)]
pub struct ListPage {
    pub blobs: Vec<PolicyInfo>,
    pub next_marker: Option<String>,
}

/// Parse a List Blobs response body.
///
/// Entries without a plain `<Name>` (Azure sends `<Name Encoded="true">` for
/// names with XML-invalid characters) are skipped; no valid policy name
/// contains such characters.
pub fn parse_list_page(xml: &str) -> Result<ListPage, AttestError> {
    let mut blobs = Vec::new();
    for blob in elements(xml, "Blob") {
        let Some(name) = element(blob, "Name").map(unescape) else {
            tracing::warn!(event = "blob_skipped", "Skipping blob listed with an encoded name");
            continue;
        };
        let modified = element(blob, "Last-Modified")
            .ok_or_else(|| storage_err(format!("blob '{}' without Last-Modified", name)))?;
        let last_modified = DateTime::parse_from_rfc2822(modified)
            .map_err(|e| storage_err(format!("Last-Modified '{}': {}", modified, e)))?
            .with_timezone(&Utc);
        blobs.push(PolicyInfo {
            name,
            last_modified,
        });
    }
    let next_marker = element(xml, "NextMarker")
        .map(unescape)
        .filter(|m| !m.is_empty());
    Ok(ListPage { blobs, next_marker })
}

// =============================================================================
// STORE
// =============================================================================

/// One container of an Azure storage account.
#[derive(Debug)]
pub struct AzureBlobStore {
    http: reqwest::Client,
    conn: ConnectionString,
    container: String,
}

impl AzureBlobStore {
    pub fn new(conn: ConnectionString, container: &str) -> Result<Self, AttestError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(storage_err)?;
        Ok(Self {
            http,
            conn,
            container: container.to_string(),
        })
    }

    fn url(&self, blob: Option<&PolicyName>) -> Result<Url, AttestError> {
        let mut url = self.conn.blob_endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| storage_err("blob endpoint is not a base URL"))?;
            segments.pop_if_empty().push(&self.container);
            if let Some(name) = blob {
                segments.push(name.as_str());
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<reqwest::Response, AttestError> {
        let mut ms_headers = BTreeMap::new();
        ms_headers.insert(
            "x-ms-date".to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        ms_headers.insert("x-ms-version".to_string(), API_VERSION.to_string());

        let (length, content_type) = match &body {
            Some(text) => {
                ms_headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
                (text.len(), "text/plain; charset=utf-8")
            }
            None => (0, ""),
        };

        let to_sign = string_to_sign(
            &method,
            length,
            content_type,
            &ms_headers,
            &self.conn.account_name,
            &url,
        );
        let signature = sign(&self.conn.account_key, &to_sign)?;

        let mut request = self.http.request(method.clone(), url).header(
            reqwest::header::AUTHORIZATION,
            format!("SharedKey {}:{}", self.conn.account_name, signature),
        );
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(text) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(text);
        }

        request
            .send()
            .await
            .map_err(|e| storage_err(format!("{} request failed: {}", method, e)))
    }

    /// Turn a non-success response into an error naming the service's code.
    async fn failure(method: &Method, response: reqwest::Response) -> AttestError {
        let status = response.status();
        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let detail = match code {
            Some(code) => code,
            None => response.text().await.unwrap_or_default(),
        };
        storage_err(format!("{} returned {}: {}", method, status, detail.trim()))
    }

    async fn list_async(&self) -> Result<Vec<PolicyInfo>, AttestError> {
        let mut listing = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = self.url(None)?;
            url.query_pairs_mut()
                .append_pair("restype", "container")
                .append_pair("comp", "list");
            if let Some(m) = &marker {
                url.query_pairs_mut().append_pair("marker", m);
            }

            let response = self.send(Method::GET, url, None).await?;
            if !response.status().is_success() {
                return Err(Self::failure(&Method::GET, response).await);
            }
            let xml = response.text().await.map_err(storage_err)?;
            let page = parse_list_page(&xml)?;
            listing.extend(page.blobs);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    async fn upload_async(&self, name: &PolicyName, content: &str) -> Result<(), AttestError> {
        let response = self
            .send(Method::PUT, self.url(Some(name))?, Some(content.to_string()))
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(&Method::PUT, response).await);
        }
        Ok(())
    }

    async fn download_async(&self, name: &PolicyName) -> Result<String, AttestError> {
        let response = self.send(Method::GET, self.url(Some(name))?, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(AttestError::PolicyNotFound(name.to_string())),
            status if status.is_success() => response.text().await.map_err(storage_err),
            _ => Err(Self::failure(&Method::GET, response).await),
        }
    }

    async fn delete_async(&self, name: &PolicyName) -> Result<(), AttestError> {
        let response = self.send(Method::DELETE, self.url(Some(name))?, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(AttestError::PolicyNotFound(name.to_string())),
            status if status.is_success() => Ok(()),
            _ => Err(Self::failure(&Method::DELETE, response).await),
        }
    }

    async fn exists_async(&self, name: &PolicyName) -> Result<bool, AttestError> {
        let response = self.send(Method::HEAD, self.url(Some(name))?, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::failure(&Method::HEAD, response).await),
        }
    }
}

impl PolicyStore for AzureBlobStore {
    fn backend(&self) -> &'static str {
        "azure"
    }

    fn list(&self) -> Result<Vec<PolicyInfo>, AttestError> {
        block_on(self.list_async(), AttestError::Storage)?
    }

    fn upload(&self, name: &PolicyName, content: &str) -> Result<(), AttestError> {
        validate_content(content)?;
        block_on(self.upload_async(name, content), AttestError::Storage)?
    }

    fn download(&self, name: &PolicyName) -> Result<String, AttestError> {
        block_on(self.download_async(name), AttestError::Storage)?
    }

    fn delete(&self, name: &PolicyName) -> Result<(), AttestError> {
        block_on(self.delete_async(name), AttestError::Storage)?
    }

    fn exists(&self, name: &PolicyName) -> Result<bool, AttestError> {
        block_on(self.exists_async(name), AttestError::Storage)?
    }
}

// =============================================================================
// TESTS
// =============================================================================
