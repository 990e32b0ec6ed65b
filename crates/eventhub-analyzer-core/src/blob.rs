//! Minimal Azure Blob Storage client: list a container's blobs with metadata.
//!
//! Supports the three connection string flavours the checkpoint store is
//! usually configured with:
//! - `AccountName=...;AccountKey=...` (Shared Key signing)
//! - `BlobEndpoint=...;SharedAccessSignature=...` (SAS token appended to the query)
//! - `UseDevelopmentStorage=true` (local storage emulator)

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::debug;
use reqwest::Url;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AnalyzerError, Result};
use crate::records::{ListedBlob, RecordSource};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2021-08-06";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Connection strings
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    SharedKey { account: String, key: Vec<u8> },
    /// SAS token without the leading `?`.
    Sas(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Self::Sas(_) => f.debug_tuple("Sas").field(&"<redacted>").finish(),
        }
    }
}

/// Blob endpoint and credentials parsed from a storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub blob_endpoint: Url,
    pub credentials: Credentials,
}

fn conn_err(reason: impl Into<String>) -> AnalyzerError {
    AnalyzerError::ConnectionString(reason.into())
}

impl StorageAccount {
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let mut settings: HashMap<String, String> = HashMap::new();
        for part in connection_string
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| conn_err(format!("'{part}' is not a key=value pair")))?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let account = settings.get("accountname");
        let endpoint = match (settings.get("blobendpoint"), account) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Some(account)) => {
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map_or("https", String::as_str);
                let suffix = settings
                    .get("endpointsuffix")
                    .map_or("core.windows.net", String::as_str);
                format!("{protocol}://{account}.blob.{suffix}")
            }
            (None, None) => return Err(conn_err("missing AccountName or BlobEndpoint")),
        };
        let blob_endpoint = Url::parse(&endpoint)
            .map_err(|e| conn_err(format!("invalid blob endpoint '{endpoint}': {e}")))?;

        let credentials = if let Some(sas) = settings.get("sharedaccesssignature") {
            Credentials::Sas(sas.trim_start_matches('?').to_string())
        } else {
            match (account, settings.get("accountkey")) {
                (Some(account), Some(key)) => Credentials::SharedKey {
                    account: account.clone(),
                    key: BASE64
                        .decode(key)
                        .map_err(|e| conn_err(format!("AccountKey is not valid base64: {e}")))?,
                },
                _ => {
                    return Err(conn_err(
                        "expected AccountName and AccountKey, or SharedAccessSignature",
                    ));
                }
            }
        };

        Ok(Self {
            blob_endpoint,
            credentials,
        })
    }

    /// The well-known local storage emulator account.
    pub fn development() -> Result<Self> {
        Ok(Self {
            blob_endpoint: Url::parse(DEV_BLOB_ENDPOINT)
                .map_err(|e| conn_err(format!("invalid emulator endpoint: {e}")))?,
            credentials: Credentials::SharedKey {
                account: DEV_ACCOUNT.to_string(),
                key: BASE64
                    .decode(DEV_ACCOUNT_KEY)
                    .map_err(|e| conn_err(format!("invalid emulator key: {e}")))?,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Shared Key signing
// ---------------------------------------------------------------------------

/// `/{account}{path}` followed by one `\nname:value` line per query parameter,
/// sorted by name.
fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    params.sort();

    let mut resource = format!("/{account}{}", url.path());
    for (name, value) in params {
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&value);
    }
    resource
}

/// String-to-sign for a body-less request: the verb, eleven empty standard
/// headers, the sorted `x-ms-*` headers, then the canonicalized resource.
fn string_to_sign(verb: &str, ms_headers: &[(&str, String)], resource: &str) -> String {
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim()))
        .collect();
    headers.sort();

    let mut out = String::from(verb);
    out.push('\n');
    out.push_str(&"\n".repeat(11));
    for (name, value) in headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(resource);
    out
}

fn sign(key: &[u8], string_to_sign: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| conn_err(format!("HMAC key error: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// List Blobs response
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobItem {
    name: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// One decoded page: its blobs and the continuation marker, if any.
fn parse_list_page(body: &str) -> Result<(Vec<ListedBlob>, Option<String>)> {
    let body = body.trim_start_matches('\u{feff}');
    let results: EnumerationResults = quick_xml::de::from_str(body)?;

    let blobs = results
        .blobs
        .items
        .into_iter()
        .map(|item| ListedBlob {
            name: item.name,
            metadata: item
                .metadata
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        })
        .collect();
    let marker = results
        .next_marker
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    Ok((blobs, marker))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lists the blobs of one container. Implements [`RecordSource`].
pub struct BlobContainerClient {
    http: HttpClient,
    account: StorageAccount,
    container: String,
}

impl BlobContainerClient {
    pub fn new(account: StorageAccount, container: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            account,
            container: container.to_string(),
        })
    }

    pub fn from_connection_string(
        connection_string: &str,
        container: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::new(
            StorageAccount::from_connection_string(connection_string)?,
            container,
            timeout,
        )
    }

    fn list_url(&self, marker: Option<&str>) -> Result<Url> {
        let mut url = self.account.blob_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| conn_err("blob endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(&self.container);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("include", "metadata");
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        if let Credentials::Sas(sas) = &self.account.credentials {
            let query = format!("{}&{sas}", url.query().unwrap_or_default());
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    fn list_page(&self, marker: Option<&str>) -> Result<(Vec<ListedBlob>, Option<String>)> {
        let url = self.list_url(marker)?;
        let ms_headers = [
            (
                "x-ms-date",
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
            ("x-ms-version", API_VERSION.to_string()),
        ];

        let mut request = self.http.get(url.clone());
        for (name, value) in &ms_headers {
            request = request.header(*name, value);
        }
        if let Credentials::SharedKey { account, key } = &self.account.credentials {
            let resource = canonicalized_resource(account, &url);
            let signature = sign(key, &string_to_sign("GET", &ms_headers, &resource))?;
            request = request.header("Authorization", format!("SharedKey {account}:{signature}"));
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(AnalyzerError::BlobService {
                status: status.as_u16(),
                body,
            });
        }
        parse_list_page(&body)
    }
}

/// Follow `NextMarker` from the first page until a page carries none.
/// Returns the concatenated blobs and the number of pages fetched.
fn collect_pages<F>(mut fetch: F) -> Result<(Vec<ListedBlob>, usize)>
where
    F: FnMut(Option<&str>) -> Result<(Vec<ListedBlob>, Option<String>)>,
{
    let mut blobs = Vec::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;
    loop {
        let (page, next) = fetch(marker.as_deref())?;
        pages += 1;
        blobs.extend(page);
        match next {
            Some(m) => marker = Some(m),
            None => break,
        }
    }
    Ok((blobs, pages))
}

impl RecordSource for BlobContainerClient {
    fn list_blobs(&self) -> Result<Vec<ListedBlob>> {
        let (blobs, pages) = collect_pages(|marker| self.list_page(marker))?;
        debug!(
            "listed {} blob(s) from container '{}' in {pages} page(s)",
            blobs.len(),
            self.container
        );
        Ok(blobs)
    }
}
