use std::collections::HashSet;

use reqwest::Client;

use crate::errors::{LauncherError, Result};
use crate::models::ApplicationRecord;

const FIELD_SEPARATOR: char = ';';

/// Parses a `name;download_url;info_url[;icon_url]` manifest.
///
/// Lines with fewer than three fields, an empty name or a download URL that is not
/// http(s) are skipped silently, as are
/// repeats of a name already seen (the first occurrence wins).
pub fn parse_catalog(raw: &str) -> Vec<ApplicationRecord> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for line in raw.lines() {
        let Some(record) = parse_line(line) else {
            continue;
        };
        if seen.insert(record.name.clone()) {
            records.push(record);
        } else {
            tracing::debug!("duplicate catalog entry ignored name={}", record.name);
        }
    }
    records
}

fn parse_line(line: &str) -> Option<ApplicationRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() < 3 || fields[0].is_empty() || !is_http_url(fields[1]) {
        return None;
    }
    Some(ApplicationRecord {
        name: fields[0].to_string(),
        download_url: fields[1].to_string(),
        info_url: optional_field(fields.get(2)),
        icon_url: optional_field(fields.get(3)),
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn optional_field(field: Option<&&str>) -> Option<String> {
    field
        .map(|value| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Merges parsed manifests in source order; earlier sources win name collisions.
pub fn merge_catalogs<I>(sources: I) -> Vec<ApplicationRecord>
where
    I: IntoIterator<Item = Vec<ApplicationRecord>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for source in sources {
        for record in source {
            if seen.insert(record.name.clone()) {
                merged.push(record);
            }
        }
    }
    merged
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    records: Vec<ApplicationRecord>,
}

impl Catalog {
    pub fn new(records: Vec<ApplicationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn find(&self, name: &str) -> Option<&ApplicationRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|record| record.name.as_str()).collect()
    }
}

#[derive(Clone)]
pub struct CatalogService {
    client: Client,
    sources: Vec<String>,
}

impl CatalogService {
    pub fn with_client(client: Client, sources: Vec<String>) -> Self {
        Self { client, sources }
    }

    pub async fn fetch_manifest(&self, url: &str) -> Result<Vec<ApplicationRecord>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| fetch_error(url, err.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(
                url,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|err| fetch_error(url, err.to_string()))?;
        Ok(parse_catalog(&body))
    }

    /// Fetches every configured manifest. Unreachable sources are skipped; only when
    /// all of them fail does the load fail.
    pub async fn load(&self) -> Result<Catalog> {
        if self.sources.is_empty() {
            return Err(LauncherError::Fetch {
                url: String::new(),
                reason: "no library sources configured".to_string(),
            });
        }

        let mut loaded = Vec::new();
        let mut last_error = None;
        for url in &self.sources {
            match self.fetch_manifest(url).await {
                Ok(records) => {
                    tracing::info!("catalog source loaded url={} entries={}", url, records.len());
                    loaded.push(records);
                }
                Err(err) => {
                    tracing::warn!("catalog source skipped url={}: {}", url, err);
                    last_error = Some(err);
                }
            }
        }

        if loaded.is_empty() {
            return Err(last_error.unwrap_or_else(|| LauncherError::Fetch {
                url: String::new(),
                reason: "no library sources reachable".to_string(),
            }));
        }
        Ok(Catalog::new(merge_catalogs(loaded)))
    }
}

fn fetch_error(url: &str, reason: String) -> LauncherError {
    LauncherError::Fetch {
        url: url.to_string(),
        reason,
    }
}
