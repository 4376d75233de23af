use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use jitsugraph_core::{
    JitsuGraphError, ReferenceDoc, ReferenceRetriever, Result, Tag, Technique, TechniqueSource,
    UsageLedger, Video, VideoSource,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Feature key under which pipeline runs are counted and limited.
pub const SOLVE_FEATURE: &str = "solve";

/// Configuration for the Supabase-backed store.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("SUPABASE_URL").unwrap_or_default(),
            service_key: std::env::var("SUPABASE_KEY").unwrap_or_default(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchEmbeddingsParams<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    name: String,
    content: String,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TechniqueRow {
    id: i64,
    name: String,
    description: String,
    #[serde(default)]
    category_id: Option<i64>,
    #[serde(default)]
    tags: Vec<TagRow>,
}

#[derive(Debug, Deserialize)]
struct TagRow {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsageRow {
    #[allow(dead_code)]
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RateRow {
    limit_rate: u64,
    #[serde(default)]
    expires_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct NewUsageRow<'a> {
    user_id: Uuid,
    feature: &'a str,
    used_at: chrono::DateTime<Utc>,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VideoRow {
    id: String,
    title: String,
    description: String,
    uploaded_at: String,
}

/// PostgREST client over the Supabase tables the pipeline consumes:
/// `embeddings` (via the `match_embeddings` RPC), `techniques`, `usage`,
/// `rates`, and `videos`.
pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.is_empty() || config.service_key.is_empty() {
            return Err(JitsuGraphError::Configuration(
                "Supabase URL and key are required. Set SUPABASE_URL and SUPABASE_KEY.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("JitsuGraph/0.1")
            .build()
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SupabaseConfig::default())
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn get_rows<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.rest_url(path))
            .query(query)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JitsuGraphError::Network(format!(
                "Supabase error ({}) on {}: {}",
                status, path, body
            )));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| JitsuGraphError::Network(format!("malformed Supabase response: {}", e)))
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.rest_url(path))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .json(body)
            .send()
            .await
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JitsuGraphError::Network(format!(
                "Supabase error ({}) on {}: {}",
                status, path, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| JitsuGraphError::Network(format!("malformed Supabase response: {}", e)))
    }

    /// Start of the current calendar month, the usage accounting period.
    fn period_start() -> chrono::DateTime<Utc> {
        let now = Utc::now();
        Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now)
    }
}

#[async_trait]
impl ReferenceRetriever for SupabaseStore {
    async fn similarity_search(
        &self,
        vector: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<ReferenceDoc>> {
        let params = MatchEmbeddingsParams {
            query_embedding: vector,
            match_threshold: threshold,
            match_count: top_k,
        };
        let rows: Vec<EmbeddingRow> = self.post_json("rpc/match_embeddings", &params).await?;
        debug!(matches = rows.len(), threshold, top_k, "similarity search");
        Ok(rows
            .into_iter()
            .map(|row| ReferenceDoc {
                name: row.name,
                content: row.content,
                video_id: row.video_id,
            })
            .collect())
    }
}

#[async_trait]
impl TechniqueSource for SupabaseStore {
    async fn load_techniques(&self) -> Result<Vec<Technique>> {
        let rows: Vec<TechniqueRow> = self
            .get_rows(
                "techniques",
                &[(
                    "select",
                    "id,name,description,category_id,tags(id,name)".to_string(),
                )],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Technique {
                id: row.id,
                name: row.name,
                description: row.description,
                category_id: row.category_id,
                tags: row
                    .tags
                    .into_iter()
                    .map(|t| Tag {
                        id: t.id,
                        name: t.name,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl UsageLedger for SupabaseStore {
    async fn usage_count(&self, user: Uuid) -> Result<u64> {
        let rows: Vec<UsageRow> = self
            .get_rows(
                "usage",
                &[
                    ("select", "id".to_string()),
                    ("user_id", format!("eq.{}", user)),
                    ("feature", format!("eq.{}", SOLVE_FEATURE)),
                    (
                        "used_at",
                        format!("gte.{}", Self::period_start().to_rfc3339()),
                    ),
                ],
            )
            .await?;
        Ok(rows.len() as u64)
    }

    async fn limit_rate(&self, user: Uuid) -> Result<u64> {
        let rows: Vec<RateRow> = self
            .get_rows(
                "rates",
                &[
                    ("select", "limit_rate,expires_at".to_string()),
                    ("user_id", format!("eq.{}", user)),
                    ("feature", format!("eq.{}", SOLVE_FEATURE)),
                    ("order", "effective_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        // No configured limit, or an expired one, means deny by default.
        Ok(match rows.into_iter().next() {
            Some(row) => match row.expires_at {
                Some(expires) if expires <= Utc::now() => 0,
                _ => row.limit_rate,
            },
            None => 0,
        })
    }

    async fn record_use(&self, user: Uuid, metadata: serde_json::Value) -> Result<()> {
        let row = NewUsageRow {
            user_id: user,
            feature: SOLVE_FEATURE,
            used_at: Utc::now(),
            metadata,
        };

        let response = self
            .client
            .post(self.rest_url("usage"))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| JitsuGraphError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JitsuGraphError::Network(format!(
                "Supabase error ({}) inserting usage record: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoSource for SupabaseStore {
    async fn video_info(&self, id: &str) -> Result<Option<Video>> {
        let rows: Vec<VideoRow> = self
            .get_rows(
                "videos",
                &[
                    ("select", "id,title,description,uploaded_at".to_string()),
                    ("id", format!("eq.{}", id)),
                ],
            )
            .await?;

        Ok(rows.into_iter().next().map(|row| Video {
            id: row.id,
            title: row.title,
            description: row.description,
            uploaded_at: row.uploaded_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn missing_credentials_is_a_configuration_error() {
        let config = SupabaseConfig {
            url: String::new(),
            service_key: String::new(),
            timeout: Duration::from_secs(1),
        };
        let err = SupabaseStore::new(config).err().unwrap();
        assert!(matches!(err, JitsuGraphError::Configuration(_)));
    }

    #[test]
    fn technique_rows_parse_with_embedded_tags() {
        let raw = r#"[{
            "id": 9,
            "name": "Shrimp",
            "description": "Hip escape",
            "category_id": 2,
            "tags": [{"id": 1, "name": "escape"}, {"id": 4, "name": "bottom"}]
        }]"#;
        let rows: Vec<TechniqueRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].tags.len(), 2);
        assert_eq!(rows[0].category_id, Some(2));
    }

    #[test]
    fn embedding_rows_tolerate_missing_video_id() {
        let raw = r#"[{"name": "Knee cut details", "content": "Drive the knee across..."}]"#;
        let rows: Vec<EmbeddingRow> = serde_json::from_str(raw).unwrap();
        assert!(rows[0].video_id.is_none());
    }

    #[test]
    fn rate_rows_parse_expiry() {
        let raw = r#"[{"limit_rate": 25, "expires_at": "2026-01-01T00:00:00Z"}]"#;
        let rows: Vec<RateRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].limit_rate, 25);
        assert!(rows[0].expires_at.is_some());
    }

    #[test]
    fn period_start_is_first_of_month() {
        let start = SupabaseStore::period_start();
        assert_eq!(start.day(), 1);
        assert_eq!(start.hour(), 0);
    }
}
