//! Test doubles shared by the integration tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use refdata_ingest::ingest::{IngestConfig, IngestExecutor, RetryPolicy};
use refdata_ingest::provider::{Provider, ProviderError, ProviderResult};
use refdata_ingest::store::sqlite::SqliteStore;
use refdata_ingest::{CallParams, RowSet, Value};

/// One recorded provider call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_name: String,
    pub params: CallParams,
    pub at: Instant,
}

/// Provider answering from per-API scripts
///
/// Each API has a queue of responses; once a queue is down to its last
/// response, that response repeats forever.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<ProviderResult<RowSet>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for `api_name`
    pub fn script(self, api_name: &str, responses: Vec<ProviderResult<RowSet>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(api_name.to_string(), responses.into());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, api_name: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.api_name == api_name)
            .collect()
    }
}

fn replay(response: &ProviderResult<RowSet>) -> ProviderResult<RowSet> {
    match response {
        Ok(rows) => Ok(rows.clone()),
        Err(err) => Err(ProviderError::Other(err.to_string())),
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn query(&self, api_name: &str, params: &CallParams) -> ProviderResult<RowSet> {
        self.calls.lock().unwrap().push(RecordedCall {
            api_name: api_name.to_string(),
            params: params.clone(),
            at: Instant::now(),
        });

        let mut scripts = self.scripts.lock().unwrap();
        let queue = match scripts.get_mut(api_name) {
            Some(queue) if !queue.is_empty() => queue,
            _ => return Err(ProviderError::Other(format!("no script for {api_name}"))),
        };

        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            replay(&queue[0])
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn transient(message: &str) -> ProviderResult<RowSet> {
    Err(ProviderError::Network {
        kind: refdata_ingest::provider::FailureKind::NetworkTimeout,
        message: message.to_string(),
    })
}

/// `daily` rows for one security on the given dates
pub fn daily_rows(dates: &[&str]) -> RowSet {
    RowSet::new(
        vec!["ts_code".into(), "trade_date".into(), "close".into()],
        dates
            .iter()
            .map(|d| vec![Value::from("000001.SZ"), Value::from(*d), Value::Real(10.0)])
            .collect(),
    )
    .unwrap()
}

pub fn empty_daily() -> RowSet {
    RowSet::empty(vec!["ts_code".into(), "trade_date".into(), "close".into()])
}

/// `trade_cal` rows for SSE on the given dates
pub fn calendar_rows(dates: &[&str]) -> RowSet {
    RowSet::new(
        vec!["exchange".into(), "cal_date".into(), "is_open".into()],
        dates
            .iter()
            .map(|d| vec![Value::from("SSE"), Value::from(*d), Value::Integer(1)])
            .collect(),
    )
    .unwrap()
}

pub fn stock_rows() -> RowSet {
    RowSet::new(
        vec!["ts_code".into(), "name".into(), "list_date".into()],
        vec![
            vec!["000001.SZ".into(), "Ping An Bank".into(), "19910403".into()],
            vec!["600000.SH".into(), "SPD Bank".into(), "19991110".into()],
        ],
    )
    .unwrap()
}

pub fn config(max_attempts: u32, base_backoff: Duration) -> IngestConfig {
    IngestConfig {
        retry: RetryPolicy {
            max_attempts,
            base_backoff,
        },
        ..IngestConfig::default()
    }
}

pub fn executor(
    store: &Arc<SqliteStore>,
    provider: &Arc<ScriptedProvider>,
    config: IngestConfig,
) -> IngestExecutor {
    IngestExecutor::new(store.clone(), provider.clone(), config).unwrap()
}
