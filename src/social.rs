//! Social-media post cleaning: text, hashtags, engagement and spam filtering.

use std::collections::HashSet;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::impute::{impute, ImputeStrategy};
use crate::stats;
use crate::table::{
    coerce_numeric, format_float, format_timestamp, is_coercion_failure, parse_timestamp_column,
    CsvTable, TableError,
};
use crate::text::{clean_text, english_stopwords, extract_hashtags, is_spam, remove_stopwords};

pub const SOCIAL_OUTPUT_COLUMNS: [&str; 13] = [
    "post_id",
    "user",
    "post_text",
    "hashtags",
    "likes",
    "shares",
    "engagement_score",
    "engagement_rate",
    "timestamp",
    "date",
    "hour",
    "weekday",
    "day_of_week",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialConfig {
    pub id_column: String,
    pub user_column: String,
    pub text_column: String,
    pub likes_column: String,
    pub shares_column: String,
    pub timestamp_column: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            id_column: "post_id".to_string(),
            user_column: "user".to_string(),
            text_column: "post_text".to_string(),
            likes_column: "likes".to_string(),
            shares_column: "shares".to_string(),
            timestamp_column: "timestamp".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SocialError {
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialReport {
    pub original_rows: u64,
    pub duplicates_removed: u64,
    pub spam_removed: u64,
    pub final_rows: u64,
    /// Percentage of original rows kept, `0.0` for an empty input.
    pub retention_rate: f64,
    pub likes_median: Option<f64>,
    pub shares_median: Option<f64>,
    pub coerced_cells: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocialCleanOutput {
    pub table: CsvTable,
    pub report: SocialReport,
}

struct Post {
    source_row: usize,
    text: Option<String>,
    cleaned: Option<String>,
    hashtags: String,
}

pub fn engagement_score(likes: f64, shares: f64) -> f64 {
    likes + 2.0 * shares
}

pub fn engagement_rate(likes: f64, shares: f64) -> f64 {
    shares / (likes + 1.0)
}

pub fn clean_social_posts(
    table: &CsvTable,
    config: &SocialConfig,
) -> Result<SocialCleanOutput, SocialError> {
    let id_idx = table.require_column(&config.id_column)?;
    let user_idx = table.require_column(&config.user_column)?;
    let text_idx = table.require_column(&config.text_column)?;
    let likes_idx = table.require_column(&config.likes_column)?;
    let shares_idx = table.require_column(&config.shares_column)?;
    let timestamps = parse_timestamp_column(table, &config.timestamp_column)?;

    info!(
        component = "social",
        event = "social.start",
        rows = table.len()
    );

    let stopwords = english_stopwords();
    let posts: Vec<Post> = (0..table.len())
        .map(|row| {
            let raw = table.cell(row, text_idx);
            let text = (!raw.is_empty()).then(|| raw.to_string());
            let cleaned = text
                .as_deref()
                .map(|t| remove_stopwords(&clean_text(t), stopwords));
            let hashtags = text.as_deref().map(extract_hashtags).unwrap_or_default();
            Post {
                source_row: row,
                text,
                cleaned,
                hashtags,
            }
        })
        .collect();

    let mut coerced_cells = 0;
    let mut likes = numeric_column(table, likes_idx, &config.likes_column, &mut coerced_cells);
    let mut shares = numeric_column(table, shares_idx, &config.shares_column, &mut coerced_cells);
    impute(&mut likes, &[ImputeStrategy::Median]);
    impute(&mut shares, &[ImputeStrategy::Median]);
    let likes_median = stats::median(&stats::present(&likes));
    let shares_median = stats::median(&stats::present(&shares));

    let mut seen: HashSet<Option<&str>> = HashSet::new();
    let unique: Vec<&Post> = posts
        .iter()
        .filter(|post| seen.insert(post.cleaned.as_deref()))
        .collect();
    let duplicates_removed = (posts.len() - unique.len()) as u64;
    info!(
        component = "social",
        event = "social.dedup",
        before = posts.len(),
        removed = duplicates_removed
    );

    let kept: Vec<&Post> = unique
        .into_iter()
        .filter(|post| !is_spam(post.cleaned.as_deref(), post.text.as_deref()))
        .collect();
    let spam_removed = (posts.len() as u64 - duplicates_removed) - kept.len() as u64;
    if spam_removed > 0 {
        warn!(
            component = "social",
            event = "social.spam",
            removed = spam_removed
        );
    }

    let rows = kept
        .iter()
        .map(|post| {
            let row = post.source_row;
            let ts = timestamps[row];
            let (l, s) = (likes[row], shares[row]);
            let (score, rate) = match (l, s) {
                (Some(l), Some(s)) => (Some(engagement_score(l, s)), Some(engagement_rate(l, s))),
                _ => (None, None),
            };
            vec![
                table.cell(row, id_idx).to_string(),
                table.cell(row, user_idx).to_string(),
                post.cleaned.clone().unwrap_or_default(),
                post.hashtags.clone(),
                format_float(l),
                format_float(s),
                format_float(score),
                format_float(rate),
                format_timestamp(&ts),
                ts.format("%Y-%m-%d").to_string(),
                ts.hour().to_string(),
                ts.format("%A").to_string(),
                ts.weekday().num_days_from_monday().to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let original_rows = table.len() as u64;
    let final_rows = rows.len() as u64;
    let retention_rate = if original_rows == 0 {
        0.0
    } else {
        final_rows as f64 / original_rows as f64 * 100.0
    };
    let report = SocialReport {
        original_rows,
        duplicates_removed,
        spam_removed,
        final_rows,
        retention_rate,
        likes_median,
        shares_median,
        coerced_cells,
    };

    info!(
        component = "social",
        event = "social.finish",
        original_rows,
        final_rows,
        retention_rate
    );

    let headers = SOCIAL_OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect();
    Ok(SocialCleanOutput {
        table: CsvTable::new(headers, rows),
        report,
    })
}

fn numeric_column(table: &CsvTable, idx: usize, name: &str, coerced: &mut u64) -> Vec<Option<f64>> {
    let failures = (0..table.len())
        .filter(|&row| is_coercion_failure(table.cell(row, idx)))
        .count() as u64;
    if failures > 0 {
        warn!(
            component = "social",
            event = "social.coercion",
            column = %name,
            cells = failures
        );
        *coerced += failures;
    }
    (0..table.len())
        .map(|row| coerce_numeric(table.cell(row, idx)))
        .collect()
}
