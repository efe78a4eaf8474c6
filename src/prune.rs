//! Permanent removal of soft-deleted records.
//!
//! A sweep visits each prunable type in a fixed order. For every soft-deleted
//! candidate it checks whether an active dependent still references it and,
//! if not, issues a conditional delete that only succeeds while the record
//! is still soft-deleted (and still past its retention window). Sweeps are
//! independent: a store failure ends the sweep of that type only, and the
//! counts reached so far are kept.

use crate::app_config::RetentionConfig;
use crate::constants;
use crate::store::{Collection, DocumentStore, FindOptions, StoreError};
use bson::oid::ObjectId;
use bson::{doc, Document};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Minimum ages before an unreferenced soft-deleted record may be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub user_max_age: Duration,
    pub product_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&RetentionConfig::default())
    }
}

impl RetentionPolicy {
    /// Day counts outside `1..=MAX_RETENTION_DAYS` fall back to the default
    /// window or the maximum, with a warning.
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            user_max_age: Duration::days(retention_days(
                "user_days",
                config.user_days,
                constants::USER_RETENTION_DAYS,
            )),
            product_max_age: Duration::days(retention_days(
                "product_days",
                config.product_days,
                constants::PRODUCT_RETENTION_DAYS,
            )),
        }
    }
}

fn retention_days(key: &str, configured: i64, default: i64) -> i64 {
    if configured <= 0 {
        log::warn!(
            "retention.{} = {} is not a positive day count, using {}",
            key,
            configured,
            default
        );
        default
    } else if configured > constants::MAX_RETENTION_DAYS {
        log::warn!(
            "retention.{} = {} exceeds {}, clamping",
            key,
            configured,
            constants::MAX_RETENTION_DAYS
        );
        constants::MAX_RETENTION_DAYS
    } else {
        configured
    }
}

/// Entity types visited by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PruneTarget {
    Tags,
    Titles,
    Categories,
    Users,
    Products,
}

/// A dependent collection field that keeps a record alive while the
/// dependent itself is not soft-deleted.
struct Reference {
    collection: Collection,
    field: &'static str,
}

impl PruneTarget {
    /// Leaf-referenced types first.
    pub const ORDER: [PruneTarget; 5] = [
        PruneTarget::Tags,
        PruneTarget::Titles,
        PruneTarget::Categories,
        PruneTarget::Users,
        PruneTarget::Products,
    ];

    pub fn collection(self) -> Collection {
        match self {
            PruneTarget::Tags => Collection::Tags,
            PruneTarget::Titles => Collection::Titles,
            PruneTarget::Categories => Collection::Categories,
            PruneTarget::Users => Collection::Users,
            PruneTarget::Products => Collection::Products,
        }
    }

    pub fn name(self) -> &'static str {
        self.collection().name()
    }

    fn references(self) -> &'static [Reference] {
        match self {
            PruneTarget::Tags => &[
                Reference {
                    collection: Collection::Titles,
                    field: "tags",
                },
                Reference {
                    collection: Collection::Products,
                    field: "tags",
                },
            ],
            PruneTarget::Titles => &[Reference {
                collection: Collection::Products,
                field: "title",
            }],
            PruneTarget::Categories => &[Reference {
                collection: Collection::Titles,
                field: "category",
            }],
            PruneTarget::Users => &[Reference {
                collection: Collection::Products,
                field: "owner",
            }],
            // Reviews point at products but are hard-deleted on their own.
            PruneTarget::Products => &[],
        }
    }

    fn max_age(self, policy: &RetentionPolicy) -> Option<Duration> {
        match self {
            PruneTarget::Users => Some(policy.user_max_age),
            PruneTarget::Products => Some(policy.product_max_age),
            _ => None,
        }
    }
}

/// Outcome of one type's sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub target: PruneTarget,
    pub deleted: u64,
    /// Set when the sweep stopped early
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub sweeps: Vec<SweepResult>,
}

impl PruneReport {
    pub fn count(&self, target: PruneTarget) -> u64 {
        self.sweeps
            .iter()
            .find(|sweep| sweep.target == target)
            .map_or(0, |sweep| sweep.deleted)
    }

    pub fn total(&self) -> u64 {
        self.sweeps.iter().map(|sweep| sweep.deleted).sum()
    }

    /// True when every sweep ran to completion.
    pub fn is_complete(&self) -> bool {
        self.sweeps.iter().all(|sweep| sweep.error.is_none())
    }

    /// `{Tags, Titles, Categories, Users, Products}` deletion counts.
    pub fn counts(&self) -> serde_json::Value {
        let mut counts = serde_json::Map::new();
        for target in PruneTarget::ORDER {
            counts.insert(target.name().to_string(), self.count(target).into());
        }
        serde_json::Value::Object(counts)
    }

    /// Failed sweeps keyed by type name. The cause is only logged, so the
    /// value is always `"failed"`.
    pub fn errors(&self) -> serde_json::Value {
        let mut errors = serde_json::Map::new();
        for sweep in &self.sweeps {
            if sweep.error.is_some() {
                errors.insert(sweep.target.name().to_string(), "failed".into());
            }
        }
        serde_json::Value::Object(errors)
    }
}

/// Run one sweep over every prunable type, measuring ages against `now`.
pub async fn prune_soft_deleted(
    store: &dyn DocumentStore,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> PruneReport {
    let mut report = PruneReport::default();

    for target in PruneTarget::ORDER {
        let mut deleted = 0;
        let error = match sweep(store, target, policy, now, &mut deleted).await {
            Ok(()) => None,
            Err(e) => {
                log::error!("Prune sweep of {} stopped after {} deletions: {}", target.name(), deleted, e);
                Some(e.to_string())
            }
        };
        log::debug!("Pruned {} {}", deleted, target.name());
        report.sweeps.push(SweepResult {
            target,
            deleted,
            error,
        });
    }

    log::info!("Prune completed: {} ({} records)", report.counts(), report.total());
    report
}

/// Why a sweep stopped early.
#[derive(Debug)]
enum SweepError {
    Store(StoreError),
    /// The retention window cannot be measured back from `now`
    Window(Duration),
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepError::Store(e) => write!(f, "{}", e),
            SweepError::Window(age) => write!(
                f,
                "retention window of {} days is out of range",
                age.num_days()
            ),
        }
    }
}

impl From<StoreError> for SweepError {
    fn from(e: StoreError) -> Self {
        SweepError::Store(e)
    }
}

async fn sweep(
    store: &dyn DocumentStore,
    target: PruneTarget,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    deleted: &mut u64,
) -> Result<(), SweepError> {
    let collection = target.collection();

    // A missing updatedAt never satisfies `$lt`, so such records count as young.
    let mut eligible = doc! { "deleted": true };
    if let Some(max_age) = target.max_age(policy) {
        let cutoff = Some(max_age)
            .filter(|age| *age >= Duration::zero())
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or(SweepError::Window(max_age))?;
        let cutoff = bson::DateTime::from_chrono(cutoff);
        eligible.insert("updatedAt", doc! { "$lt": cutoff });
    }

    let candidates = store
        .find(
            collection,
            eligible.clone(),
            FindOptions::default().projection(doc! { "_id": 1 }),
        )
        .await?;

    for candidate in candidates {
        let id = match candidate.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                log::warn!("Skipping {} record without an ObjectId", target.name());
                continue;
            }
        };

        if is_referenced(store, target, id).await? {
            log::debug!("{} {} is still referenced", target.name(), id);
            continue;
        }

        let mut guard = eligible.clone();
        guard.insert("_id", id);
        if store.delete_one(collection, guard).await?.is_some() {
            *deleted += 1;
        } else {
            log::debug!("{} {} changed before it could be pruned", target.name(), id);
        }
    }

    Ok(())
}

async fn is_referenced(
    store: &dyn DocumentStore,
    target: PruneTarget,
    id: ObjectId,
) -> Result<bool, StoreError> {
    for reference in target.references() {
        let mut filter = Document::new();
        filter.insert(reference.field, id);
        filter.insert("deleted", doc! { "$ne": true });
        if store.exists(reference.collection, filter).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Timer trigger: sweep every `every` until the runtime shuts down.
pub async fn run_scheduled(store: Arc<dyn DocumentStore>, every: std::time::Duration) {
    let mut interval = actix_web::rt::time::interval(every);
    // The first tick completes immediately; the first sweep waits a full period.
    interval.tick().await;
    loop {
        interval.tick().await;
        let policy = RetentionPolicy::from_config(&crate::app_config::retention());
        let report = prune_soft_deleted(store.as_ref(), &policy, Utc::now()).await;
        if !report.is_complete() {
            log::warn!("Scheduled prune finished with errors: {}", report.errors());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.user_max_age, Duration::days(730));
        assert_eq!(policy.product_max_age, Duration::days(365));
    }

    #[test]
    fn test_non_positive_days_fall_back_to_defaults() {
        let policy = RetentionPolicy::from_config(&RetentionConfig {
            user_days: -1,
            product_days: 0,
            ..Default::default()
        });
        assert_eq!(policy, RetentionPolicy::default());
    }

    #[test]
    fn test_huge_days_are_clamped() {
        let policy = RetentionPolicy::from_config(&RetentionConfig {
            user_days: 200_000_000,
            product_days: i64::MAX,
            ..Default::default()
        });
        assert_eq!(policy.user_max_age, Duration::days(constants::MAX_RETENTION_DAYS));
        assert_eq!(policy.product_max_age, Duration::days(constants::MAX_RETENTION_DAYS));
    }

    #[test]
    fn test_errors_hide_the_cause() {
        let report = PruneReport {
            sweeps: vec![SweepResult {
                target: PruneTarget::Tags,
                deleted: 0,
                error: Some("Store error: connection reset".to_string()),
            }],
        };
        assert_eq!(report.errors(), serde_json::json!({ "Tags": "failed" }));
    }

    #[test]
    fn test_sweep_order() {
        let names: Vec<&str> = PruneTarget::ORDER.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["Tags", "Titles", "Categories", "Users", "Products"]);
    }

    #[test]
    fn test_only_users_and_products_have_age_limits() {
        let policy = RetentionPolicy::default();
        assert!(PruneTarget::Tags.max_age(&policy).is_none());
        assert!(PruneTarget::Titles.max_age(&policy).is_none());
        assert!(PruneTarget::Categories.max_age(&policy).is_none());
        assert!(PruneTarget::Users.max_age(&policy).is_some());
        assert!(PruneTarget::Products.max_age(&policy).is_some());
    }

    #[test]
    fn test_report_counts_include_every_type() {
        let report = PruneReport {
            sweeps: vec![SweepResult {
                target: PruneTarget::Users,
                deleted: 2,
                error: None,
            }],
        };
        let counts = report.counts();
        assert_eq!(counts["Users"], 2);
        assert_eq!(counts["Tags"], 0);
        assert!(report.is_complete());
    }
}
