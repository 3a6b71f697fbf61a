//! Push-sync engine.

use crate::appliers::{ApplierRegistry, ApplyOutcome, TableApplier};
use crate::config::ServerConfig;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{ServerError, ServerResult};
use crate::ranking::{NoopRanking, RankingHook};
use crate::validation::{PostSyncCheck, RawWordOrderCheck};
use chrono::Utc;
use lexisync_protocol::{tables, ClientLog, LogEntry, PushRequest};
use lexisync_store::{DiagnosticIssue, Store, WriteTransaction};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[cfg(test)]
type BeforeCas = Box<dyn Fn(&mut WriteTransaction<'_>, &str) + Send + Sync>;

/// Applies client batches atomically under optimistic concurrency control.
///
/// One push runs in one store transaction:
///
/// 1. lock the user's version row and compare it with the client's version
/// 2. apply every mutation in submitted order, logging each at `version + 1`
/// 3. run post-sync checks
/// 4. advance the version by compare-and-swap
/// 5. notify the ranking hook if a ranking table changed
/// 6. commit
///
/// Any failure rolls back all of it. Integrity violations are additionally
/// recorded through the diagnostics sink after the rollback.
pub struct SyncEngine {
    store: Arc<Store>,
    config: ServerConfig,
    appliers: Arc<ApplierRegistry>,
    checks: Vec<Box<dyn PostSyncCheck>>,
    ranking: Arc<dyn RankingHook>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    #[cfg(test)]
    before_cas: Option<BeforeCas>,
}

impl SyncEngine {
    /// Creates an engine with the default appliers, the raw-word order check,
    /// no ranking and diagnostics written to `store`.
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        let checks: Vec<Box<dyn PostSyncCheck>> = vec![Box::new(RawWordOrderCheck::new(
            config.raw_word_dict_name.clone(),
        ))];
        let diagnostics: Arc<dyn DiagnosticsSink> = Arc::clone(&store) as Arc<dyn DiagnosticsSink>;
        Self {
            store,
            config,
            appliers: Arc::new(ApplierRegistry::with_defaults()),
            checks,
            ranking: Arc::new(NoopRanking),
            diagnostics,
            #[cfg(test)]
            before_cas: None,
        }
    }

    /// Replaces the applier registry.
    pub fn with_appliers(mut self, appliers: Arc<ApplierRegistry>) -> Self {
        self.appliers = appliers;
        self
    }

    /// Adds a post-sync check.
    pub fn with_check(mut self, check: Box<dyn PostSyncCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Sets the ranking hook.
    pub fn with_ranking(mut self, ranking: Arc<dyn RankingHook>) -> Self {
        self.ranking = ranking;
        self
    }

    /// Sets the diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Returns the applier registry.
    pub fn appliers(&self) -> &Arc<ApplierRegistry> {
        &self.appliers
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Applies a push. Returns the version the client must present next.
    ///
    /// A push for a user without a profile row changes nothing and returns 0.
    pub fn push(&self, request: &PushRequest) -> ServerResult<u64> {
        let user_id = request.user_id.as_str();
        if user_id.is_empty() {
            return Err(ServerError::InvalidRequest("userId is required".into()));
        }
        if request.logs.len() > self.config.max_push_batch {
            return Err(ServerError::InvalidRequest(format!(
                "too many operations: {} > {}",
                request.logs.len(),
                self.config.max_push_batch
            )));
        }

        let mut txn = self.store.begin_write();
        match self.push_in(&mut txn, request) {
            Ok(version) => {
                txn.commit()?;
                info!(user_id, version, entries = request.logs.len(), "push committed");
                Ok(version)
            }
            Err(err) => {
                if txn.is_active() {
                    txn.abort()?;
                }
                warn!(user_id, error = %err, "push rolled back");
                if let ServerError::IntegrityViolation {
                    issue_type,
                    details,
                } = &err
                {
                    self.diagnostics
                        .record(DiagnosticIssue::new(user_id, issue_type, details));
                }
                Err(err)
            }
        }
    }

    fn push_in(&self, txn: &mut WriteTransaction<'_>, request: &PushRequest) -> ServerResult<u64> {
        let user_id = request.user_id.as_str();

        if !txn.contains(tables::USER, user_id)? {
            info!(user_id, "push for unknown user, nothing applied");
            return Ok(0);
        }

        self.store.ensure_version_row(user_id);
        let last_version = txn.lock_and_get_version(user_id)?.unwrap_or(0);
        if request.expected_server_db_version != last_version {
            return Err(ServerError::VersionConflict {
                expected: request.expected_server_db_version,
                actual: last_version,
            });
        }

        let new_version = last_version + 1;
        let now = Utc::now();
        let mut ranking_changed = false;

        for log in &request.logs {
            let table = tables::normalize(&log.table);
            let Some(applier) = self.appliers.get(&table) else {
                warn!(user_id, table = %table, record_id = %log.record_id, "unknown table, skipping");
                continue;
            };

            self.apply_one(txn, user_id, applier, log)
                .map_err(|e| ServerError::apply(user_id, table.as_str(), log.record_id.as_str(), e))?;
            txn.append_log(LogEntry::from_client(user_id, new_version, table.as_str(), log, now))?;
            ranking_changed |= self.config.affects_ranking(&table);
        }

        for check in &self.checks {
            if let Some(violation) = check.check(txn, user_id)? {
                error!(
                    user_id,
                    check = check.name(),
                    issue_type = %violation.issue_type,
                    details = %violation.details,
                    "post-sync check failed"
                );
                return Err(ServerError::IntegrityViolation {
                    issue_type: violation.issue_type,
                    details: violation.details,
                });
            }
        }

        #[cfg(test)]
        self.run_before_cas(txn, user_id);

        if !txn.cas_version(user_id, last_version, new_version)? {
            error!(user_id, expected = last_version, "version compare-and-swap failed under row lock");
            return Err(ServerError::CasFailed {
                expected: last_version,
            });
        }

        if ranking_changed {
            let profile = txn.get(tables::USER, user_id)?.unwrap_or(Value::Null);
            self.ranking
                .on_user_changed(user_id, &profile)
                .map_err(|e| match e {
                    ServerError::RankingFailed(_) => e,
                    other => ServerError::RankingFailed(other.to_string()),
                })?;
            debug!(user_id, "ranking updated");
        }

        info!(user_id, from = last_version, to = new_version, "version advanced");
        Ok(new_version)
    }

    #[cfg(test)]
    fn run_before_cas(&self, txn: &mut WriteTransaction<'_>, user_id: &str) {
        if let Some(hook) = &self.before_cas {
            hook(txn, user_id);
        }
    }

    fn apply_one(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        applier: &dyn TableApplier,
        log: &ClientLog,
    ) -> ServerResult<ApplyOutcome> {
        let len = log.record_id.chars().count();
        if len > self.config.max_record_id_len {
            return Err(ServerError::RecordIdTooLong {
                len,
                limit: self.config.max_record_id_len,
            });
        }

        let payload = log.record_value()?;
        let outcome = applier.apply(txn, user_id, log.operate, &log.record_id, &payload)?;
        debug!(
            user_id,
            table = applier.table(),
            record_id = %log.record_id,
            operation = %log.operate,
            ?outcome,
            "applied"
        );
        Ok(outcome)
    }
}
