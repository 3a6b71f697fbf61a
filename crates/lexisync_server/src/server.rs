//! Main sync server.

use crate::appliers::{str_field, DictWord, UserProfile};
use crate::config::ServerConfig;
use crate::engine::SyncEngine;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use chrono::Utc;
use lexisync_protocol::{
    tables, ClientLog, Operation, PullRequest, PullResponse, PushRequest, PushResponse,
    SyncMessage,
};
use lexisync_store::{DiagnosticIssue, Store};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// The sync server.
///
/// Handles push and pull requests against a shared [`Store`], plus the
/// operator-side maintenance of the operation log.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lexisync_server::{ServerConfig, SyncServer};
/// use lexisync_store::Store;
///
/// let server = SyncServer::new(Arc::new(Store::in_memory()), ServerConfig::default());
/// server.register_user("u1", "alice").unwrap();
/// assert_eq!(server.version("u1"), Some(0));
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server with the default engine wiring.
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(store, config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Creates a sync server around a configured engine.
    pub fn with_engine(store: Arc<Store>, engine: SyncEngine) -> Self {
        let context = Arc::new(HandlerContext::with_engine(engine, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: &PushRequest) -> ServerResult<PushResponse> {
        self.handler.handle_push(request)
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: &PullRequest) -> ServerResult<PullResponse> {
        self.handler.handle_pull(request)
    }

    /// Handles a sync message (dispatches to the appropriate handler).
    pub fn handle_message(&self, message: &SyncMessage) -> ServerResult<SyncMessage> {
        match message {
            SyncMessage::PushRequest(req) => self.handle_push(req).map(SyncMessage::PushResponse),
            SyncMessage::PullRequest(req) => self.handle_pull(req).map(SyncMessage::PullResponse),
            _ => Err(ServerError::InvalidRequest("unexpected message type".into())),
        }
    }

    /// Creates the profile row and version ledger row of a new account.
    /// Returns false if the user already exists.
    pub fn register_user(&self, user_id: &str, user_name: &str) -> ServerResult<bool> {
        if user_id.is_empty() {
            return Err(ServerError::InvalidRequest("userId is required".into()));
        }
        let store = &self.context.store;
        let mut txn = store.begin_write();
        if txn.contains(tables::USER, user_id)? {
            txn.abort()?;
            return Ok(false);
        }
        let profile = serde_json::to_value(UserProfile::new(user_id, user_name))?;
        txn.put(tables::USER, user_id, profile)?;
        txn.commit()?;
        store.ensure_version_row(user_id);
        info!(user_id, user_name, "registered user");
        Ok(true)
    }

    /// Replaces the user's raw-word dictionary with `word_ids`, in order.
    ///
    /// Runs as one push: a BATCH_DELETE of the dictionary's words, one INSERT
    /// per word numbered from 1, and an UPDATE of the dictionary's word count.
    /// Other devices receive the repair through pull like any other change.
    pub fn overwrite_raw_words(
        &self,
        user_id: &str,
        expected_version: u64,
        word_ids: &[String],
    ) -> ServerResult<PushResponse> {
        let mut seen = HashSet::new();
        for word_id in word_ids {
            if !seen.insert(word_id.as_str()) {
                return Err(ServerError::InvalidRequest(format!("duplicate word {word_id}")));
            }
        }

        let dict_name = self.context.engine.config().raw_word_dict_name.as_str();
        let (dict_id, mut dict) = self
            .context
            .store
            .scan(tables::DICT, |_, row| {
                str_field(row, "ownerId") == Some(user_id) && str_field(row, "name") == Some(dict_name)
            })
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServerError::InvalidRequest(format!("user {user_id} has no raw-word dictionary"))
            })?;

        let now = Utc::now();
        let mut logs = Vec::with_capacity(word_ids.len() + 2);
        logs.push(ClientLog::new(
            tables::DICT_WORD,
            Operation::BatchDelete,
            "",
            &json!({ "dictId": dict_id }),
        )?);
        for (index, word_id) in word_ids.iter().enumerate() {
            let member = DictWord {
                dict_id: dict_id.clone(),
                word_id: word_id.clone(),
                seq: i32::try_from(index + 1)
                    .map_err(|_| ServerError::InvalidRequest("too many words".into()))?,
                create_time: Some(now),
                update_time: Some(now),
            };
            logs.push(ClientLog::new(
                tables::DICT_WORD,
                Operation::Insert,
                format!("{dict_id}-{word_id}"),
                &member,
            )?);
        }
        if let Value::Object(fields) = &mut dict {
            fields.insert("wordCount".into(), json!(word_ids.len()));
            fields.insert("updateTime".into(), json!(now));
        }
        logs.push(ClientLog::new(tables::DICT, Operation::Update, dict_id.as_str(), &dict)?);

        info!(user_id, dict_id = %dict_id, words = word_ids.len(), "overwriting raw-word dictionary");
        self.handle_push(&PushRequest::new(user_id, expected_version, logs))
    }

    /// Removes log entries of `user_id` older than `before_version`.
    pub fn prune_log(&self, user_id: &str, before_version: u64) -> usize {
        self.context.store.prune_log(user_id, before_version)
    }

    /// Counts log entries of `user_id` beyond the ledger version.
    pub fn orphaned_log_count(&self, user_id: &str) -> usize {
        self.context.store.orphaned_log_count(user_id)
    }

    /// Removes log entries of `user_id` beyond the ledger version.
    pub fn delete_orphaned_logs(&self, user_id: &str) -> usize {
        self.context.store.delete_orphaned_logs(user_id)
    }

    /// Returns the integrity issues recorded for `user_id`.
    pub fn issues(&self, user_id: &str) -> Vec<DiagnosticIssue> {
        self.context.store.issues(user_id)
    }

    /// Returns the current version of `user_id`.
    pub fn version(&self, user_id: &str) -> Option<u64> {
        self.context.store.version(user_id)
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.context.store
    }
}
