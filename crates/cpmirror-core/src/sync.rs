// ── Reconciler ──
//
// Converges the local store onto the remote catalog. `full_sync` rewrites
// every category; `delta_sync` only touches the uid-set difference. Store
// contention is retried under a bounded `RetryPolicy`; a record that stays
// locked past the ceiling is skipped and the run carries on.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::{debug, error, info, warn};

use cpmirror_api::{ApiCall, ApiCommand, Error as ApiError};

use crate::catalog;
use crate::config::{PageLimits, RetryPolicy};
use crate::error::CoreError;
use crate::model::{ObjectCategory, RemoteObject};
use crate::store::{LocalStore, StoreError};

/// What a sync run did to the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records written (new or replaced).
    pub inserted: u64,
    pub deleted: u64,
    /// Records given up on: still locked after the retry ceiling, or gone
    /// remotely before they could be fetched.
    pub skipped: u64,
    /// Categories walked.
    pub categories: usize,
}

/// Local versus remote object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObjectStatus {
    pub local: u64,
    pub remote: u64,
}

impl ObjectStatus {
    pub fn in_sync(&self) -> bool {
        self.local == self.remote
    }
}

/// Drives reconciliation between one session and one store.
pub struct Reconciler<'a, C, S> {
    session: &'a C,
    store: &'a S,
    limits: PageLimits,
    retry: RetryPolicy,
}

impl<'a, C: ApiCall, S: LocalStore> Reconciler<'a, C, S> {
    pub fn new(session: &'a C, store: &'a S) -> Self {
        Self {
            session,
            store,
            limits: PageLimits::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ── Full sync ────────────────────────────────────────────────────

    /// Pull every object of every category and write it locally,
    /// committing after each category.
    ///
    /// Objects that vanished remotely are left in place; `delta_sync`
    /// removes them.
    pub async fn full_sync(&self) -> Result<SyncReport, CoreError> {
        let mut report = SyncReport::default();

        for category in ObjectCategory::iter() {
            let objects = catalog::fetch_objects(self.session, category, self.limits.bulk).await?;
            let fetched = objects.len();

            for object in &objects {
                match self
                    .with_busy_retry("insert", &object.uid, || self.store.insert_or_replace(object))
                    .await?
                {
                    Some(()) => report.inserted += 1,
                    None => report.skipped += 1,
                }
            }

            self.commit().await?;
            report.categories += 1;
            info!(%category, objects = fetched, "category synced");
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "full sync complete"
        );
        Ok(report)
    }

    // ── Delta sync ───────────────────────────────────────────────────

    /// Delete local records whose uid is gone remotely and fetch the ones
    /// missing locally. Records present on both sides are not touched.
    ///
    /// Every missing object is fetched before the first write, so the
    /// store's write lock is only held for the local apply and the single
    /// commit at the end.
    pub async fn delta_sync(&self) -> Result<SyncReport, CoreError> {
        let mut report = SyncReport::default();

        let mut remote: HashSet<String> = HashSet::new();
        for category in ObjectCategory::iter() {
            let uids = catalog::fetch_uids(self.session, category, self.limits.bulk).await?;
            debug!(%category, uids = uids.len(), "remote uids listed");
            remote.extend(uids);
            report.categories += 1;
        }

        let local = self
            .with_busy_retry("list keys", "*", || self.store.keys())
            .await?
            .ok_or(StoreError::Busy)?;

        let mut stale: Vec<&String> = local.difference(&remote).collect();
        stale.sort_unstable();
        let mut missing: Vec<&String> = remote.difference(&local).collect();
        missing.sort_unstable();
        info!(
            remote = remote.len(),
            local = local.len(),
            stale = stale.len(),
            missing = missing.len(),
            "computed uid difference"
        );

        let mut fetched = Vec::with_capacity(missing.len());
        for uid in missing {
            match self.fetch_object(uid).await? {
                Some(object) => fetched.push(object),
                None => report.skipped += 1,
            }
        }

        for uid in stale {
            match self
                .with_busy_retry("delete", uid, || self.store.delete(uid))
                .await?
            {
                Some(true) => report.deleted += 1,
                Some(false) => {}
                None => report.skipped += 1,
            }
        }

        for object in &fetched {
            match self
                .with_busy_retry("insert", &object.uid, || self.store.insert_or_replace(object))
                .await?
            {
                Some(()) => report.inserted += 1,
                None => report.skipped += 1,
            }
        }

        self.commit().await?;
        info!(
            inserted = report.inserted,
            deleted = report.deleted,
            skipped = report.skipped,
            "delta sync complete"
        );
        Ok(report)
    }

    /// Learn the object's type via `show-object`, then fetch it in full
    /// from its own `show-{type}` endpoint.
    ///
    /// Returns `None` when the server no longer knows the uid.
    async fn fetch_object(&self, uid: &str) -> Result<Option<RemoteObject>, CoreError> {
        let lookup = match self
            .session
            .call(&ApiCommand::ShowObject, &json!({ "uid": uid }))
            .await
        {
            Ok(body) => body,
            Err(ApiError::ClientError { status, body, .. }) => {
                warn!(uid, status, %body, "object vanished before it could be fetched");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let object_type = lookup
            .pointer("/object/type")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::protocol("show-object", format!("no type for uid {uid}")))?;

        let command = ApiCommand::Show(object_type.to_owned());
        let params = json!({ "uid": uid, "details-level": "full" });
        let body = match self.session.call(&command, &params).await {
            Ok(body) => body,
            Err(ApiError::ClientError { status, .. }) => {
                debug!(uid, %command, status, "typed show rejected, using show-object");
                let mut body = self.session.call(&ApiCommand::ShowObject, &params).await?;
                body.get_mut("object").map(Value::take).ok_or_else(|| {
                    CoreError::protocol("show-object", "reply has no `object` field")
                })?
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| CoreError::protocol(command.endpoint(), format!("malformed object: {e}")))
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Count local records and sum each category's remote `total`.
    pub async fn object_status(&self) -> Result<ObjectStatus, CoreError> {
        let local = self
            .with_busy_retry("count", "*", || self.store.count())
            .await?
            .ok_or(StoreError::Busy)?;

        let mut remote = 0;
        for category in ObjectCategory::iter() {
            remote += catalog::probe_total(self.session, category).await?;
        }

        Ok(ObjectStatus { local, remote })
    }

    // ── Retry plumbing ───────────────────────────────────────────────

    async fn commit(&self) -> Result<(), CoreError> {
        self.with_busy_retry("commit", "*", || self.store.commit())
            .await?
            .ok_or(CoreError::Store(StoreError::Busy))
    }

    /// Run `op` until it succeeds, fails with a non-busy error, or hits
    /// the attempt ceiling. `Ok(None)` means the ceiling was hit.
    async fn with_busy_retry<T>(
        &self,
        operation: &str,
        uid: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<Option<T>, StoreError> {
        let ceiling = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => return Ok(Some(value)),
                Err(e) if e.is_busy() && attempt < ceiling => {
                    warn!(operation, uid, attempt, "store busy, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) if e.is_busy() => {
                    error!(operation, uid, attempts = attempt, "store still busy, skipping");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::catalog::tests::ScriptedSession;
    use crate::store::{SqliteStore, StoredObject};

    /// In-memory store that reports busy for the first `busy_writes`
    /// write attempts.
    #[derive(Default)]
    struct FlakyStore {
        objects: Mutex<BTreeMap<String, RemoteObject>>,
        busy_writes: AtomicU32,
        write_attempts: AtomicU32,
        commits: AtomicU32,
    }

    impl FlakyStore {
        fn busy_for(writes: u32) -> Self {
            Self {
                busy_writes: AtomicU32::new(writes),
                ..Self::default()
            }
        }

        fn seeded(uids: &[&str]) -> Self {
            let store = Self::default();
            for uid in uids {
                store
                    .objects
                    .lock()
                    .unwrap()
                    .insert((*uid).to_owned(), host(uid));
            }
            store
        }

        fn take_busy(&self) -> bool {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);
            self.busy_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn uids(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    impl LocalStore for FlakyStore {
        fn insert_or_replace(&self, object: &RemoteObject) -> Result<(), StoreError> {
            if self.take_busy() {
                return Err(StoreError::Busy);
            }
            self.objects
                .lock()
                .unwrap()
                .insert(object.uid.clone(), object.clone());
            Ok(())
        }

        fn delete(&self, uid: &str) -> Result<bool, StoreError> {
            if self.take_busy() {
                return Err(StoreError::Busy);
            }
            Ok(self.objects.lock().unwrap().remove(uid).is_some())
        }

        fn get(&self, _uid: &str) -> Result<Option<StoredObject>, StoreError> {
            Ok(None)
        }

        fn keys(&self) -> Result<HashSet<String>, StoreError> {
            Ok(self.objects.lock().unwrap().keys().cloned().collect())
        }

        fn count(&self) -> Result<u64, StoreError> {
            Ok(self.objects.lock().unwrap().len() as u64)
        }

        fn commit(&self) -> Result<(), StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn host(uid: &str) -> RemoteObject {
        serde_json::from_value(json!({ "uid": uid, "type": "host", "name": uid })).unwrap()
    }

    fn page(items: Vec<Value>) -> Result<Value, ApiError> {
        let n = items.len();
        Ok(json!({ "objects": items, "from": 0, "to": n, "total": n }))
    }

    /// One reply per category, hosts first, every other category empty.
    fn catalog_with_hosts(hosts: Vec<Value>) -> Vec<Result<Value, ApiError>> {
        ObjectCategory::iter()
            .map(|category| match category {
                ObjectCategory::Host => page(hosts.clone()),
                _ => page(Vec::new()),
            })
            .collect()
    }

    fn full_hosts(uids: &[&str]) -> Vec<Value> {
        uids.iter()
            .map(|uid| json!({ "uid": uid, "type": "host", "name": uid, "ipv4-address": "10.0.0.1" }))
            .collect()
    }

    fn uid_items(uids: &[&str]) -> Vec<Value> {
        uids.iter().map(|uid| json!(uid)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn busy_nine_times_then_success_stores_once() {
        let session = ScriptedSession::new(catalog_with_hosts(full_hosts(&["h1"])));
        let store = FlakyStore::busy_for(9);
        let started = tokio::time::Instant::now();

        let report = Reconciler::new(&session, &store).full_sync().await.unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.uids(), vec!["h1".to_string()]);
        assert_eq!(store.write_attempts.load(Ordering::SeqCst), 10);
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_past_ceiling_skips_record_and_finishes() {
        let session = ScriptedSession::new(catalog_with_hosts(full_hosts(&["h1", "h2"])));
        let store = FlakyStore::busy_for(10);

        let report = Reconciler::new(&session, &store).full_sync().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.categories, 10);
        assert_eq!(store.uids(), vec!["h2".to_string()]);
        assert_eq!(store.commits.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_ceiling_is_configurable() {
        let session = ScriptedSession::new(catalog_with_hosts(full_hosts(&["h1"])));
        let store = FlakyStore::busy_for(3);
        let retry = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        };

        let report = Reconciler::new(&session, &store)
            .with_retry(retry)
            .full_sync()
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(store.write_attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn full_sync_requests_every_category_in_full() {
        let session = ScriptedSession::new(catalog_with_hosts(Vec::new()));
        let store = FlakyStore::default();

        Reconciler::new(&session, &store).full_sync().await.unwrap();

        let requests = session.requests.lock().unwrap();
        let endpoints: Vec<&str> = requests.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(endpoints.len(), 10);
        assert_eq!(endpoints[0], "show-hosts");
        assert!(endpoints.contains(&"show-gateways-and-servers"));
        assert!(requests.iter().all(|(_, p)| p["details-level"] == "full"));
        assert!(requests.iter().all(|(_, p)| p["limit"] == 500));
    }

    #[tokio::test]
    async fn full_sync_twice_leaves_store_unchanged() {
        let store = SqliteStore::in_memory().unwrap();

        let first = ScriptedSession::new(catalog_with_hosts(full_hosts(&["h1", "h2"])));
        Reconciler::new(&first, &store).full_sync().await.unwrap();
        let before = store.list(None).unwrap();

        let second = ScriptedSession::new(catalog_with_hosts(full_hosts(&["h1", "h2"])));
        Reconciler::new(&second, &store).full_sync().await.unwrap();

        assert_eq!(store.list(None).unwrap(), before);
    }

    #[tokio::test]
    async fn delta_sync_converges_on_remote_uids() {
        let mut replies = catalog_with_hosts(uid_items(&["keep", "new"]));
        replies.push(Ok(json!({ "object": { "uid": "new", "type": "host", "name": "new" } })));
        replies.push(Ok(json!({
            "uid": "new", "type": "host", "name": "new", "ipv4-address": "10.1.1.1"
        })));
        let session = ScriptedSession::new(replies);
        let store = FlakyStore::seeded(&["keep", "stale"]);

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(store.uids(), vec!["keep".to_string(), "new".to_string()]);
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);

        let requests = session.requests.lock().unwrap();
        let (lookup, lookup_params) = &requests[10];
        assert_eq!(lookup, "show-object");
        assert_eq!(lookup_params["uid"], "new");
        let (fetch, fetch_params) = &requests[11];
        assert_eq!(fetch, "show-host");
        assert_eq!(fetch_params["details-level"], "full");
    }

    /// Runs a write transaction from a second connection before every
    /// object fetch, the way another process sharing the mirror would.
    struct ContendedSession {
        inner: ScriptedSession,
        database: std::path::PathBuf,
        outside_writes: Mutex<Vec<bool>>,
    }

    impl ApiCall for ContendedSession {
        async fn call(&self, command: &ApiCommand, payload: &Value) -> Result<Value, ApiError> {
            if !matches!(command, ApiCommand::ShowAll(_)) {
                let committed = {
                    let conn = rusqlite::Connection::open(&self.database).unwrap();
                    conn.busy_timeout(Duration::ZERO).unwrap();
                    conn.execute_batch("BEGIN IMMEDIATE; COMMIT;").is_ok()
                };
                self.outside_writes.lock().unwrap().push(committed);
            }
            self.inner.call(command, payload).await
        }
    }

    #[tokio::test]
    async fn delta_sync_leaves_store_unlocked_while_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("mirror.db");
        let store = SqliteStore::open(&database).unwrap();
        store.insert_or_replace(&host("keep")).unwrap();
        store.insert_or_replace(&host("stale")).unwrap();
        store.commit().unwrap();

        let mut replies = catalog_with_hosts(uid_items(&["keep", "new"]));
        replies.push(Ok(json!({ "object": { "uid": "new", "type": "host", "name": "new" } })));
        replies.push(Ok(json!({ "uid": "new", "type": "host", "name": "new" })));
        let session = ContendedSession {
            inner: ScriptedSession::new(replies),
            database,
            outside_writes: Mutex::new(Vec::new()),
        };

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(*session.outside_writes.lock().unwrap(), vec![true, true]);
        let mut keys: Vec<String> = store.keys().unwrap().into_iter().collect();
        keys.sort();
        assert_eq!(keys, vec!["keep".to_string(), "new".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn delta_sync_skips_delete_that_stays_busy() {
        let session = ScriptedSession::new(catalog_with_hosts(uid_items(&["keep"])));
        let store = FlakyStore::seeded(&["keep", "stale"]);
        store.busy_writes.store(10, Ordering::SeqCst);

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.deleted, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.uids(), vec!["keep".to_string(), "stale".to_string()]);
        assert_eq!(store.write_attempts.load(Ordering::SeqCst), 10);
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert!(logs_contain("store still busy, skipping"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn delta_sync_skips_insert_that_stays_busy() {
        let mut replies = catalog_with_hosts(uid_items(&["keep", "new"]));
        replies.push(Ok(json!({ "object": { "uid": "new", "type": "host", "name": "new" } })));
        replies.push(Ok(json!({ "uid": "new", "type": "host", "name": "new" })));
        let session = ScriptedSession::new(replies);
        let store = FlakyStore::seeded(&["keep"]);
        store.busy_writes.store(10, Ordering::SeqCst);

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.uids(), vec!["keep".to_string()]);
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert!(logs_contain("store still busy, skipping"));
    }

    #[tokio::test]
    async fn delta_sync_without_changes_does_nothing() {
        let session = ScriptedSession::new(catalog_with_hosts(uid_items(&["a", "b"])));
        let store = FlakyStore::seeded(&["a", "b"]);

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.inserted, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(store.write_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(session.request_count(), 10);
    }

    #[tokio::test]
    async fn delta_sync_skips_uid_that_vanished() {
        let mut replies = catalog_with_hosts(uid_items(&["gone"]));
        replies.push(Err(ApiError::ClientError {
            command: "show-object".into(),
            status: 404,
            body: r#"{"code":"generic_err_object_not_found"}"#.into(),
        }));
        let session = ScriptedSession::new(replies);
        let store = FlakyStore::default();

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(store.uids().is_empty());
    }

    #[tokio::test]
    async fn delta_sync_falls_back_to_show_object_for_untyped_endpoints() {
        let mut replies = catalog_with_hosts(uid_items(&["cl"]));
        replies.push(Ok(json!({ "object": { "uid": "cl", "type": "CpmiGatewayCluster" } })));
        replies.push(Err(ApiError::ClientError {
            command: "show-CpmiGatewayCluster".into(),
            status: 404,
            body: String::new(),
        }));
        replies.push(Ok(json!({
            "object": { "uid": "cl", "type": "CpmiGatewayCluster", "name": "cluster1" }
        })));
        let session = ScriptedSession::new(replies);
        let store = FlakyStore::default();

        let report = Reconciler::new(&session, &store).delta_sync().await.unwrap();

        assert_eq!(report.inserted, 1);
        let objects = store.objects.lock().unwrap();
        assert_eq!(objects["cl"].name.as_deref(), Some("cluster1"));
    }

    #[tokio::test]
    async fn transport_failure_aborts_sync() {
        let session = ScriptedSession::new(vec![Err(ApiError::ServerError {
            command: "show-hosts".into(),
            status: 500,
            body: String::new(),
        })]);
        let store = FlakyStore::default();

        let err = Reconciler::new(&session, &store)
            .delta_sync()
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::ServerFailure { .. }), "got {err:?}");
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn object_status_sums_category_totals() {
        let replies = ObjectCategory::iter()
            .enumerate()
            .map(|(i, _)| Ok(json!({ "objects": [], "to": 1, "total": i + 1 })))
            .collect();
        let session = ScriptedSession::new(replies);
        let store = FlakyStore::seeded(&["a", "b", "c"]);

        let status = Reconciler::new(&session, &store).object_status().await.unwrap();

        assert_eq!(status, ObjectStatus { local: 3, remote: 55 });
        assert!(!status.in_sync());
    }
}
