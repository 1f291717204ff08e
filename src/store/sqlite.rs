//! SQLite persistence for scored transactions.

use crate::analytics::{require_admin, CategoryCount, FraudReport, MerchantCount, TOP_MERCHANT_LIMIT};
use crate::error::{FraudError, FraudResult};
use crate::store::{authorize_insert, scope_filter, ListFilter, TransactionStore};
use crate::types::context::RequestContext;
use crate::types::transaction::Transaction;
use crate::types::verdict::{ScoredTransaction, Verdict, VerdictSource};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    amount REAL NOT NULL,
    merchant TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    location TEXT NOT NULL,
    user_id TEXT NOT NULL,
    card_type TEXT NOT NULL,
    is_fraud INTEGER NOT NULL,
    fraud_score REAL NOT NULL,
    fraud_reason TEXT NOT NULL,
    verdict_source TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_transactions_user_time
    ON transactions (user_id, timestamp DESC);
";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, amount, merchant, category, description, \
     location, user_id, card_type, is_fraud, fraud_score, fraud_reason, verdict_source \
     FROM transactions";

/// Newest first; rowid breaks timestamp ties in insertion order.
const NEWEST_FIRST: &str = "ORDER BY timestamp DESC, rowid DESC";

/// SQLite-backed [`TransactionStore`].
///
/// The connection is serialized behind a mutex, which also makes every
/// insert atomic with respect to readers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> FraudResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.display(), "Transaction store opened");
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn in_memory() -> FraudResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> FraudResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> FraudResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FraudError::StoreLockPoisoned)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches chronological order. Nanoseconds
    // keep the stored record identical to the one handed in.
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[derive(Debug)]
struct UnknownSource(String);

impl std::fmt::Display for UnknownSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown verdict source {:?}", self.0)
    }
}

impl std::error::Error for UnknownSource {}

fn row_to_scored(row: &Row<'_>) -> rusqlite::Result<ScoredTransaction> {
    let timestamp: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| conversion_error(1, e))?
        .with_timezone(&Utc);

    let source: String = row.get(12)?;
    let source =
        VerdictSource::parse(&source).ok_or_else(|| conversion_error(12, UnknownSource(source)))?;

    Ok(ScoredTransaction {
        transaction: Transaction {
            id: row.get(0)?,
            timestamp,
            amount: row.get(2)?,
            merchant: row.get(3)?,
            category: row.get(4)?,
            description: row.get(5)?,
            location: row.get(6)?,
            user_id: row.get(7)?,
            card_type: row.get(8)?,
        },
        verdict: Verdict {
            is_fraud: row.get::<_, i64>(9)? != 0,
            fraud_score: row.get(10)?,
            fraud_reason: row.get(11)?,
            source,
        },
    })
}

impl TransactionStore for SqliteStore {
    fn insert(&self, ctx: &RequestContext, scored: &ScoredTransaction) -> FraudResult<()> {
        authorize_insert(ctx, scored)?;

        let tx = &scored.transaction;
        let verdict = &scored.verdict;
        self.conn()?.execute(
            "INSERT INTO transactions
             (id, timestamp, amount, merchant, category, description, location, user_id,
              card_type, is_fraud, fraud_score, fraud_reason, verdict_source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                tx.id,
                format_timestamp(&tx.timestamp),
                tx.amount,
                tx.merchant,
                tx.category,
                tx.description,
                tx.location,
                tx.user_id,
                tx.card_type,
                verdict.is_fraud as i64,
                verdict.fraud_score,
                verdict.fraud_reason,
                verdict.source.as_str(),
            ],
        )?;

        debug!(transaction_id = %tx.id, user_id = %tx.user_id, "Scored transaction stored");
        Ok(())
    }

    fn list(
        &self,
        ctx: &RequestContext,
        filter: &ListFilter,
    ) -> FraudResult<Vec<ScoredTransaction>> {
        let filter = scope_filter(ctx, filter)?;
        let conn = self.conn()?;

        let rows = match &filter {
            ListFilter::All => {
                let mut stmt = conn.prepare(&format!("{} {}", SELECT_COLUMNS, NEWEST_FIRST))?;
                let rows = stmt
                    .query_map([], row_to_scored)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            ListFilter::ByUser(owner) => {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE user_id = ?1 {}",
                    SELECT_COLUMNS, NEWEST_FIRST
                ))?;
                let rows = stmt
                    .query_map(params![owner], row_to_scored)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        Ok(rows)
    }

    fn get(&self, ctx: &RequestContext, id: &str) -> FraudResult<Option<ScoredTransaction>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_scored,
            )
            .optional()?;

        Ok(found.filter(|scored| ctx.can_access(&scored.transaction.user_id)))
    }

    fn fraud_report(&self, ctx: &RequestContext) -> FraudResult<FraudReport> {
        require_admin(ctx)?;
        let conn = self.conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        let fraud: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE is_fraud = 1",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT merchant, COUNT(*) AS count FROM transactions
             WHERE is_fraud = 1
             GROUP BY merchant
             ORDER BY count DESC, merchant ASC
             LIMIT ?1",
        )?;
        let top_fraud_merchants = stmt
            .query_map(params![TOP_MERCHANT_LIMIT as i64], |row| {
                Ok(MerchantCount {
                    merchant: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) AS count FROM transactions
             WHERE is_fraud = 1
             GROUP BY category
             ORDER BY count DESC, category ASC",
        )?;
        let fraud_by_category = stmt
            .query_map([], |row| {
                Ok(CategoryCount {
                    category: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(FraudReport::new(
            total as u64,
            fraud as u64,
            top_fraud_merchants,
            fraud_by_category,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn scored(
        user: &str,
        merchant: &str,
        category: &str,
        is_fraud: bool,
        at: DateTime<Utc>,
    ) -> ScoredTransaction {
        ScoredTransaction::new(
            Transaction {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: at,
                amount: 120.0,
                merchant: merchant.to_string(),
                category: category.to_string(),
                description: "test".to_string(),
                location: "Springfield".to_string(),
                user_id: user.to_string(),
                card_type: "visa".to_string(),
            },
            Verdict {
                is_fraud,
                fraud_score: if is_fraud { 0.9 } else { 0.1 },
                fraud_reason: if is_fraud {
                    "Multiple suspicious patterns detected.".to_string()
                } else {
                    String::new()
                },
                source: VerdictSource::Model,
            },
        )
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let alice = RequestContext::user("alice");
        let record = scored("alice", "Shop", "retail", true, base_time());

        store.insert(&alice, &record).unwrap();

        let fetched = store.get(&alice, record.id()).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert!(store.get(&alice, "missing").unwrap().is_none());
    }

    #[test]
    fn test_sub_microsecond_timestamp_survives_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let alice = RequestContext::user("alice");
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let record = scored("alice", "Shop", "retail", false, at);

        store.insert(&alice, &record).unwrap();

        let listed = store.list(&alice, &ListFilter::All).unwrap();
        assert_eq!(listed, vec![record.clone()]);
        assert_eq!(listed[0].transaction.timestamp.timestamp_subsec_nanos(), 123_456_789);
        assert_eq!(store.get(&alice, record.id()).unwrap(), Some(record));
    }

    #[test]
    fn test_concurrent_inserts_keep_newest_first_order() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let admin = RequestContext::admin("root");
        let t0 = base_time();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let ctx = RequestContext::admin("root");
                    for i in 0..25_i64 {
                        // Interleaved instants plus one shared instant per worker
                        let at = t0 + Duration::milliseconds(i * 4 + worker);
                        store
                            .insert(&ctx, &scored("alice", "A", "c", false, at))
                            .unwrap();
                        store
                            .insert(&ctx, &scored("bob", "B", "c", false, t0))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let listed = store.list(&admin, &ListFilter::All).unwrap();
        assert_eq!(listed.len(), 200);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].transaction.timestamp >= pair[1].transaction.timestamp));

        // Ties resolve the same way on every read
        let again = store.list(&admin, &ListFilter::All).unwrap();
        assert_eq!(listed, again);
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let admin = RequestContext::admin("root");
        let t0 = base_time();

        let first = scored("alice", "A", "c", false, t0);
        let second = scored("bob", "B", "c", false, t0 + Duration::minutes(5));
        // Same instant as `second`, inserted later
        let third = scored("alice", "C", "c", false, t0 + Duration::minutes(5));
        for record in [&first, &second, &third] {
            store.insert(&admin, record).unwrap();
        }

        let ids: Vec<String> = store
            .list(&admin, &ListFilter::All)
            .unwrap()
            .into_iter()
            .map(|s| s.transaction.id)
            .collect();
        assert_eq!(ids, vec![third.transaction.id, second.transaction.id, first.transaction.id]);
    }

    #[test]
    fn test_users_only_see_their_own() {
        let store = SqliteStore::in_memory().unwrap();
        let alice = RequestContext::user("alice");
        let bob = RequestContext::user("bob");

        let alice_tx = scored("alice", "A", "c", false, base_time());
        let bob_tx = scored("bob", "B", "c", true, base_time());
        store.insert(&alice, &alice_tx).unwrap();
        store.insert(&bob, &bob_tx).unwrap();

        let listed = store.list(&alice, &ListFilter::All).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|s| s.transaction.user_id == "alice"));

        assert!(matches!(
            store.list(&alice, &ListFilter::ByUser("bob".to_string())),
            Err(FraudError::AccessDenied(_))
        ));
        assert!(store.get(&alice, bob_tx.id()).unwrap().is_none());

        let admin = RequestContext::admin("root");
        assert_eq!(store.list(&admin, &ListFilter::All).unwrap().len(), 2);
        assert_eq!(
            store
                .list(&admin, &ListFilter::ByUser("bob".to_string()))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_user_cannot_insert_for_someone_else() {
        let store = SqliteStore::in_memory().unwrap();
        let record = scored("bob", "B", "c", false, base_time());

        let err = store
            .insert(&RequestContext::user("alice"), &record)
            .unwrap_err();
        assert!(matches!(err, FraudError::AccessDenied(_)));
        assert!(store
            .list(&RequestContext::admin("root"), &ListFilter::All)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duplicate_id_is_store_failure() {
        let store = SqliteStore::in_memory().unwrap();
        let alice = RequestContext::user("alice");
        let record = scored("alice", "A", "c", false, base_time());

        store.insert(&alice, &record).unwrap();
        let err = store.insert(&alice, &record).unwrap_err();
        assert!(err.is_store_failure());
    }

    #[test]
    fn test_fraud_report() {
        let store = SqliteStore::in_memory().unwrap();
        let admin = RequestContext::admin("root");
        let t = base_time();

        let records = [
            scored("u1", "Electro", "electronics", true, t),
            scored("u1", "Electro", "electronics", true, t),
            scored("u2", "Jewels", "jewelry", true, t),
            scored("u2", "Grocer", "groceries", false, t),
        ];
        for record in &records {
            store.insert(&admin, record).unwrap();
        }

        let report = store.fraud_report(&admin).unwrap();
        assert_eq!(report.total_transactions, 4);
        assert_eq!(report.fraud_transactions, 3);
        assert_eq!(report.fraud_percentage, 75.0);
        assert_eq!(
            report.top_fraud_merchants,
            vec![
                MerchantCount {
                    merchant: "Electro".to_string(),
                    count: 2
                },
                MerchantCount {
                    merchant: "Jewels".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(report.fraud_by_category[0].category, "electronics");
        assert_eq!(report.fraud_by_category.len(), 2);

        assert!(matches!(
            store.fraud_report(&RequestContext::user("u1")),
            Err(FraudError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_empty_report() {
        let store = SqliteStore::in_memory().unwrap();
        let report = store.fraud_report(&RequestContext::admin("root")).unwrap();
        assert_eq!(report.total_transactions, 0);
        assert_eq!(report.fraud_percentage, 0.0);
        assert!(report.top_fraud_merchants.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("transactions.db");
        let alice = RequestContext::user("alice");
        let record = scored("alice", "A", "c", true, base_time());

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&alice, &record).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list(&alice, &ListFilter::All).unwrap(), vec![record]);
    }
}
