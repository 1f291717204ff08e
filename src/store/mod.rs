//! Durable storage for scored transactions.
//!
//! Every call carries the caller's [`RequestContext`]; ownership rules are
//! enforced here rather than by the caller.

pub mod sqlite;

use crate::analytics::FraudReport;
use crate::error::{FraudError, FraudResult};
use crate::types::context::RequestContext;
use crate::types::verdict::ScoredTransaction;

pub use sqlite::SqliteStore;

/// Which records a `list` call asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    All,
    ByUser(String),
}

/// Keyed storage for transactions plus verdicts.
///
/// Inserts are atomic. Listings are newest first and stable under concurrent
/// inserts.
pub trait TransactionStore: Send + Sync {
    fn insert(&self, ctx: &RequestContext, scored: &ScoredTransaction) -> FraudResult<()>;

    fn list(
        &self,
        ctx: &RequestContext,
        filter: &ListFilter,
    ) -> FraudResult<Vec<ScoredTransaction>>;

    /// `None` when the record is missing or owned by someone the caller may
    /// not see.
    fn get(&self, ctx: &RequestContext, id: &str) -> FraudResult<Option<ScoredTransaction>>;

    fn fraud_report(&self, ctx: &RequestContext) -> FraudResult<FraudReport>;
}

/// Narrow a requested filter to what the caller may see.
///
/// Admins get what they ask for. Other users are confined to their own
/// records; asking for someone else's is an error.
pub fn scope_filter(ctx: &RequestContext, filter: &ListFilter) -> FraudResult<ListFilter> {
    if ctx.is_admin() {
        return Ok(filter.clone());
    }
    match filter {
        ListFilter::All => Ok(ListFilter::ByUser(ctx.user_id.clone())),
        ListFilter::ByUser(owner) if owner == &ctx.user_id => Ok(filter.clone()),
        ListFilter::ByUser(owner) => Err(FraudError::AccessDenied(format!(
            "user {} may not list transactions of {}",
            ctx.user_id, owner
        ))),
    }
}

pub fn authorize_insert(ctx: &RequestContext, scored: &ScoredTransaction) -> FraudResult<()> {
    if ctx.can_access(&scored.transaction.user_id) {
        Ok(())
    } else {
        Err(FraudError::AccessDenied(format!(
            "user {} may not store transactions owned by {}",
            ctx.user_id, scored.transaction.user_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter_for_users() {
        let alice = RequestContext::user("alice");

        assert_eq!(
            scope_filter(&alice, &ListFilter::All).unwrap(),
            ListFilter::ByUser("alice".to_string())
        );
        assert_eq!(
            scope_filter(&alice, &ListFilter::ByUser("alice".to_string())).unwrap(),
            ListFilter::ByUser("alice".to_string())
        );
        assert!(matches!(
            scope_filter(&alice, &ListFilter::ByUser("bob".to_string())),
            Err(FraudError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_scope_filter_for_admins() {
        let admin = RequestContext::admin("root");
        assert_eq!(scope_filter(&admin, &ListFilter::All).unwrap(), ListFilter::All);
        assert_eq!(
            scope_filter(&admin, &ListFilter::ByUser("bob".to_string())).unwrap(),
            ListFilter::ByUser("bob".to_string())
        );
    }
}
