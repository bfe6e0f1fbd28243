use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::DebtParty;

use super::{CollectionVersions, CustomerDebtView};

/// debt views keyed by party and stamped with the collection generations they were built from
///
/// A lookup only hits when every generation still matches, so any write to
/// any collection invalidates the entry without explicit eviction.
#[derive(Debug, Clone, Default)]
pub struct DebtViewCache {
    entries: Arc<RwLock<HashMap<DebtParty, CustomerDebtView>>>,
}

impl DebtViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, party: DebtParty, versions: CollectionVersions) -> Option<CustomerDebtView> {
        let entries = self.entries.read().await;
        entries
            .get(&party)
            .filter(|view| view.versions == versions)
            .cloned()
    }

    pub async fn insert(&self, view: CustomerDebtView) {
        self.entries.write().await.insert(view.party, view);
    }

    pub async fn evict(&self, party: DebtParty) {
        self.entries.write().await.remove(&party);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::types::DebtStatus;
    use chrono::Utc;

    fn view(party: DebtParty, versions: CollectionVersions) -> CustomerDebtView {
        CustomerDebtView {
            party,
            total_order_value: Money::ZERO,
            total_paid: Money::ZERO,
            remaining_debt: Money::ZERO,
            payment_percentage: Rate::ZERO,
            debt_status: DebtStatus::Paid,
            lines: Vec::new(),
            unresolved: Vec::new(),
            lookup_failures: Vec::new(),
            next_due_date: None,
            overdue_amount: Money::ZERO,
            has_overdue: false,
            built_at: Utc::now(),
            versions,
        }
    }

    #[tokio::test]
    async fn test_generation_change_misses() {
        let cache = DebtViewCache::new();
        let party = DebtParty::Customer(1);
        let v1 = CollectionVersions::default();

        cache.insert(view(party, v1)).await;
        assert!(cache.get(party, v1).await.is_some());

        let after_commit = CollectionVersions { plans: 1, ..v1 };
        assert!(cache.get(party, after_commit).await.is_none());

        cache.evict(party).await;
        assert!(cache.is_empty().await);
    }
}
