//! Account discovery by cursor-paginated scan
//!
//! The enumerator walks the store's account keyspace page by page until the
//! cursor wraps back to zero. Every newly seen account is registered in the
//! cycle's [`CompletionSet`] and handed downstream with its completion handle.

use std::collections::HashSet;

use log::{debug, warn};

use super::completion::{Completion, CompletionSet};
use super::traits::LedgerStore;
use crate::types::StoreError;

/// Accounts discovered by one scan
#[derive(Debug, Default)]
pub struct Discovery {
    /// Non-empty pages of newly discovered accounts, in scan order
    pub pages: Vec<Vec<Completion>>,

    /// Set when a page read failed and the scan stopped early
    ///
    /// Pages read before the failure are still valid and must be processed.
    pub aborted: Option<StoreError>,
}

impl Discovery {
    /// Total number of discovered accounts
    pub fn account_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Cursor-paginated account scanner
pub struct AccountEnumerator<'a> {
    store: &'a dyn LedgerStore,
    page_size: usize,
}

impl<'a> AccountEnumerator<'a> {
    /// Create an enumerator reading `page_size` keys per round trip
    pub fn new(store: &'a dyn LedgerStore, page_size: usize) -> Self {
        Self { store, page_size }
    }

    /// Scan every payable account once
    ///
    /// Accounts the store repeats across pages are yielded only the first
    /// time they are seen, so each account is registered exactly once.
    pub async fn discover(&self, completions: &mut CompletionSet) -> Discovery {
        let mut seen: HashSet<String> = HashSet::new();
        let mut discovery = Discovery::default();
        let mut cursor = 0;

        loop {
            let page = match self.store.scan_accounts(cursor, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Account scan aborted after {} page(s): {}",
                        discovery.pages.len(),
                        e
                    );
                    discovery.aborted = Some(e);
                    break;
                }
            };

            let accounts: Vec<Completion> = page
                .addresses
                .into_iter()
                .filter(|address| seen.insert(address.clone()))
                .map(|address| completions.register(address))
                .collect();

            debug!(
                "Scan page at cursor {} yielded {} new account(s)",
                cursor,
                accounts.len()
            );

            if !accounts.is_empty() {
                discovery.pages.push(accounts);
            }

            // Cursor wraparound marks the end of the scan
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }

        discovery
    }
}
