//! Deposit partner search and account selection flow.
//!
//! The flow is an explicit finite state:
//!
//! ```text
//! Idle -> Searching -> ResultsShown -> Selected (account chosen or not)
//!            |              |
//!            +---> Error <--+
//! ```
//!
//! Every lookup gets a generation number and a cancellation token. Starting a
//! new lookup cancels the previous token; a response whose generation is no
//! longer current is dropped and reported as [`LookupOutcome::Superseded`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::directory::{Partner, PartnerAccount, PartnerDirectory};
use super::error::PaymentError;
use super::types::DepositPayload;

/// State of the deposit search/selection flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    /// Nothing searched yet.
    Idle,
    /// A partner search or account lookup is in flight.
    Searching {
        /// Term being searched.
        term: String,
    },
    /// Partner search results are available (possibly empty).
    ResultsShown {
        /// Term that produced the results.
        term: String,
        /// Matching partners.
        partners: Vec<Partner>,
    },
    /// A partner was chosen and has eligible accounts.
    Selected {
        /// Chosen partner.
        partner: Partner,
        /// Eligible accounts.
        accounts: Vec<PartnerAccount>,
        /// Chosen account, once the user picks one.
        account: Option<PartnerAccount>,
    },
    /// The last lookup failed or the chosen partner cannot receive deposits.
    Error {
        /// Message for the user.
        message: String,
        /// Whether repeating the same lookup may succeed.
        retryable: bool,
    },
}

/// Result of a lookup that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome<T> {
    /// The lookup completed and its result was applied.
    Ready(T),
    /// A newer lookup replaced this one; the response was discarded.
    Superseded,
    /// The lookup completed but the flow cannot continue (e.g. no eligible accounts).
    Blocked(String),
}

struct Inner {
    state: SearchState,
    generation: u64,
    in_flight: Option<CancellationToken>,
    /// Last partner list, kept while an account lookup is running.
    partners: Vec<Partner>,
}

/// Deposit search bound to a partner directory.
///
/// Methods take `&self` so a new search can supersede one that is still
/// awaiting the directory.
pub struct DepositSearch<D: PartnerDirectory> {
    directory: Arc<D>,
    min_term_len: usize,
    inner: Mutex<Inner>,
}

impl<D: PartnerDirectory> DepositSearch<D> {
    /// Creates an idle search.
    #[must_use]
    pub fn new(directory: Arc<D>, min_term_len: usize) -> Self {
        Self {
            directory,
            min_term_len,
            inner: Mutex::new(Inner {
                state: SearchState::Idle,
                generation: 0,
                in_flight: None,
                partners: Vec::new(),
            }),
        }
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> SearchState {
        self.inner.lock().await.state.clone()
    }

    /// Searches partners, superseding any in-flight lookup.
    ///
    /// Terms shorter than the configured minimum are rejected before the
    /// directory is called.
    ///
    /// # Errors
    ///
    /// * `PaymentError::Invalid` if the term is too short.
    /// * `PaymentError::Lookup` if the directory fails. The state moves to
    ///   a retryable `Error`.
    pub async fn search(&self, term: &str) -> Result<LookupOutcome<Vec<Partner>>, PaymentError> {
        let term = term.trim().to_string();
        if term.chars().count() < self.min_term_len {
            return Err(PaymentError::invalid(
                "search_term",
                format!(
                    "Search term must be at least {} characters",
                    self.min_term_len
                ),
            ));
        }

        let (generation, token) = self
            .begin(SearchState::Searching { term: term.clone() })
            .await;

        let result = tokio::select! {
            () = token.cancelled() => return Ok(LookupOutcome::Superseded),
            result = self.directory.search_partners(&term) => result,
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(%term, "Discarding superseded partner search response");
            return Ok(LookupOutcome::Superseded);
        }
        inner.in_flight = None;

        match result {
            Ok(partners) => {
                inner.partners.clone_from(&partners);
                inner.state = SearchState::ResultsShown {
                    term,
                    partners: partners.clone(),
                };
                Ok(LookupOutcome::Ready(partners))
            }
            Err(e) => {
                warn!(%term, error = %e, "Partner search failed");
                inner.state = SearchState::Error {
                    message: format!("Partner search failed: {e}"),
                    retryable: true,
                };
                Err(PaymentError::Lookup(e.0))
            }
        }
    }

    /// Chooses a partner from the shown results and loads its eligible accounts.
    ///
    /// A partner without eligible accounts yields
    /// [`LookupOutcome::Blocked`] and a non-retryable `Error` state.
    ///
    /// # Errors
    ///
    /// * `PaymentError::Invalid` if the partner is not among the shown results.
    /// * `PaymentError::Lookup` if the directory fails.
    pub async fn select_partner(
        &self,
        partner_id: &str,
    ) -> Result<LookupOutcome<Vec<PartnerAccount>>, PaymentError> {
        let partner = {
            let inner = self.inner.lock().await;
            let shown: &[Partner] = match &inner.state {
                SearchState::ResultsShown { partners, .. } => partners.as_slice(),
                SearchState::Selected { .. } | SearchState::Error { .. } => {
                    inner.partners.as_slice()
                }
                SearchState::Idle | SearchState::Searching { .. } => &[],
            };
            shown
                .iter()
                .find(|p| p.partner_id == partner_id)
                .cloned()
                .ok_or_else(|| {
                    PaymentError::invalid("partner_id", "Choose a partner from the search results")
                })?
        };

        let (generation, token) = self
            .begin(SearchState::Searching {
                term: partner.name.clone(),
            })
            .await;

        let result = tokio::select! {
            () = token.cancelled() => return Ok(LookupOutcome::Superseded),
            result = self.directory.list_accounts(&partner.partner_id) => result,
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(partner_id = %partner.partner_id, "Discarding superseded account lookup response");
            return Ok(LookupOutcome::Superseded);
        }
        inner.in_flight = None;

        match result {
            Ok(accounts) if accounts.is_empty() => {
                let message = format!("{} has no accounts eligible for deposits", partner.name);
                inner.state = SearchState::Error {
                    message: message.clone(),
                    retryable: false,
                };
                Ok(LookupOutcome::Blocked(message))
            }
            Ok(accounts) => {
                inner.state = SearchState::Selected {
                    partner,
                    accounts: accounts.clone(),
                    account: None,
                };
                Ok(LookupOutcome::Ready(accounts))
            }
            Err(e) => {
                warn!(partner_id = %partner.partner_id, error = %e, "Account lookup failed");
                inner.state = SearchState::Error {
                    message: format!("Account lookup failed: {e}"),
                    retryable: true,
                };
                Err(PaymentError::Lookup(e.0))
            }
        }
    }

    /// Chooses one of the selected partner's eligible accounts.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Invalid` if no partner is selected or the
    /// account is not eligible.
    pub async fn choose_account(&self, account_number: &str) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().await;
        let SearchState::Selected {
            accounts, account, ..
        } = &mut inner.state
        else {
            return Err(PaymentError::invalid(
                "partner_id",
                "Select a partner before choosing an account",
            ));
        };
        let chosen = accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .cloned()
            .ok_or_else(|| {
                PaymentError::invalid(
                    "account_number",
                    format!("Account {account_number} is not eligible for deposits"),
                )
            })?;
        *account = Some(chosen);
        Ok(())
    }

    /// Returns the resolved deposit payload.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Invalid` unless a partner and account are selected.
    pub async fn confirmed(&self) -> Result<DepositPayload, PaymentError> {
        match &self.inner.lock().await.state {
            SearchState::Selected {
                partner,
                account: Some(account),
                ..
            } => Ok(DepositPayload {
                partner_id: partner.partner_id.clone(),
                account_number: account.account_number.clone(),
                account_product_label: account.product_label.clone(),
            }),
            _ => Err(PaymentError::invalid(
                "account_number",
                "Select a partner account before capturing a deposit",
            )),
        }
    }

    /// Cancels any in-flight lookup and returns to `Idle`.
    pub async fn reset(&self) {
        self.begin(SearchState::Idle).await;
        let mut inner = self.inner.lock().await;
        inner.in_flight = None;
        inner.partners.clear();
    }

    async fn begin(&self, state: SearchState) -> (u64, CancellationToken) {
        let mut inner = self.inner.lock().await;
        if let Some(previous) = inner.in_flight.take() {
            previous.cancel();
        }
        inner.generation += 1;
        let token = CancellationToken::new();
        inner.in_flight = Some(token.clone());
        inner.state = state;
        (inner.generation, token)
    }
}
