//! # In-Memory Backend
//!
//! A self-contained collaborator for offline demo mode and for tests.
//! It holds a catalog, a session, a draft and the list of committed
//! transactions behind one mutex, and can be told to fail the next calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use scanpay_core::{LineItem, Money, Product, ProductId, Role, Session, TransactionId};

use crate::backend::{Backend, TransactionRequest};
use crate::error::{BackendError, BackendResult};

/// Which call an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Session,
    Catalog,
    FetchDraft,
    SaveDraft,
    Submit,
}

#[derive(Debug, Default)]
struct State {
    catalog: Vec<Product>,
    session: Option<Session>,
    draft: Vec<LineItem>,
    transactions: Vec<TransactionRequest>,
    next_transaction: u64,
    failures: Vec<(Call, VecDeque<BackendError>)>,
    calls: Vec<Call>,
}

impl State {
    fn record(&mut self, call: Call) -> BackendResult<()> {
        self.calls.push(call);
        let queued = self
            .failures
            .iter_mut()
            .find(|(c, _)| *c == call)
            .and_then(|(_, queue)| queue.pop_front());
        match queued {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    pub fn new(catalog: Vec<Product>) -> Self {
        let backend = InMemoryBackend::default();
        backend.lock().catalog = catalog;
        backend.lock().next_transaction = 1;
        backend
    }

    /// The offline demo: a handful of products and a signed-in manager.
    pub fn demo() -> Self {
        let backend = InMemoryBackend::new(demo_catalog());
        backend.set_session(Some(Session::new("kiosk", Role::StoreManager)));
        backend
    }

    // Poisoning only happens if a holder panicked; the state is still usable
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    pub fn set_catalog(&self, catalog: Vec<Product>) {
        self.lock().catalog = catalog;
    }

    pub fn set_draft(&self, items: Vec<LineItem>) {
        self.lock().draft = items;
    }

    /// Next transaction gets id `T-<n>`.
    pub fn set_next_transaction(&self, n: u64) {
        self.lock().next_transaction = n;
    }

    /// Queues an error for the next `call`; later calls succeed again.
    pub fn fail_next(&self, call: Call, err: BackendError) {
        let mut state = self.lock();
        match state.failures.iter_mut().find(|(c, _)| *c == call) {
            Some((_, queue)) => queue.push_back(err),
            None => state.failures.push((call, VecDeque::from([err]))),
        }
    }

    pub fn draft(&self) -> Vec<LineItem> {
        self.lock().draft.clone()
    }

    pub fn transactions(&self) -> Vec<TransactionRequest> {
        self.lock().transactions.clone()
    }

    /// How many times `call` has been attempted, failures included.
    pub fn call_count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn current_session(&self) -> BackendResult<Session> {
        let mut state = self.lock();
        state.record(Call::Session)?;
        state.session.clone().ok_or(BackendError::Unauthorized)
    }

    async fn fetch_catalog(&self) -> BackendResult<Vec<Product>> {
        let mut state = self.lock();
        state.record(Call::Catalog)?;
        Ok(state.catalog.clone())
    }

    async fn fetch_draft(&self) -> BackendResult<Vec<LineItem>> {
        let mut state = self.lock();
        state.record(Call::FetchDraft)?;
        Ok(state.draft.clone())
    }

    async fn save_draft(&self, items: &[LineItem]) -> BackendResult<()> {
        let mut state = self.lock();
        state.record(Call::SaveDraft)?;
        state.draft = items.to_vec();
        debug!(items = items.len(), "Draft stored in memory");
        Ok(())
    }

    async fn submit_transaction(&self, request: &TransactionRequest) -> BackendResult<TransactionId> {
        let mut state = self.lock();
        state.record(Call::Submit)?;
        if state.session.is_none() {
            return Err(BackendError::Unauthorized);
        }

        let id = TransactionId(format!("T-{}", state.next_transaction));
        state.next_transaction += 1;
        state.transactions.push(request.clone());
        state.draft.clear();
        Ok(id)
    }
}

fn demo_catalog() -> Vec<Product> {
    [
        (1, "A1", "Widget", 100),
        (2, "B2", "Gadget", 50),
        (3, "8901234567890", "Masala Chai 250g", 180),
        (4, "8909876543210", "Basmati Rice 1kg", 145),
        (5, "4006381333931", "Ballpoint Pen", 20),
    ]
    .into_iter()
    .map(|(id, sku, name, price)| Product::new(ProductId(id), sku, name, Money::from_minor(price)))
    .collect()
}
