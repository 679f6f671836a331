//! # Checkout Coordinator
//!
//! Owns the checkout state machine and the one rule that protects the
//! shopper: the cart is cleared if and only if a transaction was confirmed.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Idle ──initiate()──► AwaitingPaymentSelection ──cancel()──► Idle       │
//! │   ▲   (empty cart: EmptyCart,        │                                  │
//! │   │    no transition, no network)    │ confirm(method)                  │
//! │   │                                  ▼                                  │
//! │   │                          VerifyingSession ── no/invalid session ──┐ │
//! │   │                                  │          role not allowed ─────┤ │
//! │   │                                  ▼          timeout ──────────────┤ │
//! │   │                             Submitting ──── non-2xx / transport ──┤ │
//! │   │                                  │          timeout ──────────────┤ │
//! │   │                                  ▼                                │ │
//! │   │                             ReceiptReady                          │ │
//! │   │                                  │ receipt from local snapshot    │ │
//! │   │                                  │ cart cleared                   │ │
//! │   └──────────────────────────────────┴────────── Idle ◄───────────────┘ │
//! │                                                  (cart untouched)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout calls are never retried here; the shopper retries by paying
//! again, which is always possible because a failed checkout keeps the cart.

use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use scanpay_core::{PaymentMethod, Receipt, Session};
use scanpay_sync::{Backend, BackendError, BackendResult, TransactionRequest};

use crate::receipt::ReceiptPrinter;
use crate::store::{CartHandle, CartStoreError};

const GENERIC_FAILURE: &str = "Network error. Please try again.";

// =============================================================================
// Phase & Errors
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    AwaitingPaymentSelection,
    VerifyingSession,
    Submitting,
    ReceiptReady,
}

impl std::fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckoutPhase::Idle => "idle",
            CheckoutPhase::AwaitingPaymentSelection => "awaiting payment selection",
            CheckoutPhase::VerifyingSession => "verifying session",
            CheckoutPhase::Submitting => "submitting",
            CheckoutPhase::ReceiptReady => "receipt ready",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Please sign in to complete checkout")]
    AuthRequired,

    #[error("This account is not allowed to check out")]
    Forbidden,

    #[error("Cannot do that while checkout is {phase}")]
    InvalidState { phase: CheckoutPhase },

    #[error("{message}")]
    TransactionSubmitFailure { message: String },

    #[error("Checkout timed out. Please try again.")]
    Timeout,

    #[error("Cart is unavailable")]
    CartUnavailable,
}

impl From<CartStoreError> for CheckoutError {
    fn from(err: CartStoreError) -> Self {
        warn!(error = %err, "Cart store unavailable during checkout");
        CheckoutError::CartUnavailable
    }
}

impl CheckoutError {
    fn from_session_failure(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized | BackendError::Decode(_) => CheckoutError::AuthRequired,
            BackendError::Timeout => CheckoutError::Timeout,
            other => CheckoutError::TransactionSubmitFailure {
                message: failure_message(&other),
            },
        }
    }

    fn from_submit_failure(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized => CheckoutError::AuthRequired,
            BackendError::Timeout => CheckoutError::Timeout,
            other => CheckoutError::TransactionSubmitFailure {
                message: failure_message(&other),
            },
        }
    }
}

/// Server-provided text when there is one, else the generic message.
fn failure_message(err: &BackendError) -> String {
    match err {
        BackendError::Rejected {
            message: Some(message),
            ..
        } => message.clone(),
        _ => GENERIC_FAILURE.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub payment_delay: Duration,
    pub timeout: Duration,
    pub store_name: String,
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct CheckoutCoordinator {
    backend: Arc<dyn Backend>,
    cart: CartHandle,
    settings: CheckoutSettings,
    printer: Option<ReceiptPrinter>,
    phase: watch::Sender<CheckoutPhase>,
    last_receipt: Mutex<Option<Receipt>>,
    last_error: Mutex<Option<CheckoutError>>,
}

impl CheckoutCoordinator {
    pub fn new(backend: Arc<dyn Backend>, cart: CartHandle, settings: CheckoutSettings) -> Self {
        let (phase, _) = watch::channel(CheckoutPhase::Idle);
        CheckoutCoordinator {
            backend,
            cart,
            settings,
            printer: None,
            phase,
            last_receipt: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn with_printer(mut self, printer: ReceiptPrinter) -> Self {
        self.printer = Some(printer);
        self
    }

    pub fn phase(&self) -> CheckoutPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutPhase> {
        self.phase.subscribe()
    }

    pub fn last_receipt(&self) -> Option<Receipt> {
        lock(&self.last_receipt).clone()
    }

    pub fn last_error(&self) -> Option<CheckoutError> {
        lock(&self.last_error).clone()
    }

    /// Opens the payment selection. An empty cart is refused without a
    /// state change or any network call.
    pub async fn initiate(&self) -> Result<(), CheckoutError> {
        let snapshot = self.cart.snapshot().await?;
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.transition(CheckoutPhase::Idle, CheckoutPhase::AwaitingPaymentSelection)?;
        info!(items = snapshot.items.len(), total = %snapshot.total, "Awaiting payment selection");
        Ok(())
    }

    /// Abandons the payment selection. No side effects.
    pub fn cancel(&self) -> Result<(), CheckoutError> {
        match self.phase() {
            CheckoutPhase::Idle => Ok(()),
            CheckoutPhase::AwaitingPaymentSelection => {
                self.transition(CheckoutPhase::AwaitingPaymentSelection, CheckoutPhase::Idle)?;
                info!("Checkout cancelled");
                Ok(())
            }
            phase => Err(CheckoutError::InvalidState { phase }),
        }
    }

    /// Pays with `method`, verifies the session and commits the transaction.
    ///
    /// On success the receipt is built from the submitted snapshot and the
    /// cart is cleared. On failure the cart is left exactly as it was.
    pub async fn confirm(&self, method: PaymentMethod) -> Result<Receipt, CheckoutError> {
        self.transition(CheckoutPhase::AwaitingPaymentSelection, CheckoutPhase::VerifyingSession)?;
        let _idle = IdleOnDrop(&self.phase);

        let result = self.run_checkout(method).await;

        match &result {
            Ok(receipt) => {
                *lock(&self.last_receipt) = Some(receipt.clone());
                *lock(&self.last_error) = None;
            }
            Err(err) => {
                warn!(error = %err, "Checkout failed; cart kept");
                *lock(&self.last_error) = Some(err.clone());
            }
        }

        result
    }

    async fn run_checkout(&self, method: PaymentMethod) -> Result<Receipt, CheckoutError> {
        // Stand-in for the payment terminal round-trip
        tokio::time::sleep(self.settings.payment_delay).await;

        let session = self
            .bounded(self.backend.current_session())
            .await
            .map_err(CheckoutError::from_session_failure)?;
        if !session.can_checkout() {
            return Err(self.forbidden(&session));
        }

        self.phase.send_replace(CheckoutPhase::Submitting);
        let snapshot = self.cart.snapshot().await?;
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let request = TransactionRequest::from_snapshot(&snapshot, method);
        info!(items = request.items.len(), total = %request.total, %method, "Submitting transaction");
        let transaction_id = self
            .bounded(self.backend.submit_transaction(&request))
            .await
            .map_err(CheckoutError::from_submit_failure)?;

        self.phase.send_replace(CheckoutPhase::ReceiptReady);
        let receipt = Receipt::from_snapshot(
            &snapshot,
            transaction_id,
            method,
            Utc::now(),
            &self.settings.store_name,
        );
        info!(transaction_id = %receipt.transaction_id, total = %receipt.total, "Transaction confirmed");

        // The sale is committed; a local storage error must not undo it
        if let Err(e) = self.cart.clear().await {
            error!(error = %e, "Cart clear after checkout did not fully succeed");
        }

        if let Some(printer) = &self.printer {
            if let Err(e) = printer.print(&receipt) {
                warn!(error = %e, "Receipt printing failed");
            }
        }

        Ok(receipt)
    }

    async fn bounded<T>(&self, call: impl Future<Output = BackendResult<T>>) -> BackendResult<T> {
        match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        }
    }

    fn forbidden(&self, session: &Session) -> CheckoutError {
        warn!(user = %session.user, role = ?session.role, "Checkout refused for role");
        CheckoutError::Forbidden
    }

    fn transition(&self, from: CheckoutPhase, to: CheckoutPhase) -> Result<(), CheckoutError> {
        let mut current = from;
        let moved = self.phase.send_if_modified(|phase| {
            current = *phase;
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else {
            Err(CheckoutError::InvalidState { phase: current })
        }
    }
}

/// Puts the phase back to `Idle` when a confirm ends, including when the
/// caller drops it mid-flight.
struct IdleOnDrop<'a>(&'a watch::Sender<CheckoutPhase>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(CheckoutPhase::Idle);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{gadget, spawn_store, widget};
    use scanpay_core::{LineItem, Money, Role};
    use scanpay_sync::{Call, InMemoryBackend};

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            payment_delay: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
            store_name: "Corner Mart".into(),
        }
    }

    /// Cart [{A1, 100, qty 2}, {B2, 50, qty 1}].
    async fn reference_setup(backend: &InMemoryBackend) -> (CheckoutCoordinator, CartHandle) {
        let (cart, _db) = spawn_store(backend).await;
        cart.add_or_increment(widget()).await.unwrap();
        cart.add_or_increment(widget()).await.unwrap();
        cart.add_or_increment(gadget()).await.unwrap();
        let checkout = CheckoutCoordinator::new(Arc::new(backend.clone()), cart.clone(), settings());
        (checkout, cart)
    }

    fn reference_items() -> Vec<LineItem> {
        let mut a1 = LineItem::from_product(&widget());
        a1.qty = 2;
        vec![a1, LineItem::from_product(&gadget())]
    }

    #[tokio::test]
    async fn test_initiate_on_empty_cart_makes_no_calls() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;
        let checkout = CheckoutCoordinator::new(Arc::new(backend.clone()), cart, settings());

        assert_eq!(checkout.initiate().await, Err(CheckoutError::EmptyCart));
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
        assert_eq!(backend.call_count(Call::Session), 0);
        assert_eq!(backend.call_count(Call::Submit), 0);
    }

    #[tokio::test]
    async fn test_successful_checkout_clears_cart_and_builds_receipt() {
        let backend = InMemoryBackend::demo();
        backend.set_next_transaction(9);
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        assert_eq!(checkout.phase(), CheckoutPhase::AwaitingPaymentSelection);

        let receipt = checkout.confirm(PaymentMethod::Cash).await.unwrap();

        assert_eq!(receipt.transaction_id.0, "T-9");
        assert_eq!(receipt.total, Money::from_minor(250));
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[0].name, "Widget");
        assert_eq!(receipt.items[0].qty, 2);
        assert_eq!(receipt.items[1].name, "Gadget");
        assert_eq!(receipt.payment_method, PaymentMethod::Cash);

        assert!(cart.snapshot().await.unwrap().is_empty());
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
        assert_eq!(checkout.last_receipt(), Some(receipt));
        assert_eq!(backend.transactions()[0].items, reference_items());
    }

    #[tokio::test]
    async fn test_unauthorized_keeps_cart() {
        let backend = InMemoryBackend::demo();
        backend.set_session(None);
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        let err = checkout.confirm(PaymentMethod::Card).await.unwrap_err();

        assert_eq!(err, CheckoutError::AuthRequired);
        assert_eq!(cart.snapshot().await.unwrap().items, reference_items());
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
        assert_eq!(checkout.last_error(), Some(CheckoutError::AuthRequired));
        assert_eq!(backend.call_count(Call::Submit), 0);
    }

    #[tokio::test]
    async fn test_submit_401_is_auth_required() {
        let backend = InMemoryBackend::demo();
        backend.fail_next(Call::Submit, BackendError::Unauthorized);
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::AuthRequired)
        );
        assert_eq!(cart.snapshot().await.unwrap().items, reference_items());
    }

    #[tokio::test]
    async fn test_role_without_checkout_is_forbidden() {
        let backend = InMemoryBackend::demo();
        backend.set_session(Some(Session::new("sam", Role::Staff)));
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::Forbidden)
        );
        assert!(!cart.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_message_surfaced_and_retry_works() {
        let backend = InMemoryBackend::demo();
        backend.fail_next(
            Call::Submit,
            BackendError::Rejected {
                status: 400,
                message: Some("Insufficient stock for Widget".into()),
            },
        );
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::TransactionSubmitFailure {
                message: "Insufficient stock for Widget".into()
            })
        );
        assert_eq!(cart.snapshot().await.unwrap().items, reference_items());

        // Same cart, second attempt
        checkout.initiate().await.unwrap();
        assert!(checkout.confirm(PaymentMethod::Cash).await.is_ok());
        assert!(cart.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_uses_generic_message() {
        let backend = InMemoryBackend::demo();
        backend.fail_next(Call::Submit, BackendError::Transport("reset".into()));
        let (checkout, _cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::TransactionSubmitFailure {
                message: GENERIC_FAILURE.into()
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_returns_to_idle_without_calls() {
        let backend = InMemoryBackend::demo();
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        checkout.cancel().unwrap();

        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
        assert_eq!(backend.call_count(Call::Session), 0);
        assert_eq!(cart.snapshot().await.unwrap().items, reference_items());
    }

    #[tokio::test]
    async fn test_abandoned_confirm_returns_to_idle() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;
        cart.add_or_increment(widget()).await.unwrap();
        let slow = CheckoutSettings {
            payment_delay: Duration::from_secs(5),
            ..settings()
        };
        let checkout = CheckoutCoordinator::new(Arc::new(backend.clone()), cart.clone(), slow);

        checkout.initiate().await.unwrap();
        let mut phases = checkout.subscribe();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), checkout.confirm(PaymentMethod::Card)).await;

        assert!(abandoned.is_err());
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
        assert!(phases.has_changed().unwrap());
        assert_eq!(cart.snapshot().await.unwrap().items.len(), 1);
        assert_eq!(backend.call_count(Call::Submit), 0);

        // A new checkout can start
        checkout.initiate().await.unwrap();
        assert_eq!(checkout.phase(), CheckoutPhase::AwaitingPaymentSelection);
    }

    #[tokio::test]
    async fn test_confirm_without_initiate_is_invalid() {
        let backend = InMemoryBackend::demo();
        let (checkout, _cart) = reference_setup(&backend).await;

        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::InvalidState {
                phase: CheckoutPhase::Idle
            })
        );
    }

    #[tokio::test]
    async fn test_cart_emptied_while_awaiting_payment() {
        let backend = InMemoryBackend::demo();
        let (checkout, cart) = reference_setup(&backend).await;

        checkout.initiate().await.unwrap();
        cart.remove(widget().id).await.unwrap();
        cart.remove(gadget().id).await.unwrap();

        assert_eq!(
            checkout.confirm(PaymentMethod::Cash).await,
            Err(CheckoutError::EmptyCart)
        );
        assert_eq!(backend.call_count(Call::Submit), 0);
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
    }

    /// A backend whose transaction call never answers.
    struct HangingBackend(InMemoryBackend);

    #[async_trait::async_trait]
    impl Backend for HangingBackend {
        async fn current_session(&self) -> BackendResult<Session> {
            self.0.current_session().await
        }
        async fn fetch_catalog(&self) -> BackendResult<Vec<scanpay_core::Product>> {
            self.0.fetch_catalog().await
        }
        async fn fetch_draft(&self) -> BackendResult<Vec<LineItem>> {
            self.0.fetch_draft().await
        }
        async fn save_draft(&self, items: &[LineItem]) -> BackendResult<()> {
            self.0.save_draft(items).await
        }
        async fn submit_transaction(
            &self,
            _request: &TransactionRequest,
        ) -> BackendResult<scanpay_core::TransactionId> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_submit_timeout_keeps_cart() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;
        cart.add_or_increment(widget()).await.unwrap();
        let checkout = CheckoutCoordinator::new(
            Arc::new(HangingBackend(backend.clone())),
            cart.clone(),
            CheckoutSettings {
                timeout: Duration::from_millis(100),
                ..settings()
            },
        );

        checkout.initiate().await.unwrap();
        assert_eq!(
            checkout.confirm(PaymentMethod::Card).await,
            Err(CheckoutError::Timeout)
        );
        assert_eq!(cart.snapshot().await.unwrap().items.len(), 1);
        assert_eq!(checkout.phase(), CheckoutPhase::Idle);
    }
}
