//! # Cart Store
//!
//! Single owner of the working cart. Every mutation goes through one mpsc
//! queue, so a scan-triggered add and a "+" press can never interleave.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartHandle (clone per caller)                                          │
//! │     │ CartCommand + oneshot reply                                       │
//! │     ▼                                                                   │
//! │  CartStore::run (one task)                                              │
//! │     1. apply the change to a working copy                               │
//! │     2. CartChange::Unchanged ──► reply, nothing else                    │
//! │     3. save working copy to the local slot                              │
//! │          err ──► reply Storage error, in-memory cart untouched          │
//! │     4. commit working copy                                              │
//! │     5. broadcast CartEvent::Changed(snapshot) ──► DraftSyncWorker       │
//! │     6. reply                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The remote draft is never awaited here; the broadcast is the whole of
//! this store's involvement in draft sync.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use scanpay_core::{Cart, CartChange, CartEvent, CartSnapshot, CoreError, CoreResult, Product, ProductId};
use scanpay_db::{CartSlotRepository, DbError};
use scanpay_sync::Backend;

/// Capacity of the cart event channel; slow subscribers skip to the latest.
const EVENT_CAPACITY: usize = 64;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error(transparent)]
    Rule(#[from] CoreError),

    #[error("Failed to save cart: {0}")]
    Storage(#[from] DbError),

    #[error("Cart store is not running")]
    Closed,
}

pub type CartStoreResult<T> = Result<T, CartStoreError>;

/// Where the starting cart came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationSource {
    /// The local slot held items.
    Local { items: usize },
    /// The local slot was empty; the server draft was adopted.
    Draft { items: usize },
    /// Nothing to restore.
    Empty,
}

// =============================================================================
// Commands
// =============================================================================

type Reply<T> = oneshot::Sender<T>;

enum Mutation {
    Add(Box<Product>),
    Increment(ProductId),
    Decrement(ProductId),
    Remove(ProductId),
}

enum CartCommand {
    Mutate {
        mutation: Mutation,
        reply: Reply<CartStoreResult<CartChange>>,
    },
    Snapshot {
        reply: Reply<CartSnapshot>,
    },
    Clear {
        reply: Reply<CartStoreResult<()>>,
    },
    Hydrate {
        reply: Reply<CartStoreResult<HydrationSource>>,
    },
}

// =============================================================================
// Store
// =============================================================================

pub struct CartStore {
    cart: Cart,
    slot: CartSlotRepository,
    backend: Arc<dyn Backend>,
    commands: mpsc::Receiver<CartCommand>,
    events: broadcast::Sender<CartEvent>,
}

/// Cloneable handle to the running store.
#[derive(Clone)]
pub struct CartHandle {
    commands: mpsc::Sender<CartCommand>,
    events: broadcast::Sender<CartEvent>,
}

impl CartStore {
    pub fn new(slot: CartSlotRepository, backend: Arc<dyn Backend>) -> (Self, CartHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let store = CartStore {
            cart: Cart::new(),
            slot,
            backend,
            commands: command_rx,
            events: event_tx.clone(),
        };

        let handle = CartHandle {
            commands: command_tx,
            events: event_tx,
        };

        (store, handle)
    }

    /// Runs until every handle is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Cart store starting");

        while let Some(command) = self.commands.recv().await {
            match command {
                CartCommand::Mutate { mutation, reply } => {
                    let result = self.mutate(mutation).await;
                    let _ = reply.send(result);
                }
                CartCommand::Snapshot { reply } => {
                    let _ = reply.send(self.cart.snapshot());
                }
                CartCommand::Clear { reply } => {
                    let result = self.clear().await;
                    let _ = reply.send(result);
                }
                CartCommand::Hydrate { reply } => {
                    let result = self.hydrate().await;
                    let _ = reply.send(result);
                }
            }
        }

        info!("Cart store stopped");
    }

    async fn mutate(&mut self, mutation: Mutation) -> CartStoreResult<CartChange> {
        let mut working = self.cart.clone();
        let change = apply(&mut working, &mutation)?;

        if !change.is_changed() {
            return Ok(change);
        }

        if let Err(e) = self.slot.save(&working).await {
            error!(error = %e, "Failed to persist cart; mutation discarded");
            return Err(e.into());
        }

        self.cart = working;
        debug!(?change, items = self.cart.item_count(), total = %self.cart.total(), "Cart updated");
        self.publish(CartEvent::Changed(self.cart.snapshot()));
        Ok(change)
    }

    /// Empties the cart. The in-memory cart is cleared even when removing
    /// the local slot fails, since a confirmed checkout must not leave items.
    ///
    /// If the slot row cannot be deleted it is overwritten with an empty
    /// cart instead; either way the next boot finds nothing to restore.
    async fn clear(&mut self) -> CartStoreResult<()> {
        self.cart.clear();
        self.publish(CartEvent::Cleared);

        if let Err(e) = self.slot.clear().await {
            warn!(error = %e, "Failed to remove local cart slot; writing an empty cart");
            if let Err(e) = self.slot.save(&Cart::new()).await {
                error!(error = %e, "Local cart slot still holds the previous cart");
                return Err(e.into());
            }
        }

        info!("Cart cleared");
        Ok(())
    }

    /// Restores the starting cart. Local items win; an empty or missing
    /// local slot consults the server draft once.
    async fn hydrate(&mut self) -> CartStoreResult<HydrationSource> {
        let local = match self.slot.load().await {
            Ok(cart) => cart,
            Err(DbError::CorruptSlot { slot, reason }) => {
                warn!(%slot, %reason, "Ignoring unreadable local cart");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(cart) = local.filter(|c| !c.is_empty()) {
            let items = cart.item_count();
            self.cart = cart;
            info!(items, "Cart restored from local storage");
            return Ok(HydrationSource::Local { items });
        }

        let draft = match self.backend.fetch_draft().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Could not fetch cart draft; starting empty");
                return Ok(HydrationSource::Empty);
            }
        };

        let cart = Cart::from_items(draft);
        if cart.is_empty() {
            debug!("No cart to restore");
            return Ok(HydrationSource::Empty);
        }

        // Write back so the next start is served locally
        if let Err(e) = self.slot.save(&cart).await {
            warn!(error = %e, "Failed to write adopted draft to local storage");
        }

        let items = cart.item_count();
        self.cart = cart;
        info!(items, "Cart restored from server draft");
        Ok(HydrationSource::Draft { items })
    }

    fn publish(&self, event: CartEvent) {
        // No subscribers is fine (draft sync disabled)
        let _ = self.events.send(event);
    }
}

fn apply(cart: &mut Cart, mutation: &Mutation) -> CoreResult<CartChange> {
    match mutation {
        Mutation::Add(product) => cart.add_or_increment(product),
        Mutation::Increment(id) => cart.increment(*id),
        Mutation::Decrement(id) => Ok(cart.decrement(*id)),
        Mutation::Remove(id) => Ok(cart.remove(*id)),
    }
}

// =============================================================================
// Handle
// =============================================================================

impl CartHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> CartCommand) -> CartStoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| CartStoreError::Closed)?;
        rx.await.map_err(|_| CartStoreError::Closed)
    }

    async fn mutate(&self, mutation: Mutation) -> CartStoreResult<CartChange> {
        self.request(|reply| CartCommand::Mutate { mutation, reply })
            .await?
    }

    pub async fn add_or_increment(&self, product: Product) -> CartStoreResult<CartChange> {
        self.mutate(Mutation::Add(Box::new(product))).await
    }

    pub async fn increment(&self, id: ProductId) -> CartStoreResult<CartChange> {
        self.mutate(Mutation::Increment(id)).await
    }

    pub async fn decrement(&self, id: ProductId) -> CartStoreResult<CartChange> {
        self.mutate(Mutation::Decrement(id)).await
    }

    pub async fn remove(&self, id: ProductId) -> CartStoreResult<CartChange> {
        self.mutate(Mutation::Remove(id)).await
    }

    pub async fn snapshot(&self) -> CartStoreResult<CartSnapshot> {
        self.request(|reply| CartCommand::Snapshot { reply }).await
    }

    pub async fn clear(&self) -> CartStoreResult<()> {
        self.request(|reply| CartCommand::Clear { reply }).await?
    }

    pub async fn hydrate(&self) -> CartStoreResult<HydrationSource> {
        self.request(|reply| CartCommand::Hydrate { reply }).await?
    }

    /// Events published after each persisted mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use scanpay_core::{LineItem, Money};
    use scanpay_db::{Database, DbConfig};
    use scanpay_sync::{Call, InMemoryBackend};

    pub(crate) fn widget() -> Product {
        Product::new(ProductId(1), "A1", "Widget", Money::from_minor(100))
    }

    pub(crate) fn gadget() -> Product {
        Product::new(ProductId(2), "B2", "Gadget", Money::from_minor(50))
    }

    pub(crate) async fn spawn_store(backend: &InMemoryBackend) -> (CartHandle, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, handle) = CartStore::new(db.cart_slot(), Arc::new(backend.clone()));
        tokio::spawn(store.run());
        (handle, db)
    }

    #[tokio::test]
    async fn test_total_of_reference_cart() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;

        cart.add_or_increment(widget()).await.unwrap();
        cart.add_or_increment(widget()).await.unwrap();
        cart.add_or_increment(gadget()).await.unwrap();

        let snapshot = cart.snapshot().await.unwrap();
        assert_eq!(snapshot.total, Money::from_minor(250));
        assert_eq!(snapshot.items.len(), 2);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted_locally() {
        let backend = InMemoryBackend::demo();
        let (cart, db) = spawn_store(&backend).await;

        cart.add_or_increment(widget()).await.unwrap();
        cart.increment(ProductId(1)).await.unwrap();

        let stored = db.cart_slot().load().await.unwrap().unwrap();
        assert_eq!(stored.get(ProductId(1)).unwrap().qty, 2);
    }

    #[tokio::test]
    async fn test_decrement_to_zero_removes_and_unknown_is_noop() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;
        let mut events = cart.subscribe();

        cart.add_or_increment(widget()).await.unwrap();
        assert_eq!(
            cart.decrement(ProductId(1)).await.unwrap(),
            CartChange::Removed
        );
        assert_eq!(
            cart.decrement(ProductId(42)).await.unwrap(),
            CartChange::Unchanged
        );
        assert!(cart.snapshot().await.unwrap().is_empty());

        // Add + remove published; the no-op did not
        assert!(matches!(events.recv().await.unwrap(), CartEvent::Changed(_)));
        assert!(matches!(events.recv().await.unwrap(), CartEvent::Changed(s) if s.is_empty()));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let backend = InMemoryBackend::demo();
        let (cart, _db) = spawn_store(&backend).await;
        cart.add_or_increment(widget()).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let cart = cart.clone();
            tasks.push(tokio::spawn(async move {
                cart.increment(ProductId(1)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = cart.snapshot().await.unwrap();
        assert_eq!(snapshot.items[0].qty, 21);
    }

    #[tokio::test]
    async fn test_hydrate_prefers_local() {
        let backend = InMemoryBackend::demo();
        backend.set_draft(vec![LineItem::from_product(&gadget())]);
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.cart_slot()
            .save(&Cart::from_items(vec![LineItem::from_product(&widget())]))
            .await
            .unwrap();

        let (store, cart) = CartStore::new(db.cart_slot(), Arc::new(backend.clone()));
        tokio::spawn(store.run());

        assert_eq!(
            cart.hydrate().await.unwrap(),
            HydrationSource::Local { items: 1 }
        );
        assert_eq!(cart.snapshot().await.unwrap().items[0].sku, "A1");
        assert_eq!(backend.call_count(Call::FetchDraft), 0);
    }

    #[tokio::test]
    async fn test_hydrate_adopts_draft_and_writes_back() {
        let backend = InMemoryBackend::demo();
        backend.set_draft(vec![LineItem::from_product(&gadget())]);
        let (cart, db) = spawn_store(&backend).await;

        assert_eq!(
            cart.hydrate().await.unwrap(),
            HydrationSource::Draft { items: 1 }
        );
        let stored = db.cart_slot().load().await.unwrap().unwrap();
        assert_eq!(stored.items()[0].sku, "B2");
    }

    #[tokio::test]
    async fn test_hydrate_survives_draft_failure() {
        let backend = InMemoryBackend::demo();
        backend.fail_next(Call::FetchDraft, scanpay_sync::BackendError::Timeout);
        let (cart, _db) = spawn_store(&backend).await;

        assert_eq!(cart.hydrate().await.unwrap(), HydrationSource::Empty);
        assert!(cart.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_slot_and_publishes() {
        let backend = InMemoryBackend::demo();
        let (cart, db) = spawn_store(&backend).await;
        cart.add_or_increment(widget()).await.unwrap();
        let mut events = cart.subscribe();

        cart.clear().await.unwrap();

        assert!(cart.snapshot().await.unwrap().is_empty());
        assert!(db.cart_slot().load().await.unwrap().is_none());
        assert_eq!(events.recv().await.unwrap(), CartEvent::Cleared);
    }

    #[tokio::test]
    async fn test_clear_when_delete_fails_does_not_restore_paid_items() {
        let backend = InMemoryBackend::demo();
        let (cart, db) = spawn_store(&backend).await;
        cart.add_or_increment(widget()).await.unwrap();
        cart.add_or_increment(gadget()).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER refuse_slot_delete BEFORE DELETE ON local_slots \
             BEGIN SELECT RAISE(ABORT, 'disk busy'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        cart.clear().await.unwrap();
        let stored = db.cart_slot().load().await.unwrap().unwrap();
        assert!(stored.is_empty());

        // Simulated restart on the same database
        let (store, restarted) = CartStore::new(db.cart_slot(), Arc::new(backend.clone()));
        tokio::spawn(store.run());

        assert_eq!(restarted.hydrate().await.unwrap(), HydrationSource::Empty);
        assert!(restarted.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_store() {
        let backend = InMemoryBackend::demo();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, cart) = CartStore::new(db.cart_slot(), Arc::new(backend));
        drop(store);

        assert!(matches!(
            cart.snapshot().await,
            Err(CartStoreError::Closed)
        ));
    }
}
