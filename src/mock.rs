//! In-memory stand-in for [`MongoClient`](crate::client::MongoClient).
//!
//! Each operation resolves, in order, to the next queued response, the
//! override installed with `on_*`/`expect_*`, or a built-in default:
//! ping succeeds, find returns no documents, find-one is
//! [`MongoError::NotFound`]. Every call is recorded before it is answered.
//!
//! ```ignore
//! let mock = Arc::new(MockClient::new());
//! mock.queue_find(Ok(vec![doc! { "name": "Alice" }]))
//!     .queue_find(Err(MongoError::operation("connection timeout")));
//!
//! let db = Database::with_client(options, mock.clone())?;
//! db.ping(&Context::background()).await?;
//! assert_eq!(mock.ping_count(), 1);
//! ```

use crate::client::{DatabaseClient, FindOptions};
use crate::context::Context;
use crate::error::{MongoError, Result};
use async_trait::async_trait;
use bson::Document;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Override for ping.
pub type PingFn = Arc<dyn Fn(&Context) -> Result<()> + Send + Sync>;
/// Override for find.
pub type FindFn = Arc<dyn Fn(&FindCall) -> Result<Vec<Document>> + Send + Sync>;
/// Override for find-one.
pub type FindOneFn = Arc<dyn Fn(&FindCall) -> Result<Document> + Send + Sync>;

/// A recorded ping.
#[derive(Debug, Clone)]
pub struct PingCall {
    pub ctx: Context,
}

/// A recorded find or find-one.
#[derive(Debug, Clone)]
pub struct FindCall {
    pub ctx: Context,
    pub database: String,
    pub collection: String,
    pub filter: Document,
    pub options: FindOptions,
}

/// A recorded find-one.
pub type FindOneCall = FindCall;

#[derive(Default)]
struct MockState {
    ping_fn: Option<PingFn>,
    find_fn: Option<FindFn>,
    find_one_fn: Option<FindOneFn>,

    ping_queue: VecDeque<Result<()>>,
    find_queue: VecDeque<Result<Vec<Document>>>,
    find_one_queue: VecDeque<Result<Document>>,

    ping_calls: Vec<PingCall>,
    find_calls: Vec<FindCall>,
    find_one_calls: Vec<FindOneCall>,
}

/// Scriptable [`DatabaseClient`] that records its calls.
///
/// State sits behind a mutex so the mock can be handed to a
/// [`Database`](crate::Database) as an `Arc` and inspected afterwards.
#[derive(Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    /// Mock that answers every call with its default response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer pings with `f` once the queue is empty.
    pub fn on_ping<F>(&self, f: F) -> &Self
    where
        F: Fn(&Context) -> Result<()> + Send + Sync + 'static,
    {
        self.state.lock().ping_fn = Some(Arc::new(f));
        self
    }

    /// Answer finds with `f` once the queue is empty.
    pub fn on_find<F>(&self, f: F) -> &Self
    where
        F: Fn(&FindCall) -> Result<Vec<Document>> + Send + Sync + 'static,
    {
        self.state.lock().find_fn = Some(Arc::new(f));
        self
    }

    /// Answer find-ones with `f` once the queue is empty.
    pub fn on_find_one<F>(&self, f: F) -> &Self
    where
        F: Fn(&FindCall) -> Result<Document> + Send + Sync + 'static,
    {
        self.state.lock().find_one_fn = Some(Arc::new(f));
        self
    }

    /// Always answer ping with `response`.
    pub fn expect_ping(&self, response: Result<()>) -> &Self {
        self.on_ping(move |_| response.clone())
    }

    /// Always answer find with `response`.
    pub fn expect_find(&self, response: Result<Vec<Document>>) -> &Self {
        self.on_find(move |_| response.clone())
    }

    /// Always answer find-one with `response`.
    pub fn expect_find_one(&self, response: Result<Document>) -> &Self {
        self.on_find_one(move |_| response.clone())
    }

    /// Answer the next unanswered ping with `response`.
    pub fn queue_ping(&self, response: Result<()>) -> &Self {
        self.state.lock().ping_queue.push_back(response);
        self
    }

    /// Answer the next unanswered find with `response`.
    pub fn queue_find(&self, response: Result<Vec<Document>>) -> &Self {
        self.state.lock().find_queue.push_back(response);
        self
    }

    /// Answer the next unanswered find-one with `response`.
    pub fn queue_find_one(&self, response: Result<Document>) -> &Self {
        self.state.lock().find_one_queue.push_back(response);
        self
    }

    /// Forget recorded calls and queued responses. Overrides are kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.ping_calls.clear();
        state.find_calls.clear();
        state.find_one_calls.clear();
        state.ping_queue.clear();
        state.find_queue.clear();
        state.find_one_queue.clear();
    }

    /// Recorded pings, oldest first.
    pub fn ping_calls(&self) -> Vec<PingCall> {
        self.state.lock().ping_calls.clone()
    }

    /// Recorded finds, oldest first.
    pub fn find_calls(&self) -> Vec<FindCall> {
        self.state.lock().find_calls.clone()
    }

    /// Recorded find-ones, oldest first.
    pub fn find_one_calls(&self) -> Vec<FindOneCall> {
        self.state.lock().find_one_calls.clone()
    }

    /// Number of pings recorded since creation or the last reset.
    pub fn ping_count(&self) -> usize {
        self.state.lock().ping_calls.len()
    }

    /// Number of finds recorded.
    pub fn find_count(&self) -> usize {
        self.state.lock().find_calls.len()
    }

    /// Number of find-ones recorded.
    pub fn find_one_count(&self) -> usize {
        self.state.lock().find_one_calls.len()
    }

    /// Responses still waiting in the ping queue.
    pub fn queued_pings(&self) -> usize {
        self.state.lock().ping_queue.len()
    }

    /// Responses still waiting in the find queue.
    pub fn queued_finds(&self) -> usize {
        self.state.lock().find_queue.len()
    }

    /// Responses still waiting in the find-one queue.
    pub fn queued_find_ones(&self) -> usize {
        self.state.lock().find_one_queue.len()
    }
}

impl fmt::Debug for MockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockClient")
            .field("ping_calls", &state.ping_calls.len())
            .field("find_calls", &state.find_calls.len())
            .field("find_one_calls", &state.find_one_calls.len())
            .field("ping_queue", &state.ping_queue.len())
            .field("find_queue", &state.find_queue.len())
            .field("find_one_queue", &state.find_one_queue.len())
            .finish()
    }
}

#[async_trait]
impl DatabaseClient for MockClient {
    async fn ping(&self, ctx: &Context) -> Result<()> {
        // Overrides run after the lock is released so they may call back in.
        let (queued, handler) = {
            let mut state = self.state.lock();
            state.ping_calls.push(PingCall { ctx: ctx.clone() });
            (state.ping_queue.pop_front(), state.ping_fn.clone())
        };

        if let Some(response) = queued {
            debug!("mock ping answered from queue");
            return response;
        }
        match handler {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    async fn find(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let call = FindCall {
            ctx: ctx.clone(),
            database: database.to_string(),
            collection: collection.to_string(),
            filter,
            options,
        };
        let (queued, handler) = {
            let mut state = self.state.lock();
            state.find_calls.push(call.clone());
            (state.find_queue.pop_front(), state.find_fn.clone())
        };

        if let Some(response) = queued {
            debug!(database, collection, "mock find answered from queue");
            return response;
        }
        match handler {
            Some(f) => f(&call),
            None => Ok(Vec::new()),
        }
    }

    async fn find_one(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Document> {
        let call = FindCall {
            ctx: ctx.clone(),
            database: database.to_string(),
            collection: collection.to_string(),
            filter,
            options,
        };
        let (queued, handler) = {
            let mut state = self.state.lock();
            state.find_one_calls.push(call.clone());
            (state.find_one_queue.pop_front(), state.find_one_fn.clone())
        };

        if let Some(response) = queued {
            debug!(database, collection, "mock find_one answered from queue");
            return response;
        }
        match handler {
            Some(f) => f(&call),
            None => Err(MongoError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    fn ctx() -> Context {
        Context::background()
    }

    #[tokio::test]
    async fn test_defaults() {
        let mock = MockClient::new();

        assert!(mock.ping(&ctx()).await.is_ok());

        let found = mock
            .find(&ctx(), "testdb", "users", doc! { "id": 1 }, FindOptions::default())
            .await
            .unwrap();
        assert!(found.is_empty());

        let err = mock
            .find_one(&ctx(), "testdb", "users", doc! { "id": 1 }, FindOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_expect_ping_error_is_recorded() {
        let mock = MockClient::new();
        mock.expect_ping(Err(MongoError::operation("connection failed")));

        let err = mock.ping(&ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "operation error: connection failed");
        assert_eq!(mock.ping_count(), 1);
    }

    #[tokio::test]
    async fn test_find_call_captures_arguments() {
        let mock = MockClient::new();
        let options = FindOptions::builder().limit(10).build();
        mock.find(&ctx(), "testdb", "users", doc! { "active": true }, options.clone())
            .await
            .unwrap();

        let calls = mock.find_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].database, "testdb");
        assert_eq!(calls[0].collection, "users");
        assert_eq!(calls[0].filter, doc! { "active": true });
        assert_eq!(calls[0].options, options);
    }

    #[tokio::test]
    async fn test_queue_takes_precedence_then_falls_back() {
        let mock = MockClient::new();
        mock.expect_find(Ok(vec![doc! { "source": "override" }]));
        mock.queue_find(Ok(vec![doc! { "n": 1 }]))
            .queue_find(Err(MongoError::operation("connection timeout")));

        let first = mock
            .find(&ctx(), "db", "c", doc! {}, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(first, vec![doc! { "n": 1 }]);

        let second = mock
            .find(&ctx(), "db", "c", doc! {}, FindOptions::default())
            .await
            .unwrap_err();
        assert_eq!(second.to_string(), "operation error: connection timeout");

        let third = mock
            .find(&ctx(), "db", "c", doc! {}, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(third, vec![doc! { "source": "override" }]);
        assert_eq!(mock.find_count(), 3);
        assert_eq!(mock.queued_finds(), 0);
    }

    #[tokio::test]
    async fn test_queued_ping() {
        let mock = MockClient::new();
        mock.queue_ping(Err(MongoError::Timeout)).queue_ping(Ok(()));

        assert!(mock.ping(&ctx()).await.unwrap_err().is_timeout());
        assert!(mock.ping(&ctx()).await.is_ok());
        assert!(mock.ping(&ctx()).await.is_ok());
        assert_eq!(mock.ping_count(), 3);
    }

    #[tokio::test]
    async fn test_reset_keeps_overrides() {
        let mock = MockClient::new();
        mock.expect_find_one(Ok(doc! { "name": "Alice" }));
        mock.queue_find(Ok(vec![doc! { "id": 1 }]))
            .queue_find_one(Ok(doc! { "id": 1 }))
            .queue_ping(Ok(()));

        mock.ping(&ctx()).await.unwrap();
        mock.reset();

        assert_eq!(mock.ping_count(), 0);
        assert_eq!(mock.queued_pings(), 0);
        assert_eq!(mock.queued_finds(), 0);
        assert_eq!(mock.queued_find_ones(), 0);

        let found = mock
            .find_one(&ctx(), "db", "users", doc! {}, FindOptions::default())
            .await
            .unwrap();
        assert_eq!(found, doc! { "name": "Alice" });
    }

    #[tokio::test]
    async fn test_override_may_reenter_mock() {
        let mock = Arc::new(MockClient::new());
        let inner = Arc::clone(&mock);
        mock.on_ping(move |_| {
            // Reading state from inside an override must not deadlock.
            assert_eq!(inner.ping_count(), 1);
            Ok(())
        });

        mock.ping(&ctx()).await.unwrap();
    }
}
