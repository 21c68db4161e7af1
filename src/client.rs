//! The client capability set and its production implementation.

use crate::context::Context;
use crate::error::{MongoError, Result};
use crate::options::ConnectionOptions;
use crate::resolver::{driver_options, resolve};
use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{FindOneOptions as DriverFindOneOptions, FindOptions as DriverFindOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Operations available on a connected client.
///
/// Implemented by [`MongoClient`] for real servers and by
/// [`MockClient`](crate::mock::MockClient) for tests.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Check that the server is reachable.
    async fn ping(&self, ctx: &Context) -> Result<()>;

    /// Return every document in `database.collection` matching `filter`.
    async fn find(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>>;

    /// Return the first matching document, or [`MongoError::NotFound`].
    async fn find_one(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Document>;
}

/// Options for find operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Sort order.
    pub sort: Option<Document>,
    /// Projection (fields to include/exclude).
    pub projection: Option<Document>,
    /// Batch size for cursor.
    pub batch_size: Option<u32>,
}

impl FindOptions {
    /// Create new find options.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }

    fn to_driver(&self) -> DriverFindOptions {
        DriverFindOptions::builder()
            .limit(self.limit)
            .skip(self.skip)
            .sort(self.sort.clone())
            .projection(self.projection.clone())
            .batch_size(self.batch_size)
            .build()
    }

    /// Limit and batch size do not apply to a single document.
    fn to_driver_one(&self) -> DriverFindOneOptions {
        DriverFindOneOptions::builder()
            .skip(self.skip)
            .sort(self.sort.clone())
            .projection(self.projection.clone())
            .build()
    }
}

/// Builder for FindOptions.
#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Set the limit.
    pub fn limit(mut self, limit: i64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Set the skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Set the sort order.
    pub fn sort(mut self, sort: Document) -> Self {
        self.options.sort = Some(sort);
        self
    }

    /// Set the projection.
    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    /// Set the batch size.
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.options.batch_size = Some(batch_size);
        self
    }

    /// Build the options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Production client backed by the MongoDB driver.
///
/// Holds one driver handle; the driver pools connections internally, so a
/// `MongoClient` can be shared between tasks behind an `Arc`.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: mongodb::Client,
    options: ConnectionOptions,
}

impl MongoClient {
    /// Connect using validated `options`.
    ///
    /// Runs under the configured timeout. The driver connects lazily, so
    /// this only fails for unusable connection strings, DNS failures on
    /// SRV lookups, or when the timeout elapses.
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        let target = resolve(&options);
        info!(
            uri = %target.redacted_uri(),
            source = ?target.source,
            scheme = ?target.scheme,
            "connecting to MongoDB"
        );

        let connect = async {
            driver_options(&target).await.and_then(|driver| {
                mongodb::Client::with_options(driver).map_err(MongoError::ConnectFailed)
            })
        };

        let client = within_connect_timeout(target.timeout, connect)
            .await
            .map_err(|err| {
                warn!(uri = %target.redacted_uri(), error = %err, "failed to set up MongoDB client");
                err
            })?;

        Ok(Self { client, options })
    }

    /// Get the underlying driver client.
    pub fn inner(&self) -> &mongodb::Client {
        &self.client
    }

    /// Get the options the client was created with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn scoped(&self, ctx: &Context) -> Context {
        ctx.or_timeout(self.options.timeout_duration())
    }
}

/// Await `fut`, failing with [`MongoError::ConnectionTimeout`] once `timeout`
/// elapses.
async fn within_connect_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| MongoError::ConnectionTimeout(timeout))?
}

#[async_trait]
impl DatabaseClient for MongoClient {
    async fn ping(&self, ctx: &Context) -> Result<()> {
        self.scoped(ctx)
            .run(async {
                self.client
                    .database("admin")
                    .run_command(doc! { "ping": 1 })
                    .await?;
                Ok::<_, MongoError>(())
            })
            .await
    }

    async fn find(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let coll = self.client.database(database).collection::<Document>(collection);
        self.scoped(ctx)
            .run(async {
                let cursor = coll.find(filter).with_options(options.to_driver()).await?;
                let documents: Vec<Document> = cursor.try_collect().await?;
                Ok::<_, MongoError>(documents)
            })
            .await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        database: &str,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Document> {
        let coll = self.client.database(database).collection::<Document>(collection);
        self.scoped(ctx)
            .run(async {
                match coll.find_one(filter).with_options(options.to_driver_one()).await {
                    Ok(Some(document)) => Ok(document),
                    Ok(None) => Err(MongoError::NotFound),
                    Err(err) => Err(MongoError::from(err)),
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_options_builder() {
        let options = FindOptions::builder()
            .limit(100)
            .skip(10)
            .sort(doc! { "created_at": -1 })
            .projection(doc! { "name": 1, "email": 1 })
            .batch_size(50)
            .build();

        assert_eq!(options.limit, Some(100));
        assert_eq!(options.skip, Some(10));
        assert_eq!(options.sort, Some(doc! { "created_at": -1 }));
        assert_eq!(options.projection, Some(doc! { "name": 1, "email": 1 }));
        assert_eq!(options.batch_size, Some(50));
    }

    #[test]
    fn test_find_options_to_driver() {
        let options = FindOptions::builder()
            .limit(5)
            .skip(2)
            .sort(doc! { "name": 1 })
            .build();

        let many = options.to_driver();
        assert_eq!(many.limit, Some(5));
        assert_eq!(many.skip, Some(2));
        assert_eq!(many.sort, Some(doc! { "name": 1 }));
        assert!(many.projection.is_none());

        let one = options.to_driver_one();
        assert_eq!(one.skip, Some(2));
        assert_eq!(one.sort, Some(doc! { "name": 1 }));
    }

    #[tokio::test]
    async fn test_connect_is_lazy_for_standard_uri() {
        let options = ConnectionOptions::builder()
            .uri("mongodb://u:p@localhost:27017")
            .timeout(5000)
            .build();
        let client = MongoClient::connect(options.clone()).await.unwrap();
        assert_eq!(client.options(), &options);
    }

    #[tokio::test]
    async fn test_connect_with_components() {
        let options = ConnectionOptions::builder()
            .host("localhost:27017")
            .auth_source("admin")
            .username("user")
            .password("pass")
            .replica_set("rs0")
            .timeout(5000)
            .build();
        let client = MongoClient::connect(options).await.unwrap();
        assert_eq!(client.options().replica_set, "rs0");
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_uri() {
        let options = ConnectionOptions::builder()
            .uri("postgres://localhost")
            .timeout(5000)
            .build();
        let err = MongoClient::connect(options).await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(matches!(err, MongoError::ConnectFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_deadline_maps_to_connection_timeout() {
        let timeout = Duration::from_millis(250);
        let err = within_connect_timeout(timeout, std::future::pending::<Result<()>>())
            .await
            .unwrap_err();

        assert!(err.is_connection_error());
        assert!(err.is_timeout());
        assert_eq!(err.kind(), crate::error::ErrorKind::Connection);
        assert!(matches!(err, MongoError::ConnectionTimeout(d) if d == timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_error_inside_deadline_passes_through() {
        let err = within_connect_timeout(Duration::from_secs(1), async {
            Err::<(), _>(MongoError::connection("refused"))
        })
        .await
        .unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "connection error: refused");
    }

    #[tokio::test]
    async fn test_cancelled_ping_never_reaches_server() {
        let options = ConnectionOptions::builder()
            .uri("mongodb://localhost:1")
            .timeout(5000)
            .build();
        let client = MongoClient::connect(options).await.unwrap();

        let ctx = Context::with_timeout(Duration::from_secs(30));
        ctx.cancel();
        let err = client.ping(&ctx).await.unwrap_err();
        assert!(matches!(err, MongoError::Cancelled));
    }
}
