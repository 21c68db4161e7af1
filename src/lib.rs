//! # mongo-connector
//!
//! Connection configuration and client construction for MongoDB.
//!
//! Options are collected with a fluent builder, validated when a
//! [`Database`] is created, and turned into a driver client either from a
//! full connection string or from host, credentials and replica set. The
//! client is reached through the [`DatabaseClient`] trait, so tests can
//! inject a [`MockClient`] instead of talking to a server.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mongo_connector::{bson::doc, ConnectionOptions, Context, Database, FindOptions};
//!
//! #[tokio::main]
//! async fn main() -> mongo_connector::Result<()> {
//!     let options = ConnectionOptions::builder()
//!         .host("cluster0.mongodb.net")
//!         .auth_source("admin")
//!         .username("app")
//!         .password("secret")
//!         .timeout(5000) // milliseconds
//!         .build();
//!
//!     let db = Database::connect(options).await?;
//!     let ctx = Context::background();
//!     db.ping(&ctx).await?;
//!
//!     let users = db
//!         .find(&ctx, "app", "users", doc! { "active": true }, FindOptions::default())
//!         .await?;
//!     println!("{} active users", users.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Testing
//!
//! ```ignore
//! let mock = Arc::new(MockClient::new());
//! mock.queue_find_one(Ok(doc! { "name": "Alice" }));
//! let db = Database::with_client(options, mock.clone())?;
//! ```

pub mod client;
pub mod context;
pub mod db;
pub mod error;
pub mod mock;
pub mod options;
pub mod resolver;

// Re-export main types
pub use client::{DatabaseClient, FindOptions, FindOptionsBuilder, MongoClient};
pub use context::Context;
pub use db::Database;
pub use error::{ErrorKind, MongoError, Result};
pub use mock::{FindCall, FindOneCall, MockClient, PingCall};
pub use options::{ConnectionOptions, ConnectionOptionsBuilder};
pub use resolver::{resolve, ConnectionSource, ConnectionTarget, Scheme};

// Re-export bson for convenience
pub use bson;
pub use bson::doc;

/// Prelude module for common imports.
pub mod prelude {
    pub use super::client::{DatabaseClient, FindOptions, MongoClient};
    pub use super::context::Context;
    pub use super::db::Database;
    pub use super::error::{ErrorKind, MongoError, Result};
    pub use super::mock::MockClient;
    pub use super::options::ConnectionOptions;
    pub use bson::{doc, Document};
}
