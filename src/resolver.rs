//! Decides how to reach the server from a set of [`ConnectionOptions`].
//!
//! A non-empty `uri` is used as is. Otherwise a connection string is
//! composed from the username, password, host and replica set, switching
//! to the SRV scheme for hosts on the managed cloud.

use crate::error::{MongoError, Result};
use crate::options::{redact_uri, ConnectionOptions};
use mongodb::event::command::CommandEvent;
use mongodb::event::EventHandler;
use mongodb::options::{AuthMechanism, ClientOptions, Credential, ServerApi, ServerApiVersion};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Hostname suffix of the managed cloud service.
pub const CLOUD_HOST_SUFFIX: &str = "mongodb.net";

/// Mechanism used when the component form leaves it empty.
pub const DEFAULT_AUTH_MECHANISM: &str = "SCRAM-SHA-256";

/// Everything but RFC 3986 unreserved characters is escaped in userinfo.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Which options produced the connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSource {
    /// The caller supplied a full connection string.
    Uri,
    /// Composed from host, credentials and replica set.
    Components,
}

/// Connection string scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `mongodb://`
    Standard,
    /// `mongodb+srv://`
    Srv,
}

impl Scheme {
    /// Scheme prefix including `://`.
    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Standard => "mongodb://",
            Scheme::Srv => "mongodb+srv://",
        }
    }
}

/// Explicit credential sent alongside a composed connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub username: String,
    pub password: String,
    pub source: String,
    pub mechanism: String,
}

impl fmt::Debug for CredentialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSpec")
            .field("username", &self.username)
            .field("password", &"***")
            .field("source", &self.source)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Outcome of [`resolve`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub source: ConnectionSource,
    pub uri: String,
    pub scheme: Scheme,
    /// Pin the stable server API (version 1).
    pub server_api: bool,
    pub retry_writes: bool,
    pub credential: Option<CredentialSpec>,
    pub timeout: Duration,
}

impl ConnectionTarget {
    /// The connection string with its password masked.
    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("source", &self.source)
            .field("uri", &self.redacted_uri())
            .field("scheme", &self.scheme)
            .field("server_api", &self.server_api)
            .field("retry_writes", &self.retry_writes)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Whether `host` belongs to the managed cloud service.
///
/// Matches the suffix on a label boundary, so `evilmongodb.net` is not a
/// cloud host.
pub fn is_cloud_host(host: &str) -> bool {
    match host.strip_suffix(CLOUD_HOST_SUFFIX) {
        Some(rest) => rest.is_empty() || rest.ends_with('.'),
        None => false,
    }
}

/// Pick the connection path for already validated options.
pub fn resolve(options: &ConnectionOptions) -> ConnectionTarget {
    let timeout = options.timeout_duration().unwrap_or_default();

    if options.uses_uri() {
        let scheme = if options.uri.starts_with(Scheme::Srv.prefix()) {
            Scheme::Srv
        } else {
            Scheme::Standard
        };
        return ConnectionTarget {
            source: ConnectionSource::Uri,
            uri: options.uri.clone(),
            scheme,
            server_api: true,
            retry_writes: options.retry_writes,
            credential: None,
            timeout,
        };
    }

    let cloud = is_cloud_host(&options.host);
    let scheme = if cloud { Scheme::Srv } else { Scheme::Standard };

    let mut uri = format!(
        "{}{}:{}@{}",
        scheme.prefix(),
        utf8_percent_encode(&options.username, USERINFO),
        utf8_percent_encode(&options.password, USERINFO),
        options.host
    );
    if !options.replica_set.is_empty() {
        uri = format!("{uri}/?replicaSet={}", options.replica_set);
    }

    let mechanism = if options.auth_mechanism.is_empty() {
        DEFAULT_AUTH_MECHANISM.to_string()
    } else {
        options.auth_mechanism.clone()
    };

    ConnectionTarget {
        source: ConnectionSource::Components,
        uri,
        scheme,
        server_api: cloud,
        retry_writes: options.retry_writes,
        credential: Some(CredentialSpec {
            username: options.username.clone(),
            password: options.password.clone(),
            source: options.auth_source.clone(),
            mechanism,
        }),
        timeout,
    }
}

/// Build driver options for `target`.
///
/// Parsing an SRV string performs DNS lookups, so callers bound this with
/// the connect timeout.
pub async fn driver_options(target: &ConnectionTarget) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(&target.uri)
        .await
        .map_err(MongoError::ConnectFailed)?;

    options.retry_writes = Some(target.retry_writes);
    if target.server_api {
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
    }
    if let Some(credential) = &target.credential {
        let mechanism = credential
            .mechanism
            .parse::<AuthMechanism>()
            .map_err(|_| MongoError::Configuration(vec!["auth_mechanism"]))?;
        options.credential = Some(
            Credential::builder()
                .username(credential.username.clone())
                .password(credential.password.clone())
                .source(credential.source.clone())
                .mechanism(mechanism)
                .build(),
        );
    }
    options.command_event_handler = Some(command_monitor());

    Ok(options)
}

/// Command event handler that reports driver commands through `tracing`.
pub fn command_monitor() -> EventHandler<CommandEvent> {
    EventHandler::callback(|event: CommandEvent| match event {
        CommandEvent::Started(ev) => debug!(
            request_id = ev.request_id,
            db = %ev.db,
            command = %ev.command_name,
            "command started"
        ),
        CommandEvent::Succeeded(ev) => debug!(
            request_id = ev.request_id,
            command = %ev.command_name,
            elapsed_ms = ev.duration.as_millis() as u64,
            "command succeeded"
        ),
        CommandEvent::Failed(ev) => warn!(
            request_id = ev.request_id,
            command = %ev.command_name,
            elapsed_ms = ev.duration.as_millis() as u64,
            error = %ev.failure,
            "command failed"
        ),
        _ => {}
    })
}
