//! Database configuration audit. Every (database, credential) pair gets a
//! fresh connection and an ordered diagnostic battery; the first failing or
//! misconfigured step classifies the pair into exactly one error kind.
//!
//! No caching or pooling: each audit is a point-in-time reading, and the
//! connection is dropped on every exit path. Cost is O(databases x users)
//! connections per cycle.

use crate::config::{Credential, DatabaseTarget, Dialect};
use crate::detectors::{Detector, DetectorError};
use crate::store::{AuditKind, SecurityStore, Vulnerability};
use mysql::prelude::Queryable;
use tracing::{debug, warn};

const MAX_CONNECTIONS_LIMIT: i64 = 100;
const SUPERUSER_RESERVED_LIMIT: i64 = 3;

/// Mutually exclusive audit outcome, one per misconfigured pair.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("ConnectionError: {0}")]
    Connection(String),
    #[error("AccessControlError: {0}")]
    AccessControl(String),
    #[error("TLSError: {0}")]
    Tls(String),
    #[error("EncryptionError: {0}")]
    Encryption(String),
    #[error("NetworkExposureError: {0}")]
    NetworkExposure(String),
}

impl AuditError {
    pub fn kind(&self) -> AuditKind {
        match self {
            AuditError::Connection(_) => AuditKind::Connection,
            AuditError::AccessControl(_) => AuditKind::AccessControl,
            AuditError::Tls(_) => AuditKind::Tls,
            AuditError::Encryption(_) => AuditKind::Encryption,
            AuditError::NetworkExposure(_) => AuditKind::NetworkExposure,
        }
    }
}

/// Point-in-time Postgres settings the battery evaluates.
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    /// `password_encryption` value
    pub auth_method: String,
    /// `ssl` is `on`
    pub ssl: bool,
    /// `ssl_cert_file` present and non-null
    pub encryption_configured: bool,
    /// `listen_addresses` value
    pub listen_addresses: String,
    pub max_connections: i64,
    pub superuser_reserved_connections: i64,
}

/// Point-in-time MySQL settings the battery evaluates.
#[derive(Debug, Clone)]
pub struct MysqlSettings {
    /// `have_ssl` value
    pub have_ssl: String,
    /// `bind_address` value
    pub bind_address: String,
    pub max_connections: i64,
}

/// Ordered Postgres battery: access control, TLS, encryption, network
/// exposure. Stops at the first misconfigured step.
pub fn evaluate_postgres(settings: &PostgresSettings) -> Result<(), AuditError> {
    if !settings.auth_method.contains("md5") && !settings.auth_method.contains("scram-sha-256") {
        return Err(AuditError::AccessControl(
            "access control is not enabled or an insecure authentication mechanism is used"
                .to_string(),
        ));
    }
    if !settings.ssl {
        return Err(AuditError::Tls(
            "TLS is not used for all connections".to_string(),
        ));
    }
    if !settings.encryption_configured {
        return Err(AuditError::Encryption("data is not encrypted".to_string()));
    }
    if settings.listen_addresses != "localhost"
        || settings.max_connections > MAX_CONNECTIONS_LIMIT
        || settings.superuser_reserved_connections > SUPERUSER_RESERVED_LIMIT
    {
        return Err(AuditError::NetworkExposure(
            "network exposure is not limited".to_string(),
        ));
    }
    Ok(())
}

/// Ordered MySQL battery: TLS, then network exposure.
pub fn evaluate_mysql(settings: &MysqlSettings) -> Result<(), AuditError> {
    if settings.have_ssl != "YES" {
        return Err(AuditError::Tls(
            "TLS is not used for all connections".to_string(),
        ));
    }
    if settings.bind_address != "127.0.0.1" || settings.max_connections > MAX_CONNECTIONS_LIMIT {
        return Err(AuditError::NetworkExposure(
            "network exposure is not limited".to_string(),
        ));
    }
    Ok(())
}

fn show_postgres(client: &mut postgres::Client, setting: &str) -> Result<String, postgres::Error> {
    let row = client.query_one(format!("SHOW {setting}").as_str(), &[])?;
    Ok(row.get(0))
}

/// Queries run in battery order, and a query failure classifies as the
/// diagnostic it serves.
fn gather_postgres(client: &mut postgres::Client) -> Result<PostgresSettings, AuditError> {
    let auth_method = show_postgres(client, "password_encryption")
        .map_err(|e| AuditError::AccessControl(format!("access control check error: {e}")))?;
    let ssl = show_postgres(client, "ssl")
        .map_err(|e| AuditError::Tls(format!("TLS usage check error: {e}")))?;
    let encryption_configured: bool = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_settings WHERE name = 'ssl_cert_file' AND setting IS NOT NULL)",
            &[],
        )
        .map(|row| row.get(0))
        .map_err(|e| AuditError::Encryption(format!("data encryption check error: {e}")))?;
    let exposure_err =
        |e: postgres::Error| AuditError::NetworkExposure(format!("network exposure check error: {e}"));
    let listen_addresses = show_postgres(client, "listen_addresses").map_err(exposure_err)?;
    let max_connections = show_postgres(client, "max_connections")
        .map_err(exposure_err)?
        .parse::<i64>()
        .map_err(|e| AuditError::NetworkExposure(format!("network exposure check error: {e}")))?;
    let superuser_reserved_connections = show_postgres(client, "superuser_reserved_connections")
        .map_err(exposure_err)?
        .parse::<i64>()
        .map_err(|e| AuditError::NetworkExposure(format!("network exposure check error: {e}")))?;
    Ok(PostgresSettings {
        auth_method,
        ssl: ssl == "on",
        encryption_configured,
        listen_addresses,
        max_connections,
        superuser_reserved_connections,
    })
}

fn show_mysql(conn: &mut mysql::Conn, variable: &str) -> Result<Option<String>, mysql::Error> {
    let row: Option<(String, String)> =
        conn.query_first(format!("SHOW VARIABLES LIKE '{variable}'"))?;
    Ok(row.map(|(_, value)| value))
}

fn gather_mysql(conn: &mut mysql::Conn) -> Result<MysqlSettings, AuditError> {
    let have_ssl = show_mysql(conn, "have_ssl")
        .map_err(|e| AuditError::Tls(format!("TLS usage check error: {e}")))?
        .unwrap_or_default();
    let exposure_err =
        |e: mysql::Error| AuditError::NetworkExposure(format!("network exposure check error: {e}"));
    let bind_address = show_mysql(conn, "bind_address")
        .map_err(exposure_err)?
        .unwrap_or_default();
    let max_connections = show_mysql(conn, "max_connections")
        .map_err(exposure_err)?
        .unwrap_or_default()
        .parse::<i64>()
        .map_err(|e| AuditError::NetworkExposure(format!("network exposure check error: {e}")))?;
    Ok(MysqlSettings {
        have_ssl,
        bind_address,
        max_connections,
    })
}

fn audit_postgres(database: &str, credential: &Credential) -> Result<(), AuditError> {
    let mut config = postgres::Config::new();
    config
        .host("localhost")
        .port(5432)
        .user(&credential.username)
        .password(&credential.secret)
        .dbname(database);
    let mut client = config
        .connect(postgres::NoTls)
        .map_err(|e| AuditError::Connection(format!("database connection error: {e}")))?;
    let settings = gather_postgres(&mut client)?;
    evaluate_postgres(&settings)
}

fn audit_mysql(database: &str, credential: &Credential) -> Result<(), AuditError> {
    let opts = mysql::OptsBuilder::new()
        .ip_or_hostname(Some("127.0.0.1"))
        .tcp_port(3306)
        .user(Some(&credential.username))
        .pass(Some(&credential.secret))
        .db_name(Some(database));
    let mut conn = mysql::Conn::new(opts)
        .map_err(|e| AuditError::Connection(format!("database connection error: {e}")))?;
    let settings = gather_mysql(&mut conn)?;
    evaluate_mysql(&settings)
}

/// Audits every (database name, credential) pair under every configured
/// target. Stateless between cycles apart from the violations and counters it
/// records.
pub struct DatabaseAuditor {
    targets: Vec<DatabaseTarget>,
}

impl DatabaseAuditor {
    pub fn new(targets: Vec<DatabaseTarget>) -> Self {
        Self { targets }
    }

    pub fn audit_pair(
        dialect: Dialect,
        database: &str,
        credential: &Credential,
    ) -> Result<(), AuditError> {
        match dialect {
            Dialect::Postgres => audit_postgres(database, credential),
            Dialect::Mysql => audit_mysql(database, credential),
        }
    }
}

impl Detector for DatabaseAuditor {
    fn name(&self) -> &'static str {
        "database_audit"
    }

    fn run(&mut self, store: &SecurityStore) -> Result<(), DetectorError> {
        for target in &self.targets {
            if target.names.is_empty() || target.users.is_empty() {
                continue;
            }
            for database in &target.names {
                for credential in &target.users {
                    match Self::audit_pair(target.dialect, database, credential) {
                        Ok(()) => {
                            debug!(dialect = target.dialect.as_str(), database = %database, user = %credential.username, "no vulnerabilities")
                        }
                        Err(e) => {
                            warn!(
                                dialect = target.dialect.as_str(),
                                database = %database,
                                user = %credential.username,
                                kind = e.kind().as_str(),
                                "vulnerabilities detected: {e}"
                            );
                            store.record_vulnerability(Vulnerability {
                                database: database.clone(),
                                user: credential.username.clone(),
                                kind: e.kind(),
                                detail: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
