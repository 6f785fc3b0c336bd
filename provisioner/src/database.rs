use std::fmt;
use std::str::FromStr;

use osc_shared_types::{InstanceName, OscError, Result};
use serde::{Deserialize, Serialize};

use crate::instance::InstanceProvisioner;
use crate::resources::{couchdb, valkey};

/// Database flavours accepted by `create_database`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseKind {
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "NoSQL")]
    NoSql,
    MemoryDb,
}

impl DatabaseKind {
    pub const NAMES: [&'static str; 3] = ["SQL", "NoSQL", "MemoryDb"];

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseKind::Sql => "SQL",
            DatabaseKind::NoSql => "NoSQL",
            DatabaseKind::MemoryDb => "MemoryDb",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = OscError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SQL" => Ok(DatabaseKind::Sql),
            "NoSQL" => Ok(DatabaseKind::NoSql),
            "MemoryDb" => Ok(DatabaseKind::MemoryDb),
            other => Err(OscError::Validation(format!(
                "type: Invalid enum value. Expected {}, received '{}'",
                Self::NAMES
                    .iter()
                    .map(|n| format!("'{}'", n))
                    .collect::<Vec<_>>()
                    .join(" | "),
                other
            ))),
        }
    }
}

/// Create (or reuse) a database and return its connection string.
pub async fn create_database(
    provisioner: &InstanceProvisioner,
    name: &InstanceName,
    kind: DatabaseKind,
) -> Result<String> {
    match kind {
        DatabaseKind::MemoryDb => valkey::ensure(provisioner, name).await.into_result(),
        DatabaseKind::NoSql => couchdb::ensure(provisioner, name).await.into_result(),
        DatabaseKind::Sql => Err(OscError::Unsupported(
            "SQL databases are not available yet".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::fast_config;
    use control_plane::MockControlPlane;
    use osc_shared_types::ServiceId;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (Arc<MockControlPlane>, InstanceProvisioner) {
        let cp = Arc::new(MockControlPlane::new());
        let p = InstanceProvisioner::new(cp.clone(), fast_config(), CancellationToken::new());
        (cp, p)
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("MemoryDb".parse::<DatabaseKind>().unwrap(), DatabaseKind::MemoryDb);
        assert_eq!("NoSQL".parse::<DatabaseKind>().unwrap(), DatabaseKind::NoSql);
        let err = "Graph".parse::<DatabaseKind>().unwrap_err();
        assert!(err.to_string().starts_with("Invalid arguments: type:"), "{}", err);
    }

    #[tokio::test]
    async fn test_memory_db_returns_redis_url() {
        let (cp, p) = setup();
        cp.script_health(ServiceId::VALKEY, &[None, Some("starting"), Some("running")])
            .await;

        let url = create_database(&p, &InstanceName::parse("cache1").unwrap(), DatabaseKind::MemoryDb)
            .await
            .unwrap();

        assert!(url.starts_with("redis://172.232.131.169:"), "{}", url);
        assert_eq!(cp.create_calls(ServiceId::VALKEY).await, 1);
        assert_eq!(cp.health_calls(ServiceId::VALKEY).await, 3);
    }

    #[tokio::test]
    async fn test_memory_db_reuse_reresolves_port() {
        let (cp, p) = setup();
        let name = InstanceName::parse("cache1").unwrap();

        let first = create_database(&p, &name, DatabaseKind::MemoryDb).await.unwrap();
        let second = create_database(&p, &name, DatabaseKind::MemoryDb).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cp.create_calls(ServiceId::VALKEY).await, 1);
        assert_eq!(
            cp.count_calls(|c| matches!(c, control_plane::MockCall::Ports(..)))
                .await,
            2
        );
    }

    #[tokio::test]
    async fn test_no_sql_returns_credentialed_url() {
        let (cp, p) = setup();
        let url = create_database(&p, &InstanceName::parse("docs").unwrap(), DatabaseKind::NoSql)
            .await
            .unwrap();

        let instance = cp.instance(ServiceId::COUCHDB, "docs").await.unwrap();
        let password = instance.attribute("AdminPassword").unwrap();
        assert!(url.contains(&format!("admin:{}@", password)), "{}", url);
    }

    #[tokio::test]
    async fn test_sql_is_unsupported() {
        let (cp, p) = setup();
        let err = create_database(&p, &InstanceName::parse("rel").unwrap(), DatabaseKind::Sql)
            .await
            .unwrap_err();
        assert!(matches!(err, OscError::Unsupported(_)));
        assert!(cp.calls().await.is_empty());
    }
}
