//! SQLite-журнал действий администраторов над прокси.

use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAction {
    Created,
    Deleted,
}

impl ProxyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => ACTION_CREATED,
            Self::Deleted => ACTION_DELETED,
        }
    }
}

impl fmt::Display for ProxyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ACTION_CREATED: &str = "created";
const ACTION_DELETED: &str = "deleted";

#[derive(Debug, Clone, FromRow)]
pub struct ProxyEvent {
    pub action: String,
    pub proxy_id: String,
    pub port: Option<i64>,
    pub admin_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct JournalStats {
    pub created: i64,
    pub deleted: i64,
}

pub struct Db {
    pool: SqlitePool,
}

fn current_unix_timestamp() -> Result<i64, anyhow::Error> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .map_err(|err| anyhow::anyhow!("Системное время меньше UNIX_EPOCH: {}", err))
}

impl Db {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Не удалось создать директорию для БД: {}", e))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| anyhow::anyhow!("Не удалось подключиться к SQLite: {}", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proxy_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action TEXT NOT NULL,
                proxy_id TEXT NOT NULL,
                port INTEGER,
                admin_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_proxy_events_created_at ON proxy_events(created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Миграция БД: {}", e))?;
        Ok(())
    }

    pub async fn record(
        &self,
        action: ProxyAction,
        proxy_id: &str,
        port: Option<u16>,
        admin_id: i64,
    ) -> Result<(), anyhow::Error> {
        let now = current_unix_timestamp()?;
        sqlx::query(
            "INSERT INTO proxy_events (action, proxy_id, port, admin_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(action.as_str())
        .bind(proxy_id)
        .bind(port.map(i64::from))
        .bind(admin_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Последние события, новые первыми.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<ProxyEvent>, anyhow::Error> {
        let events = sqlx::query_as::<_, ProxyEvent>(
            "SELECT action, proxy_id, port, admin_id, created_at FROM proxy_events ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn stats(&self) -> Result<JournalStats, anyhow::Error> {
        let count = |action: ProxyAction| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM proxy_events WHERE action = ?")
                .bind(action.as_str())
                .fetch_one(&self.pool)
        };
        Ok(JournalStats {
            created: count(ProxyAction::Created).await?,
            deleted: count(ProxyAction::Deleted).await?,
        })
    }

    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(dir.path().join("journal.db")).await.unwrap();

        db.record(ProxyAction::Created, "1", Some(443), 10).await.unwrap();
        db.record(ProxyAction::Created, "2", None, 10).await.unwrap();
        db.record(ProxyAction::Deleted, "1", None, 11).await.unwrap();

        let events = db.recent_events(2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "deleted");
        assert_eq!(events[0].admin_id, 11);
        assert_eq!(events[1].proxy_id, "2");
        assert_eq!(events[1].port, None);

        let stats = db.stats().await.unwrap();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.deleted, 1);
    }

    #[tokio::test]
    async fn reopen_keeps_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("journal.db");
        Db::open(&path)
            .await
            .unwrap()
            .record(ProxyAction::Created, "5", Some(8443), 1)
            .await
            .unwrap();

        let events = Db::open(&path).await.unwrap().recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].port, Some(8443));
    }
}
