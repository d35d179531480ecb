//! Local SQLite record of answered turns.

use crate::error::{CopilotoError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Which assistant flow produced an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Sales question.
    Pregunta,
    /// Image identification.
    IdentificacionImagen,
    /// Biodiversity free-text question.
    PreguntaBiodiversidad,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pregunta => "Pregunta",
            Self::IdentificacionImagen => "Identificación imagen",
            Self::PreguntaBiodiversidad => "Pregunta biodiversidad",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = CopilotoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pregunta" => Ok(Self::Pregunta),
            "Identificación imagen" => Ok(Self::IdentificacionImagen),
            "Pregunta biodiversidad" => Ok(Self::PreguntaBiodiversidad),
            other => Err(CopilotoError::InvalidInput(format!(
                "unknown interaction kind: {}",
                other
            ))),
        }
    }
}

/// One answered turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub interaction_date: DateTime<Utc>,
    pub kind: InteractionKind,
    pub user_input: String,
    pub ai_response: String,
}

impl Interaction {
    pub fn new(
        kind: InteractionKind,
        user_input: impl Into<String>,
        ai_response: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            interaction_date: Utc::now(),
            kind,
            user_input: user_input.into(),
            ai_response: ai_response.into(),
        }
    }
}

/// Append-only interaction log.
pub struct InteractionLog {
    conn: Mutex<Connection>,
}

impl InteractionLog {
    /// Open (or create) the log at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let log = Self::init(conn)?;
        info!("Opened interaction log at {:?}", path);
        Ok(log)
    }

    /// Create an in-memory log (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                interaction_date TEXT NOT NULL,
                kind TEXT NOT NULL,
                user_input TEXT NOT NULL,
                ai_response TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_date ON interactions(interaction_date);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CopilotoError::InteractionLog(format!("Failed to acquire lock: {}", e)))
    }

    /// Store one interaction.
    pub fn record(&self, interaction: &Interaction) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO interactions (id, interaction_date, kind, user_input, ai_response)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                interaction.id.to_string(),
                interaction.interaction_date.to_rfc3339(),
                interaction.kind.as_str(),
                interaction.user_input,
                interaction.ai_response,
            ],
        )?;
        debug!("Recorded {} interaction {}", interaction.kind, interaction.id);
        Ok(())
    }

    /// Most recent interactions, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Interaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, interaction_date, kind, user_input, ai_response
            FROM interactions
            ORDER BY interaction_date DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, date, kind, user_input, ai_response)| {
                Ok(Interaction {
                    id: Uuid::parse_str(&id).unwrap_or_default(),
                    interaction_date: DateTime::parse_from_rfc3339(&date)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    kind: kind.parse()?,
                    user_input,
                    ai_response,
                })
            })
            .collect()
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
