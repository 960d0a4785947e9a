//! SQLite-backed score store.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::ParticipantId;
use crate::store::schema::players;
use crate::store::{
    LeaderEntry, NewPlayer, PlayerRecord, ScoreCard, ScoreStore, StoreError, StoreErrorKind,
    rank_leaders,
};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone, Copy, derive_more::Display)]
enum Tally {
    #[display("win")]
    Win,
    #[display("loss")]
    Loss,
    #[display("draw")]
    Draw,
}

/// Score store over a SQLite file.
///
/// Every call opens its own connection on the blocking pool. The path must
/// name a file: `":memory:"` would give each call a fresh, empty database.
#[derive(Debug, Clone)]
pub struct SqliteScoreStore {
    db_path: String,
}

impl SqliteScoreStore {
    /// Opens the database at `db_path`, creating it and applying pending
    /// migrations as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be opened or migrated.
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let mut conn = establish(db_path)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| {
                StoreError::new(
                    StoreErrorKind::Migrate,
                    format!("Migrations failed for '{}': {}", db_path, e),
                )
            })?;
        info!(path = %db_path, migrations = applied.len(), "Score store ready");
        Ok(Self {
            db_path: db_path.to_string(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish(&db_path)?;
            op(&mut conn)
        })
        .await?
    }

    async fn bump(&self, id: &ParticipantId, tally: Tally) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            ensure_player(conn, &id)?;
            let now = chrono::Utc::now().naive_utc();
            let target = players::table.find(id.as_str());
            match tally {
                Tally::Win => diesel::update(target)
                    .set((players::wins.eq(players::wins + 1), players::updated_at.eq(now)))
                    .execute(conn)?,
                Tally::Loss => diesel::update(target)
                    .set((players::losses.eq(players::losses + 1), players::updated_at.eq(now)))
                    .execute(conn)?,
                Tally::Draw => diesel::update(target)
                    .set((players::draws.eq(players::draws + 1), players::updated_at.eq(now)))
                    .execute(conn)?,
            };
            debug!(participant = %id, %tally, "Result recorded");
            Ok(())
        })
        .await
    }
}

fn establish(db_path: &str) -> Result<SqliteConnection, StoreError> {
    SqliteConnection::establish(db_path)
        .map_err(|e| {
            StoreError::new(
                StoreErrorKind::Connect,
                format!("Failed to connect to '{}': {}", db_path, e),
            )
        })
}

fn ensure_player(conn: &mut SqliteConnection, id: &str) -> Result<usize, StoreError> {
    let inserted = diesel::insert_or_ignore_into(players::table)
        .values(&NewPlayer::new(id.to_string()))
        .execute(conn)?;
    Ok(inserted)
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    #[instrument(skip(self, id), fields(participant = %id))]
    async fn identity_exists(&self, id: &ParticipantId) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            let exists = diesel::select(diesel::dsl::exists(players::table.find(id.as_str())))
                .get_result::<bool>(conn)?;
            Ok(exists)
        })
        .await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn create_identity(&self, id: &ParticipantId) -> Result<(), StoreError> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            if ensure_player(conn, &id)? > 0 {
                info!(participant = %id, "Participant record created");
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn record_win(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.bump(id, Tally::Win).await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn record_loss(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.bump(id, Tally::Loss).await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn record_draw(&self, id: &ParticipantId) -> Result<(), StoreError> {
        self.bump(id, Tally::Draw).await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn score(&self, id: &ParticipantId) -> Result<Option<ScoreCard>, StoreError> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            let record = players::table
                .find(id.as_str())
                .select(PlayerRecord::as_select())
                .first(conn)
                .optional()?;
            Ok(record.map(|r| r.score_card()))
        })
        .await
    }

    #[instrument(skip(self, id), fields(participant = %id))]
    async fn set_nickname(&self, id: &ParticipantId, nickname: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        let nickname = nickname.to_string();
        self.with_connection(move |conn| {
            ensure_player(conn, &id)?;
            diesel::update(players::table.find(id.as_str()))
                .set((
                    players::nickname.eq(Some(nickname.as_str())),
                    players::updated_at.eq(chrono::Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            info!(participant = %id, nickname = %nickname, "Nickname set");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn leaders(&self, limit: usize) -> Result<Vec<LeaderEntry>, StoreError> {
        self.with_connection(move |conn| {
            let records = players::table
                .select(PlayerRecord::as_select())
                .load(conn)?;
            debug!(count = records.len(), "Players loaded for leaderboard");
            let entries = records
                .iter()
                .map(|r| LeaderEntry::new(r.id().as_str().into(), r.score_card()))
                .collect();
            Ok(rank_leaders(entries, limit))
        })
        .await
    }
}
