use super::db_data::song::{ActiveModel, Column, Entity, Model};
use async_trait::async_trait;
use chrono::Utc;
use domain::song::{Song, SongError, SongRepository, VoteCounts};
use domain::value::SongId;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

#[derive(Clone)]
pub struct SongRepositoryImpl {
    db: DbConn,
}

impl SongRepositoryImpl {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    fn upsert() -> OnConflict {
        OnConflict::column(Column::Id)
            .update_columns([
                Column::Name,
                Column::ObjectKey,
                Column::LikeCount,
                Column::DislikeCount,
                Column::PlayCount,
                Column::Deleted,
                Column::UpdatedAt,
            ])
            .to_owned()
    }

    /// 只更新票数两列和 updated_at
    async fn update_vote_counts<C: ConnectionTrait>(
        conn: &C,
        counts: &VoteCounts,
    ) -> Result<u64, DbErr> {
        let result = Entity::update_many()
            .col_expr(Column::LikeCount, Expr::value(counts.like_count))
            .col_expr(Column::DislikeCount, Expr::value(counts.dislike_count))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(Column::Id.eq(counts.song_id.as_i64()))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl SongRepository for SongRepositoryImpl {
    async fn find_by_id(&self, id: SongId) -> Result<Option<Song>, SongError> {
        let result: Option<Model> = Entity::find_by_id(id.as_i64())
            .one(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(result.map(Song::from))
    }

    async fn find_all(&self) -> Result<Vec<Song>, SongError> {
        let models: Vec<Model> = Entity::find()
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(models.into_iter().map(Song::from).collect())
    }

    async fn find_by_key_prefix(&self, prefix: &str) -> Result<Vec<Song>, SongError> {
        let models: Vec<Model> = Entity::find()
            .filter(Column::ObjectKey.starts_with(prefix))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(models.into_iter().map(Song::from).collect())
    }

    async fn save(&self, song: &Song) -> Result<(), SongError> {
        let active_model: ActiveModel = song.into();
        Entity::insert(active_model)
            .on_conflict(Self::upsert())
            .exec(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(())
    }

    async fn save_vote_counts(&self, counts: &[VoteCounts]) -> Result<(), SongError> {
        if counts.is_empty() {
            return Ok(());
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;

        for item in counts {
            Self::update_vote_counts(&txn, item)
                .await
                .map_err(|e| SongError::DbErr(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(())
    }

    async fn save_vote_count(&self, counts: &VoteCounts) -> Result<(), SongError> {
        let rows = Self::update_vote_counts(&self.db, counts)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        if rows == 0 {
            return Err(SongError::NotFound(counts.song_id));
        }
        Ok(())
    }

    async fn set_deleted(&self, id: SongId, deleted: bool) -> Result<bool, SongError> {
        let result = Entity::update_many()
            .col_expr(Column::Deleted, Expr::value(deleted))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(Column::Id.eq(id.as_i64()))
            .filter(Column::Deleted.ne(deleted))
            .exec(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    async fn increment_play_count(&self, id: SongId) -> Result<(), SongError> {
        let result = Entity::update_many()
            .col_expr(Column::PlayCount, Expr::col(Column::PlayCount).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(Column::Id.eq(id.as_i64()))
            .exec(&self.db)
            .await
            .map_err(|e| SongError::DbErr(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(SongError::NotFound(id));
        }
        Ok(())
    }
}
