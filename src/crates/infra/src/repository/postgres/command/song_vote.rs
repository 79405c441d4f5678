use super::db_data::song_vote::{ActiveModel, Column, Entity, Model};
use async_trait::async_trait;
use domain::value::{SongId, UserId};
use domain::vote::{SongVote, SongVoteRepository, VoteError};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

#[derive(Clone)]
pub struct SongVoteRepositoryImpl {
    db: DbConn,
}

impl SongVoteRepositoryImpl {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SongVoteRepository for SongVoteRepositoryImpl {
    async fn find_by_user_and_song(
        &self,
        user_id: UserId,
        song_id: SongId,
    ) -> Result<Option<SongVote>, VoteError> {
        let result: Option<Model> = Entity::find_by_id((user_id.as_i64(), song_id.as_i64()))
            .one(&self.db)
            .await
            .map_err(|e| VoteError::DbErr(e.to_string()))?;
        result.map(SongVote::try_from).transpose()
    }

    async fn find_by_song(&self, song_id: SongId) -> Result<Vec<SongVote>, VoteError> {
        let models: Vec<Model> = Entity::find()
            .filter(Column::SongId.eq(song_id.as_i64()))
            .all(&self.db)
            .await
            .map_err(|e| VoteError::DbErr(e.to_string()))?;
        models.into_iter().map(SongVote::try_from).collect()
    }

    async fn save(&self, vote: &SongVote) -> Result<(), VoteError> {
        let active_model: ActiveModel = vote.into();
        Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([Column::UserId, Column::SongId])
                    .update_columns([Column::VoteType, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| VoteError::DbErr(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, user_id: UserId, song_id: SongId) -> Result<(), VoteError> {
        Entity::delete_by_id((user_id.as_i64(), song_id.as_i64()))
            .exec(&self.db)
            .await
            .map_err(|e| VoteError::DbErr(e.to_string()))?;
        Ok(())
    }
}
