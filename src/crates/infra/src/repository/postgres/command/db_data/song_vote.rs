use domain::value::{SongId, UserId};
use domain::vote::{SongVote, VoteError, VoteKind};
use sea_orm::entity::prelude::*;
use sea_orm::Set;

/// 一个用户对一首歌至多一条记录，主键即 (user_id, song_id)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "song_vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub song_id: i64,
    /// 1 = like, -1 = dislike
    pub vote_type: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Song,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Song => Entity::belongs_to(super::song::Entity)
                .from(Column::SongId)
                .to(super::song::Column::Id)
                .into(),
        }
    }
}

impl Related<super::song::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Song.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SongVote> for ActiveModel {
    fn from(vote: &SongVote) -> Self {
        Self {
            user_id: Set(vote.user_id.as_i64()),
            song_id: Set(vote.song_id.as_i64()),
            vote_type: Set(vote.kind.code()),
            created_at: Set(vote.created_at),
            updated_at: Set(vote.updated_at),
        }
    }
}

impl TryFrom<Model> for SongVote {
    type Error = VoteError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(SongVote {
            user_id: UserId::from(model.user_id),
            song_id: SongId::from(model.song_id),
            kind: VoteKind::from_code(model.vote_type)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
