use domain::song::Song;
use domain::value::SongId;
use sea_orm::entity::prelude::*;
use sea_orm::Set;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Default)]
#[sea_orm(table_name = "song")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[sea_orm(column_type = "BigInteger")]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub object_key: String,
    pub like_count: i32,
    pub dislike_count: i32,
    pub play_count: i32,
    pub deleted: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    SongVote,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::SongVote => Entity::has_many(super::song_vote::Entity)
                .from(Column::Id)
                .to(super::song_vote::Column::SongId)
                .into(),
        }
    }
}

impl Related<super::song_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SongVote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Song> for ActiveModel {
    fn from(song: &Song) -> Self {
        Self {
            id: Set(song.id.as_i64()),
            name: Set(song.name.clone()),
            object_key: Set(song.object_key.clone()),
            like_count: Set(song.like_count),
            dislike_count: Set(song.dislike_count),
            play_count: Set(song.play_count),
            deleted: Set(song.deleted),
            created_at: Set(song.created_at),
            updated_at: Set(song.updated_at),
        }
    }
}

impl From<Model> for Song {
    fn from(model: Model) -> Self {
        Song {
            id: SongId::from(model.id),
            name: model.name,
            object_key: model.object_key,
            like_count: model.like_count,
            dislike_count: model.dislike_count,
            play_count: model.play_count,
            deleted: model.deleted,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
