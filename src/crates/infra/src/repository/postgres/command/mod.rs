pub mod db_data;
mod song;
mod song_vote;

pub use song::SongRepositoryImpl;
pub use song_vote::SongVoteRepositoryImpl;
