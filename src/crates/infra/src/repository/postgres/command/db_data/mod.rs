pub mod song;
pub mod song_vote;
