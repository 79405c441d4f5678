mod song;
mod song_vote;

pub use song::InMemorySongRepository;
pub use song_vote::InMemorySongVoteRepository;
