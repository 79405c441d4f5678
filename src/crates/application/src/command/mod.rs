pub mod song;
pub mod vote;
