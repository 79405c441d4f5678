pub mod song;
pub mod value;
pub mod vote;
