pub mod vote_count;
