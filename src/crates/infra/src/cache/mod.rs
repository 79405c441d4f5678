mod song_list;

pub use song_list::MokaSongListCache;
