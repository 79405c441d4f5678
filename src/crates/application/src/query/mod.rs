pub mod catalog;
pub mod song_list_cache;
pub mod url_signer;
