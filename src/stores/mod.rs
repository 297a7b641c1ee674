pub mod download_registry;
pub mod torrent_store;
