pub mod format;
pub mod metadata_extractor;
pub mod resource_repository;
pub mod resource_service;
pub mod song_client;

#[cfg(test)]
pub mod test_support;
