pub mod dead_letters;
pub mod ingest;
pub mod orders;
pub mod status;
