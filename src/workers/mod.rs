pub mod ingest;
pub mod supervisor;
pub mod transcoder;
