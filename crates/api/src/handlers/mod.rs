pub mod auth;
pub mod generators;
pub mod jobs;
pub mod subscription;
