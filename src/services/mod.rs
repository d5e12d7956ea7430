pub mod artifact;
pub mod projector;
pub mod runner;
pub mod store;
pub mod submitter;
