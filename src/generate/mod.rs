pub mod discovery;
pub mod error;
pub mod executor;
pub mod imports;
pub mod references;
pub mod result;
pub mod state;
pub mod workflow;
