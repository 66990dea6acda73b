//! Building blocks shared by the Spark Gateway and the cluster managers.

pub mod application;
pub mod cluster;
pub mod config;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod naming;
pub mod server;
