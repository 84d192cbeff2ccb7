pub mod app;
pub mod bootstrap;
pub mod cloud;
pub mod cluster;
pub mod deploy;
pub mod errors;
pub mod exec;
pub mod genesis;
pub mod infra;
pub mod inventory;
pub mod ip;
pub mod network;
pub mod node;
pub mod prompt;
pub mod provision;
pub mod remote;
pub mod results;
pub mod scripts;
pub mod sidecar;
pub mod staking;
pub mod status;
pub mod statemachine;
pub mod subnet;
pub mod versions;
pub mod waiter;
