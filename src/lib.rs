pub mod bot;
pub mod config;
pub mod monitoring;
pub mod notifications;
pub mod registry;
pub mod remediation;
pub mod remote;
pub mod version;

#[cfg(test)]
mod testing;
