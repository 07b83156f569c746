// PKCE verifier/challenge generation
pub mod pkce;

// Encrypted storage for linked accounts
pub mod credentials;

// HTTP API for the linking flow
pub mod api;

// Service configuration
pub mod config;
