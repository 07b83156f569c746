// HTTP API: the account linking flow

pub mod link;

pub use link::{create_link_router, FlowError, LinkAppState};
pub use link::{run_session_cleanup, SessionStore};
