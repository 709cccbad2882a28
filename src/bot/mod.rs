pub mod events;
pub mod poller;
pub mod router;

pub use events::{InboundEvent, OperatorCommand};
pub use poller::run_update_loop;
pub use router::CommandRouter;
