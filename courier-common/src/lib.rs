pub mod logging;
pub mod recipient;

pub use recipient::Recipient;
pub use tracing;
