mod room;
mod session;
mod snippet;
mod stats;
mod user;

pub use room::*;
pub use session::*;
pub use snippet::*;
pub use stats::*;
pub use user::*;
