pub mod branches;
pub mod history;
pub mod status;
pub mod watch;

pub use branches::*;
pub use history::*;
pub use status::*;
pub use watch::*;
