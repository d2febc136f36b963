mod base;
pub use self::base::*;

mod guest;
pub use self::guest::*;

mod layout;
pub use self::layout::*;

mod memory;
pub use self::memory::*;

mod tests;
