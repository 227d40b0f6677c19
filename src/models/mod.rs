pub mod balance;
pub mod device;
pub mod money;
pub mod notification;
pub mod transaction;

#[cfg(test)]
pub(crate) mod fixtures;

pub use balance::*;
pub use device::*;
pub use money::*;
pub use notification::*;
pub use transaction::*;
