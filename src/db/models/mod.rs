mod bill;
mod reminder;

pub use bill::*;
pub use reminder::*;
