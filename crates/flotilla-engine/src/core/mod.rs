pub use self::{roster::*, vessel::*};

pub(crate) mod roster;
pub(crate) mod vessel;
