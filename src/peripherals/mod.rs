mod button;
mod irq;
mod timer;

pub use button::*;
pub use irq::*;
pub use timer::*;
