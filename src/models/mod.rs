pub mod appointment;
pub mod enums;
pub mod filters;
pub mod service;

pub use appointment::*;
pub use enums::*;
pub use filters::*;
pub use service::*;
