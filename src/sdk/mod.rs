pub mod config;
pub mod events;
pub mod map;
pub mod pins;
pub mod routing;
pub mod util;
