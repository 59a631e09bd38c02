pub mod remote;
pub mod types;

pub use remote::OrsRouteClient;
