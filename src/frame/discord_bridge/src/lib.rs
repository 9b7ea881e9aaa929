mod avatar;
mod bridge;
mod bridgeable;
mod config;
mod error;
mod ids;
mod intent;
mod portal;
mod puppet;
mod puppet_registry;
mod remote;
mod state;
mod user;

#[cfg(test)]
mod test_util;

pub use avatar::*;
pub use bridge::*;
pub use bridgeable::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use intent::*;
pub use portal::*;
pub use puppet::*;
pub use puppet_registry::*;
pub use remote::*;
pub use state::*;
pub use user::*;
