//! Registry services and the hub facade.

mod clients;
mod error;
mod facade;
mod rooms;
mod sessions;

pub use clients::{ClientRegistry, CreateClientRequest, RequestOptions};
pub use error::{ErrorKind, HubError, HubResult};
pub use facade::{Hub, RoomDeletion};
pub use rooms::RoomRegistry;
pub use sessions::SessionRegistry;
