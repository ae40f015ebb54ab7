pub mod listener;
pub mod server_manager;
pub mod session;

pub use listener::Listener;
pub use server_manager::ServerManager;
pub use session::Session;
