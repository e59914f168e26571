mod picker;
mod routes;
mod server;

pub use picker::NativeFilePicker;
pub use routes::BridgeState;
pub use server::run_server;
