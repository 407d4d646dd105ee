pub mod acceptor;
pub mod reloader;
pub mod setup;

pub use acceptor::build_rustls;
pub use reloader::TlsReloader;
pub use setup::setup_tls_with_hot_reload;
