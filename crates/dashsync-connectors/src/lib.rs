mod http;

pub mod google_sheets;
pub mod oauth;
pub mod superset;
pub mod ytsaurus;

use dashsync::ConnectorRegistry;

pub use google_sheets::GoogleSheetsConnector;
pub use oauth::refresh_google_credentials;
pub use superset::SupersetConnector;
pub use ytsaurus::YtsaurusConnector;

/// Registry with every connector shipped in this crate.
pub fn builtin_registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.register_with(GoogleSheetsConnector::new);
    registry.register_with(SupersetConnector::new);
    registry.register_with(YtsaurusConnector::new);
    registry
}
