use dashsync::{ConnectorCatalog, ConnectorDescriptor, FieldKind};

use super::format;

pub fn run(catalog: &ConnectorCatalog) {
    let rows: Vec<(String, String)> = catalog
        .descriptors()
        .map(|d| (d.id.clone(), describe(d)))
        .collect();
    format::print_listing("Connectors", &rows);
}

/// `Name: field, field*` with secret fields starred.
fn describe(descriptor: &ConnectorDescriptor) -> String {
    let fields: Vec<String> = descriptor
        .fields
        .iter()
        .map(|f| match f.kind {
            FieldKind::Password => format!("{}*", f.key),
            _ => f.key.clone(),
        })
        .collect();
    format!("{}: {}", descriptor.name, fields.join(", "))
}
