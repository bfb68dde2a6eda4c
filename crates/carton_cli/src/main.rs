//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `carton_core` linkage.
//! - Provision a throwaway in-memory store for quick local sanity checks.

use carton_core::{Provisioner, SchemaRegistry, SchemaSource, StoreConfig};

fn main() {
    let mut registry = SchemaRegistry::new();
    registry
        .register(SchemaSource::new(
            "smoke",
            "CREATE TABLE IF NOT EXISTS smoke (id INTEGER PRIMARY KEY);",
        ))
        .expect("smoke schema should register");

    let config = StoreConfig::from_flags(["smoke"], "Smoke", None, None, true, false);
    let context = Provisioner::new(registry).create(config);

    println!("carton_core version={}", carton_core::core_version());
    println!("carton_core attached={}", context.is_attached());
}
