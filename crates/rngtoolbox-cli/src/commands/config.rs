//! `rngtoolbox config`: inspect and edit the saved collection settings.

use std::path::Path;

use rngtoolbox_core::SessionConfig;

use super::{ConfigOverrides, describe, runtime, settings_store};

pub fn show(settings: Option<&Path>) {
    let store = settings_store(settings);
    let config = runtime().block_on(store.load());
    println!("Settings: {}", store.path().display());
    for line in describe(&config) {
        println!("{line}");
    }
}

pub fn set(settings: Option<&Path>, overrides: &ConfigOverrides) {
    let store = settings_store(settings);
    let rt = runtime();
    let mut config = rt.block_on(store.load());
    overrides.apply(&mut config);
    if let Err(e) = rt.block_on(store.try_save(&config)) {
        eprintln!("Error saving settings: {e}");
        std::process::exit(1);
    }
    println!("Saved {}", store.path().display());
    for line in describe(&config) {
        println!("{line}");
    }
    if let Err(e) = config.validate() {
        println!("\nNote: collection is not ready yet: {e}");
    }
}

pub fn reset(settings: Option<&Path>) {
    let store = settings_store(settings);
    if let Err(e) = runtime().block_on(store.try_save(&SessionConfig::default())) {
        eprintln!("Error resetting settings: {e}");
        std::process::exit(1);
    }
    println!("Reset {}", store.path().display());
}
