use std::path::Path;

use rngtoolbox_core::{list_conditioners, list_sources};

pub fn run(settings: Option<&Path>) {
    let config = super::load_config(settings);
    let sources = list_sources(config.has_remote_endpoint());
    let selected = config.source_port.as_deref();

    println!("Found {} source(s):\n", sources.len());
    for source in &sources {
        let marker = if Some(source.as_str()) == selected { "*" } else { " " };
        println!("  {marker} {source}");
    }
    if !config.has_remote_endpoint() {
        println!("\n  (set a remote endpoint with `rngtoolbox config set --remote <url>`)");
    }
}

pub fn run_conditioners() {
    for info in list_conditioners() {
        println!("  {:<14} {}", info.id, info.label);
    }
}
