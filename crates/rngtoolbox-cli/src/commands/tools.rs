//! One-shot randomness tools: `draw`, `flip`, `key`, `otp`, `pad`, `encrypt`
//! and `decrypt`.

use std::path::Path;

use rngtoolbox_core::sources::{self, SampleSource};
use rngtoolbox_core::{
    ValidationError, decrypt as decrypt_message, draw_integer, encrypt as encrypt_message,
    flip_coin, generate_key, generate_otp, generate_pad,
};

/// Open the configured source, or exit.
fn open_source(settings: Option<&Path>) -> Box<dyn SampleSource> {
    let config = super::load_config(settings);
    let Some(source) = config.source_port.as_deref().filter(|s| !s.trim().is_empty()) else {
        eprintln!("Error: {}", ValidationError::MissingSource);
        eprintln!("Select one with `rngtoolbox config set --source <name>` (see `rngtoolbox ports`).");
        std::process::exit(1);
    };
    match sources::open(
        source,
        &config.baud_rate,
        config.remote_fetch_endpoint.as_deref(),
    ) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn exit_on_error<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    })
}

pub fn draw(settings: Option<&Path>, start: i64, end: i64) {
    let mut source = open_source(settings);
    println!("{}", exit_on_error(draw_integer(source.as_mut(), start, end)));
}

pub fn flip(settings: Option<&Path>) {
    let mut source = open_source(settings);
    println!("{}", exit_on_error(flip_coin(source.as_mut())));
}

pub fn key(settings: Option<&Path>, algorithm: &str) {
    let mut source = open_source(settings);
    println!("{}", exit_on_error(generate_key(source.as_mut(), algorithm)));
}

pub fn pad(settings: Option<&Path>, bytes: usize) {
    let mut source = open_source(settings);
    println!("{}", exit_on_error(generate_pad(source.as_mut(), bytes)));
}

pub fn otp(settings: Option<&Path>, length: usize) {
    let mut source = open_source(settings);
    println!("{}", exit_on_error(generate_otp(source.as_mut(), length)));
}

pub fn encrypt(settings: Option<&Path>, algorithm: &str, key: &str, message: &str) {
    let mut source = open_source(settings);
    println!(
        "{}",
        exit_on_error(encrypt_message(source.as_mut(), algorithm, key, message))
    );
}

pub fn decrypt(algorithm: &str, key: &str, ciphertext: &str) {
    println!("{}", exit_on_error(decrypt_message(algorithm, key, ciphertext)));
}
