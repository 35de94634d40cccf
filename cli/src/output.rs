//! Terminal output formatting. Kept separate from dispatch so `main.rs`
//! reads as pure control flow.

use simple_secrets_core::rotation::model::BackupDescriptor;
use simple_secrets_core::users::model::TokenRecord;

pub fn print_secret(value: &[u8]) {
    match std::str::from_utf8(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{}", base64_encode(value)),
    }
}

pub fn print_keys(keys: &[String]) {
    let mut sorted = keys.to_vec();
    sorted.sort();
    for key in sorted {
        println!("{key}");
    }
}

pub fn print_new_token(label: &str, token: &str) {
    println!("{label}: {token}");
}

pub fn print_tokens(tokens: &[TokenRecord]) {
    for t in tokens {
        let last_used = t
            .last_used_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}\t{}\tcreated={}\tlast_used={}\tdisabled={}",
            t.id,
            t.name,
            t.created_at.to_rfc3339(),
            last_used,
            t.disabled
        );
    }
}

pub fn print_backups(backups: &[BackupDescriptor]) {
    let mut sorted = backups.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for b in sorted {
        println!("{}\t{:?}\t{}B\t{}", b.name, b.kind, b.size, b.timestamp.to_rfc3339());
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(bytes)
}
