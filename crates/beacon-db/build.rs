//! Build script for the embedded migrations.
//!
//! `sqlx::migrate!` embeds `migrations/` at compile time, so cargo must
//! rebuild this crate when a migration is added or edited.

fn main() {
    println!("cargo:rerun-if-changed=migrations/");
}
