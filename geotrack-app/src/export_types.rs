use std::borrow::Cow;

use geotrack_app_lib::mk_specta;
use specta_typescript::Typescript;

const DEFAULT_OUT: &str = "dist/bindings.ts";

/// Writes TypeScript bindings for every command, event and shared type
pub fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUT.to_string());

    let mut lang = Typescript::new();
    lang.header = Cow::Borrowed("/* eslint @typescript-eslint/no-unused-vars: 0 */");

    mk_specta()
        .export(lang, &path)
        .expect("Failed to export bindings");
    println!("Wrote geotrack bindings to {path}");
}
