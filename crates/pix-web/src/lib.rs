//! PIX Checkout Web Frontend
//!
//! Leptos-based WASM frontend driving the `pix-client` state machine with
//! browser timers and `localStorage`.

mod app;
mod browser;
mod components;
mod pages;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
