//! Pipeline stages for floor-plan rendering.
//!
//! Each submodule owns one concern; the orchestrator in [`crate::render`]
//! strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ fetch ──▶ data_url ──▶ provider ──▶ fetch ──▶ data_url
//! (path/URL) (HTTP)    (decode)    (generate)   (if link)  (encode)
//! ```
//!
//! 1. [`input`]    — classify the user-supplied string; read local files
//! 2. [`fetch`]    — download remote images into memory
//! 3. [`data_url`] — the `data:<mime>;base64,<payload>` codec used at both ends
//! 4. [`provider`] — the image-generation back-ends

pub mod data_url;
pub mod fetch;
pub mod input;
pub mod provider;
