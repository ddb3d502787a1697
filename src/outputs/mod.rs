//! Output writers.
//!
//! # Submodules
//!
//! - [`json`]: writes a produced item or feed to a JSON file
//! - [`debug`]: dumps intermediate payloads when `save_debug` is on
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── x-test-article.json     # `content` result
//! └── x-test-category.json    # `feed` result
//!
//! debug_dir/
//! ├── debug.json   # raw item payload
//! ├── feed.json    # raw listing payload
//! ├── next.json    # Next.js data payload
//! └── debug.html   # rendered or fetched HTML
//! ```

pub mod debug;
pub mod json;
