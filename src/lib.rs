//! # imgpress
//!
//! Adaptive image compression. Each input image becomes one smaller file
//! (or one square thumbnail), and the encoder is chosen by source format.
//!
//! # Architecture: Tiered Pipeline
//!
//! ```text
//! classify ─┬─ heic/heif ──> external converter ──────────────> <base>.jpg
//!           └─ png/jpeg/webp ─> decode ─> resize ─> ffmpeg/AV1 ──> <base>.avif
//!                                                      │ fails
//!                                                      └──> in-process JPEG ──> <base>.jpg
//! ```
//!
//! The preferred output is AVIF produced by an external AV1 encoder. When
//! that encoder is missing or fails, standard inputs still produce a JPEG;
//! container formats cannot be decoded in-process and have no such
//! fallback.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Pipeline orchestration: tiers, state trail, error taxonomy, parallel batches |
//! | [`imaging`] | Classification, decode, resize/crop, and the encoder adapters |
//! | [`source`] | Input files and directory discovery |
//! | [`report`] | Compression ratio, result shape, output directory listing |
//! | [`token`] | Request-unique tokens for temporary file names |
//! | [`config`] | `imgpress.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Subprocesses Behind a Trait
//!
//! ffmpeg and ImageMagick are driven through [`imaging::CommandRunner`].
//! Production code uses [`imaging::SystemRunner`], which enforces a
//! timeout; tests substitute a recording mock, so every pipeline path is
//! exercised without either tool installed.
//!
//! ## Extension Matches Content
//!
//! The fallback tier writes `<base>.jpg`, never a JPEG under an `.avif`
//! name. Callers can trust the output extension.
//!
//! ## Bitrate Heuristic
//!
//! The AV1 bitrate ceiling is `round(bytes × 0.3 × 8 / 10)` kbps. The
//! constants are reproduced as-is for output compatibility.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod report;
pub mod source;
pub mod token;
