//! HEIC/HEIF → JPEG through ImageMagick.
//!
//! The `image` crate cannot read these containers, so the source file is
//! handed straight to the converter. The output is always JPEG, bounded to
//! the converter's max dimension, auto-oriented.
//!
//! Two command forms are tried in order:
//!
//! | Attempt | Program | Output target |
//! |---|---|---|
//! | primary | `magick` (IM7) | explicit `jpg:` prefix |
//! | alternate | `convert` (IM6) | `-format jpg` + `.jpg` extension |
//!
//! Only when both fail is the conversion reported as failed; the error then
//! carries the alternate attempt's message, with the primary's in the log.
//! Whatever either attempt half-wrote at the output path is removed.

use super::backend::{BackendError, CommandRunner, Invocation, discard_file};
use super::params::ConvertSettings;
use crate::report::ProcessedArtifact;
use std::ffi::OsString;
use std::path::Path;

/// `WxH>`: shrink to fit, never enlarge.
fn resize_geometry(max_dimension: u32) -> String {
    format!("{0}x{0}>", max_dimension)
}

fn shared_args(settings: &ConvertSettings, source: &Path) -> Vec<OsString> {
    vec![
        source.into(),
        "-auto-orient".into(),
        "-resize".into(),
        resize_geometry(settings.max_dimension).into(),
        "-quality".into(),
        settings.quality.value().to_string().into(),
    ]
}

/// Primary converter invocation.
pub fn plan_primary(settings: &ConvertSettings, source: &Path, output: &Path) -> Invocation {
    let mut target = OsString::from("jpg:");
    target.push(output);
    Invocation::new(&settings.program, output)
        .args(shared_args(settings, source))
        .arg(target)
}

/// Alternate converter invocation, tried once after the primary fails.
pub fn plan_alternate(settings: &ConvertSettings, source: &Path, output: &Path) -> Invocation {
    Invocation::new(&settings.alternate_program, output)
        .args(shared_args(settings, source))
        .args(["-format", "jpg"])
        .arg(output)
}

/// Convert a container-format source to JPEG at `output`.
pub fn convert_container(
    runner: &impl CommandRunner,
    settings: &ConvertSettings,
    source: &Path,
    original_bytes: u64,
    output: &Path,
) -> Result<ProcessedArtifact, BackendError> {
    let primary = plan_primary(settings, source, output);
    if let Err(first) = runner.run(&primary) {
        log::warn!(
            "{} failed on {}, retrying with {}: {}",
            primary.program,
            source.display(),
            settings.alternate_program,
            first
        );
        let alternate = plan_alternate(settings, source, output);
        if let Err(second) = runner.run(&alternate) {
            discard_file(output);
            return Err(second);
        }
    }

    Ok(ProcessedArtifact::from_output(output, original_bytes)?)
}
