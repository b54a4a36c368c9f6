//! Image dimension: completeness of the photo set.
//!
//! More images is strictly better. Zero photos is only a warning, since some
//! authentic listings genuinely have none.

use super::SubScore;

pub(crate) fn score(images: &[String], min_image_count: usize) -> SubScore {
    let mut out = SubScore::new(0.0);
    match images.len() {
        0 => {
            out.score = 50.0;
            out.warnings.push("no images".to_string());
        }
        n if n < min_image_count => {
            out.score = 70.0;
            out.warnings.push(format!("few images ({n})"));
        }
        _ => out.score = 100.0,
    }
    out
}
