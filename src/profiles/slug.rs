//! Public slug generation and format checks
//!
//! A slug is the marker `vd` followed by ten lowercase alphanumerics, e.g.
//! `vd3k9x0q7mza`. The marker lets the router tell profile pages apart from
//! application routes without a lookup.

use rand::Rng;

/// Marker every public slug starts with
pub const SLUG_PREFIX: &str = "vd";

/// Number of random characters after the marker
pub const SLUG_RANDOM_LEN: usize = 10;

const SLUG_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh random slug
pub fn generate_slug() -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..SLUG_RANDOM_LEN)
        .map(|_| SLUG_CHARSET[rng.gen_range(0..SLUG_CHARSET.len())] as char)
        .collect();
    format!("{}{}", SLUG_PREFIX, random)
}

/// Whether `candidate` has the shape of a public slug
///
/// # Example
///
/// ```
/// use vicdan::profiles::slug::is_public_slug;
///
/// assert!(is_public_slug("vd3k9x0q7mza"));
/// assert!(!is_public_slug("dashboard"));
/// ```
pub fn is_public_slug(candidate: &str) -> bool {
    match candidate.strip_prefix(SLUG_PREFIX) {
        Some(rest) => {
            rest.len() == SLUG_RANDOM_LEN
                && rest
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        }
        None => false,
    }
}
