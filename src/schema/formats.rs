//! Synthesizers for the string `format` keywords that produce fresh values per call.

use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

/// Vocabulary used to build random email local parts
pub const MOCK_WORDS: [&str; 50] = [
    "alpha", "beta", "gama", "delta", "eps", "zeta", "eta", "thta", "iota", "kapp", "lambd", "mu",
    "nu", "xi", "omcr", "pi", "rho", "sgma", "tau", "ups", "phi", "chi", "psi", "omeg", "data",
    "test", "mock", "temp", "user", "log", "app", "sys", "proc", "rec", "idx", "key", "val", "run",
    "dev", "prod", "auth", "sec", "cfg", "meta", "blob", "root", "admin", "main", "core", "node",
];

pub const EMAIL_DOMAIN: &str = "google.com";

/// Year used for every synthesized timestamp
pub const MOCK_YEAR: u32 = 2025;

/// Generate a random v4 UUID string from the provided RNG.
pub fn uuid_v4<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    bytes[6] = (bytes[6] & 0x0f) | 0x40; // Version 4
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // Variant RFC 4122

    Uuid::from_bytes(bytes).to_string()
}

/// Concatenate 2..=7 distinct vocabulary words into an address at [`EMAIL_DOMAIN`].
pub fn email<R: Rng + ?Sized>(rng: &mut R) -> String {
    let parts = rng.gen_range(2..=7usize).min(MOCK_WORDS.len());
    let mut local = String::with_capacity(parts * 5);
    for word in MOCK_WORDS.choose_multiple(rng, parts) {
        local.push_str(word);
    }
    format!("{local}@{EMAIL_DOMAIN}")
}

/// Number of days in `month` of the mock year.
pub fn days_in_month(month: u32) -> u32 {
    match month {
        2 => 28,
        4 | 7 | 9 | 11 => 30,
        _ => 31,
    }
}

/// `YYYY-MM-DDThh:mm:ss`
pub fn datetime<R: Rng + ?Sized>(rng: &mut R) -> String {
    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=days_in_month(month));
    let hour = rng.gen_range(0..=23);
    let minute = rng.gen_range(0..=59);
    let second = rng.gen_range(0..=59);
    format!("{MOCK_YEAR}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}")
}

/// `YYYY-MM-DDThh:mm:ss:uuuuu`, five digit sub-second suffix
pub fn datetime_extended<R: Rng + ?Sized>(rng: &mut R) -> String {
    let base = datetime(rng);
    let micros = rng.gen_range(0..=99_999u32);
    format!("{base}:{micros:05}")
}
