//! 🔮 Inference: reading tea leaves, except the tea leaves are file extensions.
//!
//! 🕵️ Given an object key like `logs/2026/10/data.csv.gz`, we squint at the suffixes
//! and decide two things the query service needs to know up front:
//! - what the bytes look like once decompressed ([`InputFormat`])
//! - how they were squished ([`Compression`])
//!
//! 🧠 Knowledge graph:
//! - Compression looks at the LAST extension only. `data.csv.gz` → `gz` → Gzip.
//! - Format peels one compression suffix off first, then looks again. `data.csv.gz` → `csv`.
//! - `data.gz` has nothing left after peeling, so format falls back to JSON Lines (with a warning).
//! - Explicit settings (anything but `auto`) skip the tea leaves entirely.
//!
//! 🦆 The duck once tried to infer its own format. It returned JSON Lines. With a warning.

use tracing::warn;

/// 🏷️ The magic word that means "you figure it out".
pub const AUTO: &str = "auto";

/// 🗜️ Extensions that mean "this was compressed", in every spelling we've met in the wild.
const COMPRESSION_SUFFIXES: [&str; 4] = ["gz", "gzip", "bz2", "bzip2"];

/// 📄 What the object looks like after decompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// 📊 comma separated, first row is the header
    Csv,
    /// 📜 one JSON document per line
    JsonLines,
    /// 🧱 columnar, binary, fancy
    Parquet,
}

impl InputFormat {
    /// 🎯 Strict mapping from a format signal. `None` means "never heard of it".
    fn from_signal(signal: &str) -> Option<Self> {
        match signal {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::JsonLines),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// 🗜️ How the object was squished before it was uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    /// 🎯 Strict mapping from a compression signal. `None` (the Option kind) means unknown.
    /// Not to be confused with `Compression::None`, which means "known, and it's nothing".
    /// Naming things is hard. 🦆
    fn from_signal(signal: &str) -> Option<Self> {
        match signal {
            "gz" | "gzip" => Some(Self::Gzip),
            "bz2" | "bzip2" => Some(Self::Bzip2),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// 📎 The extension of the final path segment, lower-cased, without the dot.
///
/// `a/b/data.csv.gz` → `gz`, `a.dir/README` → `""`, `data.` → `""`.
pub fn extension(key: &str) -> String {
    // -- 🔪 only the last path segment counts. `dir.v2/file` has no extension, sorry dir.
    let the_file_name = key.rsplit('/').next().unwrap_or(key);
    match the_file_name.rfind('.') {
        Some(dot) => the_file_name[dot + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// 🔍 The format signal hiding in a key: the extension, unless that extension is a
/// compression suffix, in which case we peel it off and look at the next one in.
pub fn format_signal(key: &str) -> String {
    let the_outer = extension(key);
    if !COMPRESSION_SUFFIXES.contains(&the_outer.as_str()) {
        return the_outer;
    }
    // -- 🧅 peel exactly one layer. `data.csv.gz` → `data.csv` → `csv`.
    let the_peeled = &key[..key.len() - the_outer.len() - 1];
    extension(the_peeled)
}

/// 🔮 Guess the format from the key alone. `None` when the leaves are unreadable.
pub fn infer_format(key: &str) -> Option<InputFormat> {
    InputFormat::from_signal(&format_signal(key))
}

/// 🔮 Guess the compression from the key alone. Unknown extensions mean uncompressed.
pub fn infer_compression(key: &str) -> Compression {
    match extension(key).as_str() {
        "gz" | "gzip" => Compression::Gzip,
        "bz2" | "bzip2" => Compression::Bzip2,
        _ => Compression::None,
    }
}

/// 📄 Turn the `format` setting into a concrete [`InputFormat`].
///
/// `auto` infers from `key`; `csv|json|parquet` are taken at their word (any case).
/// Anything else, inferred or declared, lands on JSON Lines with a warning on stderr.
pub fn resolve_format(setting: &str, key: &str) -> InputFormat {
    let the_setting = setting.trim().to_ascii_lowercase();
    let the_guess = if the_setting == AUTO {
        infer_format(key)
    } else {
        InputFormat::from_signal(&the_setting)
    };

    the_guess.unwrap_or_else(|| {
        warn!(
            "🤷 unknown file format for '{}' (format setting '{}'), defaulting to JSON Lines",
            key, setting
        );
        InputFormat::JsonLines
    })
}

/// 🗜️ Turn the `compression` setting into a concrete [`Compression`].
///
/// `auto` infers from `key` and stays quiet about unknown extensions (most files just
/// aren't compressed). Explicit values accept a leading dot and the suffix spellings,
/// so `.gz`, `gz` and `GZIP` all mean Gzip. An explicit value we don't recognise is
/// treated as uncompressed, with a warning.
pub fn resolve_compression(setting: &str, key: &str) -> Compression {
    let the_setting = setting.trim().to_ascii_lowercase();
    if the_setting == AUTO {
        return infer_compression(key);
    }

    let the_signal = the_setting.trim_start_matches('.');
    Compression::from_signal(the_signal).unwrap_or_else(|| {
        warn!(
            "🤷 unknown compression '{}', assuming the object is not compressed",
            setting
        );
        Compression::None
    })
}
