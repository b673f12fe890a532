//! Path template interpolation.
//!
//! Templates are plain strings with `:token` placeholders, for example
//! `:attachment/:id_partition/:style/:filename`.

use crate::attachment::AttachmentDescriptor;
use stowage_common::{Result, StorageKey};

/// Expands a path template into a storage key.
///
/// Implementations must be pure: the same template, attachment state and
/// style always produce the same key, so moves and removals can be re-run.
pub trait PathInterpolator: Send + Sync {
    fn interpolate(
        &self,
        template: &str,
        attachment: &AttachmentDescriptor,
        style: &str,
    ) -> Result<StorageKey>;
}

/// Recognised tokens, longest first so `:id_partition` wins over `:id`.
const TOKENS: [&str; 8] = [
    ":id_partition",
    ":attachment",
    ":extension",
    ":basename",
    ":filename",
    ":class",
    ":style",
    ":id",
];

/// Default interpolator understanding the standard attachment tokens.
///
/// | token           | value                                            |
/// |-----------------|--------------------------------------------------|
/// | `:attachment`   | attachment name                                  |
/// | `:class`        | model class, `::` and `\` turned into `/`        |
/// | `:id`           | record id                                        |
/// | `:id_partition` | id split into three 3-character directories      |
/// | `:style`        | style name                                       |
/// | `:filename`     | original file name                               |
/// | `:basename`     | file name without extension                      |
/// | `:extension`    | file extension without the dot                   |
///
/// Substituted values are never re-scanned for tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenInterpolator;

impl TokenInterpolator {
    pub fn new() -> Self {
        Self
    }

    fn value(token: &str, attachment: &AttachmentDescriptor, style: &str) -> String {
        let record = &attachment.record;
        let filename = record.original_filename.as_deref().unwrap_or("");
        match token {
            ":id_partition" => id_partition(&record.id),
            ":attachment" => record.attachment_name.clone(),
            ":extension" => split_filename(filename).1.to_string(),
            ":basename" => split_filename(filename).0.to_string(),
            ":filename" => filename.to_string(),
            ":class" => record.class_name.replace("::", "/").replace('\\', "/"),
            ":style" => style.to_string(),
            ":id" => record.id.clone(),
            _ => token.to_string(),
        }
    }
}

impl PathInterpolator for TokenInterpolator {
    fn interpolate(
        &self,
        template: &str,
        attachment: &AttachmentDescriptor,
        style: &str,
    ) -> Result<StorageKey> {
        let mut out = String::with_capacity(template.len() + 32);
        let mut rest = template;

        while let Some(pos) = rest.find(':') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match TOKENS.iter().find(|t| tail.starts_with(**t)) {
                Some(token) => {
                    out.push_str(&Self::value(token, attachment, style));
                    rest = &tail[token.len()..];
                }
                None => {
                    out.push(':');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);

        StorageKey::new(out)
    }
}

/// Numeric ids are zero-padded to nine digits and every group of three is
/// kept, so ids past nine digits stay distinct. Other ids use only their
/// first nine characters.
fn id_partition(id: &str) -> String {
    let chars: Vec<char> = match id.parse::<u64>() {
        Ok(n) => format!("{:09}", n).chars().collect(),
        Err(_) => id.chars().take(9).collect(),
    };
    chars
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split into (basename, extension). Dotfiles have no extension.
fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(0) | None => (filename, ""),
        Some(idx) => (&filename[..idx], &filename[idx + 1..]),
    }
}
