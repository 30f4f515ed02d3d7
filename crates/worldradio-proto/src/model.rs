use serde::{Deserialize, Deserializer, Serialize};
use unicode_width::UnicodeWidthChar;

/// Display width of the genre column.
pub const GENRE_DISPLAY_WIDTH: usize = 30;

/// One station as returned by the directory service.
///
/// Field names follow the radio-browser wire format so that the favorites
/// file stays readable by the service's own tooling.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Station {
    #[serde(rename = "stationuuid", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
    /// Comma separated genre tags, verbatim from the directory.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    /// Bitrate in kbps. Zero when unknown.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub bitrate: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url_resolved: String,
    /// Unresolved stream URL (may point at a playlist file).
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub codec: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub homepage: String,
}

impl Station {
    /// The URL handed to the player: `url_resolved`, else `url`.
    pub fn stream_url(&self) -> Option<&str> {
        [self.url_resolved.trim(), self.url.trim()]
            .into_iter()
            .find(|u| !u.is_empty())
    }

    /// Records without a name or a stream URL are useless in the table.
    pub fn is_playable(&self) -> bool {
        !self.name.trim().is_empty() && self.stream_url().is_some()
    }

    /// Tags joined with ` | ` and cut to the genre column width.
    pub fn genre_display(&self) -> String {
        truncate_to_width(&self.tags.replace(',', " | "), GENRE_DISPLAY_WIDTH)
    }

    /// Case-insensitive substring match over name, country, tags and language.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        [&self.name, &self.country, &self.tags, &self.language]
            .iter()
            .any(|field| field.to_lowercase().contains(&q))
    }
}

/// Cut `s` so that it occupies at most `max_width` terminal columns.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max_width {
            break;
        }
        width += w;
        out.push(ch);
    }
    out
}

// Mirrors send `null` for text fields they have no value for.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The directory usually sends bitrate as a number, but some mirrors and old
// favorites files carry it as a string.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Float(f64),
        Str(String),
        Null,
    }

    Ok(match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => n.min(u32::MAX as u64) as u32,
        NumOrString::Float(f) if f.is_finite() && f > 0.0 => f as u32,
        NumOrString::Float(_) => 0,
        NumOrString::Str(s) => s.trim().parse().unwrap_or(0),
        NumOrString::Null => 0,
    })
}

/// Playback state as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Idle, // nothing loaded / explicitly stopped
    Playing,
    Paused,
    Stopped, // engine stopped on its own
    Ended,   // stream reached its end
    Error,
}

impl PlayerState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// True while a stream is loaded (playing or paused).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}
