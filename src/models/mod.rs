use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub auth_level: i64,
}

/// A named collection of records served under `/archive/{kind}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Anime,
    Games,
    Linux,
}

impl ArchiveKind {
    pub const ALL: [ArchiveKind; 3] = [ArchiveKind::Anime, ArchiveKind::Games, ArchiveKind::Linux];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Anime => "anime",
            ArchiveKind::Games => "games",
            ArchiveKind::Linux => "linux",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArchiveKind::Anime => "Anime",
            ArchiveKind::Games => "Games",
            ArchiveKind::Linux => "Linux",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links to the same title on external metadata services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct External {
    #[serde(rename = "myanimelist")]
    pub myanimelist_url: String,
    #[serde(rename = "jikan")]
    pub jikan_api_url: String,
    #[serde(rename = "anilist")]
    pub anilist_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Torrent {
    pub magnet: String,
    pub file: Option<String>,
    /// Page the links were scraped from.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<External>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub subtitles: Vec<String>,
    #[serde(default)]
    pub torrents: Vec<Torrent>,
}

/// Record shape for archives without a dedicated model. Everything beyond the
/// title is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub title: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Titles every archive record exposes, used to build menus.
pub trait Titled {
    fn title(&self) -> &str;
}

impl Titled for AnimeRecord {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for ArchiveRecord {
    fn title(&self) -> &str {
        &self.title
    }
}

/// Playable items available for one anime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    #[serde(default)]
    pub episodes: Vec<u32>,
    #[serde(default)]
    pub bonus: Vec<String>,
}

impl MediaDescriptor {
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty() && self.bonus.is_empty()
    }
}

/// Identifies one media item of an anime on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaId {
    Episode(u32),
    Movie,
    Bonus(String),
}

impl MediaId {
    pub const MOVIE: &'static str = "_movie";

    /// Parses a menu tag back into a media id.
    pub fn parse(tag: &str) -> Self {
        if tag == Self::MOVIE {
            return MediaId::Movie;
        }
        match tag.parse::<u32>() {
            Ok(number) if tag.bytes().all(|b| b.is_ascii_digit()) => MediaId::Episode(number),
            _ => MediaId::Bonus(tag.to_string()),
        }
    }

    /// File name used when saving this item for the given anime title.
    pub fn file_name(&self, title: &str) -> String {
        let title = title.replace('/', "-");
        match self {
            MediaId::Episode(number) => format!("{} - Episode {:02}.mp4", title, number),
            MediaId::Movie => format!("{} - Movie.mp4", title),
            MediaId::Bonus(name) => format!("{} - {}", title, name.replace('/', "-")),
        }
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaId::Episode(number) => write!(f, "{}", number),
            MediaId::Movie => f.write_str(Self::MOVIE),
            MediaId::Bonus(name) => f.write_str(name),
        }
    }
}

/// Body Breadbox answers with after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub details: String,
    pub code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Archive ids arrive as either JSON numbers or strings.
pub fn deserialize_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    let raw = Vec::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        })
        .collect())
}
