use super::{logged_in, App, Screen, Transition};
use crate::models::{AnimeRecord, ArchiveKind, MediaDescriptor, MediaId};
use crate::player::Player;
use crate::ui::{label_width, truncate, MenuItem, Prompter};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SAVE: &str = "Save to downloads";
const BONUS_TAG: &str = "*";

/// Columns of menu chrome around a title label.
const TITLE_CHROME: usize = 35;
/// Columns of menu chrome around an episode label.
const EPISODE_CHROME: usize = 32;

/// A media item picked for streaming or saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub anime_id: String,
    pub title: String,
    pub media: MediaId,
    /// Shown above the watch actions.
    pub heading: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleLayout {
    /// Nothing to watch yet.
    Empty,
    /// A single item played as `_movie`.
    Movie,
    Episodes,
}

/// Decides how a title is presented from its media and the number of
/// episodes the metadata service knows about.
pub fn classify(media: &MediaDescriptor, external_episode_count: usize) -> TitleLayout {
    if media.is_empty() {
        TitleLayout::Empty
    } else if external_episode_count <= 1 && !media.episodes.is_empty() {
        TitleLayout::Movie
    } else {
        TitleLayout::Episodes
    }
}

/// One option per available episode in descriptor order, then a Bonus entry
/// when extras exist.
pub fn episode_options(media: &MediaDescriptor, episode_titles: &[String], width: usize) -> Vec<MenuItem> {
    let mut items: Vec<MenuItem> = media
        .episodes
        .iter()
        .map(|&number| {
            let title = (number as usize)
                .checked_sub(1)
                .and_then(|index| episode_titles.get(index))
                .filter(|title| !title.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("Episode {}", number));
            MenuItem::new(number.to_string(), truncate(&title, width))
        })
        .collect();

    if !media.bonus.is_empty() {
        items.push(MenuItem::new(BONUS_TAG, "Bonus"));
    }
    items
}

/// Watch action label naming the configured player.
pub fn stream_label(player: &str) -> String {
    let name = Path::new(player)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(player);
    if name.eq_ignore_ascii_case("vlc") {
        "Stream with VLC".to_string()
    } else {
        format!("Stream with {}", name)
    }
}

impl<P: Prompter> App<P> {
    pub(super) async fn title_menu(&mut self, kind: ArchiveKind) -> Result<Transition> {
        self.prompter.busy("Fetching metadata...");
        let client = logged_in(&self.client)?;
        let records = client.archive(kind).all_info().await?;

        let heading = format!("Breadbox / Archive / {}", kind.label());
        if records.is_empty() {
            self.prompter
                .message(&heading, "This archive is empty.\n\nCheck back again later.")?;
            return Ok(Transition::Pop);
        }

        let width = label_width(self.prompter.width(), TITLE_CHROME);
        let items: Vec<MenuItem> = records
            .iter()
            .map(|(id, record)| MenuItem::new(id.clone(), truncate(&record.title, width)))
            .collect();

        let prompt = match kind {
            ArchiveKind::Anime => "Choose an anime to watch:",
            _ => "Choose a title:",
        };
        let Some(id) = self.prompter.menu(&heading, prompt, &items)? else {
            return Ok(Transition::Pop);
        };

        if kind == ArchiveKind::Anime {
            return Ok(Transition::Push(Screen::EpisodeBrowse { anime_id: id }));
        }

        // Other archives have no playback, only their records.
        if let Some((_, record)) = records.iter().find(|(record_id, _)| *record_id == id) {
            let mut details = record.title.clone();
            for (key, value) in &record.extra {
                details.push_str(&format!("\n{}: {}", key, value));
            }
            self.prompter.message(&heading, &details)?;
        }
        Ok(Transition::Stay)
    }

    /// Episode titles from the metadata service, if the record links one.
    async fn episode_titles(&self, info: &AnimeRecord) -> Option<Vec<String>> {
        let external = info.external.as_ref()?;
        match self.jikan.episodes(&external.jikan_api_url).await {
            Ok(episodes) => Some(episodes.into_iter().map(|e| e.title).collect()),
            Err(e) => {
                warn!("Could not fetch episode titles for {}: {}", info.title, e);
                None
            }
        }
    }

    pub(super) async fn episode_menu(&mut self, anime_id: &str) -> Result<Transition> {
        self.prompter.busy("Fetching metadata...");
        let client = logged_in(&self.client)?;
        let media = client.anime().list_media(anime_id).await?;
        let info = client.anime().info(anime_id).await?;
        let titles = self.episode_titles(&info).await;

        let heading = format!("Breadbox / {}", info.title);
        let episode_count = titles.as_ref().map_or(media.episodes.len(), Vec::len);

        match classify(&media, episode_count) {
            TitleLayout::Empty => {
                self.prompter.message(
                    &heading,
                    "This anime seems to be empty.\n\nCheck back again later or contact the archive administrator.",
                )?;
                Ok(Transition::Pop)
            }
            TitleLayout::Movie => Ok(Transition::Replace(Screen::WatchAction(WatchTarget {
                anime_id: anime_id.to_string(),
                heading: format!("{} - Movie", info.title),
                title: info.title,
                media: MediaId::Movie,
            }))),
            TitleLayout::Episodes => {
                let width = label_width(self.prompter.width(), EPISODE_CHROME);
                let titles = titles.unwrap_or_default();
                let items = episode_options(&media, &titles, width);

                let Some(choice) = self.prompter.menu(&heading, "Choose an episode:", &items)? else {
                    return Ok(Transition::Pop);
                };

                if choice == BONUS_TAG {
                    return Ok(Transition::Push(Screen::BonusBrowse {
                        anime_id: anime_id.to_string(),
                        title: info.title,
                        bonus: media.bonus,
                    }));
                }

                let number: u32 = choice
                    .parse()
                    .with_context(|| format!("unexpected episode option {}", choice))?;
                let episode_title = (number as usize)
                    .checked_sub(1)
                    .and_then(|index| titles.get(index))
                    .filter(|title| !title.is_empty());
                let heading = match episode_title {
                    Some(episode_title) => format!("Episode {} - {}", number, episode_title),
                    None => format!("Episode {}", number),
                };

                Ok(Transition::Push(Screen::WatchAction(WatchTarget {
                    anime_id: anime_id.to_string(),
                    title: info.title,
                    media: MediaId::Episode(number),
                    heading,
                })))
            }
        }
    }

    pub(super) fn bonus_menu(&mut self, anime_id: &str, title: &str, bonus: &[String]) -> Result<Transition> {
        let items: Vec<MenuItem> = bonus.iter().map(MenuItem::plain).collect();
        let heading = format!("Breadbox / {}", title);

        let Some(choice) = self.prompter.menu(&heading, "Bonus content", &items)? else {
            return Ok(Transition::Pop);
        };

        Ok(Transition::Replace(Screen::WatchAction(WatchTarget {
            anime_id: anime_id.to_string(),
            title: title.to_string(),
            heading: format!("Bonus - {}", choice),
            media: MediaId::Bonus(choice),
        })))
    }

    pub(super) async fn watch_menu(&mut self, target: &WatchTarget) -> Result<Transition> {
        let heading = format!("Breadbox / {}", target.title);
        let stream = stream_label(&self.config.player);
        let items = [MenuItem::plain(stream.as_str()), MenuItem::plain(SAVE)];

        match self.prompter.menu(&heading, &target.heading, &items)? {
            Some(choice) if choice == stream => self.stream(target).await?,
            Some(choice) if choice == SAVE => {
                let path = self.save_to_downloads(target).await?;
                self.prompter
                    .message(&heading, &format!("Saved file to {}", path.display()))?;
            }
            _ => {}
        }

        Ok(Transition::Pop)
    }

    async fn stream(&mut self, target: &WatchTarget) -> Result<()> {
        self.prompter.busy("Requesting stream URL...");
        let client = logged_in(&self.client)?;
        let url = client.anime().media_url(&target.anime_id, &target.media).await?;

        let player = Player::new(self.config.player.clone(), self.config.vlc_auto_exit);
        player.play(&url).await
    }

    /// Streams the media into the downloads folder and returns the file path.
    pub(super) async fn save_to_downloads(&mut self, target: &WatchTarget) -> Result<PathBuf> {
        let folder = self.config.downloads_dir();
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("failed to create {}", folder.display()))?;
        let path = folder.join(target.media.file_name(&target.title));

        self.prompter.busy("Downloading media...");
        let client = logged_in(&self.client)?;
        let stream = client
            .anime()
            .download_media(&target.anime_id, &target.media)
            .await?;
        if let Some(length) = stream.content_length() {
            info!("Downloading {} bytes to {}", length, path.display());
        }

        stream
            .save_to(&path)
            .await
            .with_context(|| format!("download to {} failed", path.display()))?;
        Ok(path)
    }
}
