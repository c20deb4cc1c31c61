use super::{logged_in, App, Transition};
use crate::error::ValidationError;
use crate::jikan::JikanClient;
use crate::models::{AnimeRecord, ApiResponse, External, Torrent};
use crate::ui::{Prompter, LANGUAGES};
use anyhow::Result;
use tracing::{info, warn};

/// Lowest auth level allowed to write to the archive.
pub const REQUIRED_AUTH_LEVEL: i64 = 2;

const TITLE: &str = "Breadbox / Contribute";

/// Everything the contribution wizard collects before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub breadbox_id: u64,
    pub title: String,
    pub mal_id: u64,
    pub anilist_id: u64,
    pub nyaa_ids: Vec<u64>,
    pub audio: Vec<String>,
    pub subtitles: Vec<String>,
}

impl Contribution {
    pub fn summary(&self) -> String {
        let ids: Vec<String> = self.nyaa_ids.iter().map(u64::to_string).collect();
        format!(
            "Title: {}\n\
             Breadbox ID: {}\n\
             MyAnimeList ID: {}\n\
             AniList ID: {}\n\
             Nyaa.si torrent IDs: [{}]\n\
             Audio: [{}]\n\
             Subtitles: [{}]\n\
             \n\
             Any existing information will be lost!\n\
             \n\
             Continue?",
            self.title,
            self.breadbox_id,
            self.mal_id,
            self.anilist_id,
            ids.join(", "),
            self.audio.join(", "),
            self.subtitles.join(", "),
        )
    }

    pub fn external(&self, jikan: &JikanClient) -> External {
        External {
            myanimelist_url: format!("https://myanimelist.net/anime/{}", self.mal_id),
            jikan_api_url: jikan.anime_url(self.mal_id),
            anilist_url: format!("https://anilist.co/anime/{}", self.anilist_id),
        }
    }

    /// The full document that replaces whatever the archive holds for this id.
    pub fn into_record(self, external: External, torrents: Vec<Torrent>) -> AnimeRecord {
        AnimeRecord {
            title: self.title,
            external: Some(external),
            audio: self.audio,
            subtitles: self.subtitles,
            torrents,
        }
    }
}

/// Accepts only a run of ASCII digits.
pub fn parse_numeric_id(input: &str) -> Result<u64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotNumeric(input.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| ValidationError::NotNumeric(input.to_string()))
}

impl<P: Prompter> App<P> {
    pub(super) async fn contribute(&mut self) -> Result<Transition> {
        let auth_level = self.user.as_ref().map_or(0, |u| u.auth_level);
        if auth_level < REQUIRED_AUTH_LEVEL {
            self.prompter.message(
                TITLE,
                "You lack the permissions required to make changes to the archive.\n\n\
                 Contact the archive's administrator for access if you'd like to make changes.",
            )?;
            return Ok(Transition::Pop);
        }

        let proceed = self.prompter.yes_no(
            TITLE,
            "You're about to be asked a series of questions. You can cancel at any time, but your work will be lost.\n\n\
             Any contributions you make will either OVERWRITE existing information, or CREATE new information.\n\
             Contributions cannot be undone.\n\n\
             Continue?",
            true,
        )?;
        if !proceed {
            return Ok(Transition::Pop);
        }

        let Some(contribution) = self.collect_contribution()? else {
            return Ok(Transition::Pop);
        };

        let page = format!("{} / {}", TITLE, contribution.breadbox_id);
        if !self.prompter.yes_no(&page, &contribution.summary(), false)? {
            return Ok(Transition::Pop);
        }

        self.submit(contribution).await?;
        Ok(Transition::Pop)
    }

    /// Asks until the answer is numeric. `None` when the user backs out.
    fn ask_numeric(&mut self, title: &str, question: &str) -> Result<Option<u64>> {
        loop {
            let Some(input) = self.prompter.input(title, question, None, false)? else {
                return Ok(None);
            };
            match parse_numeric_id(&input) {
                Ok(id) => return Ok(Some(id)),
                Err(e) => self.prompter.message(title, &e.to_string())?,
            }
        }
    }

    fn collect_contribution(&mut self) -> Result<Option<Contribution>> {
        let Some(breadbox_id) = self.ask_numeric(TITLE, "What is the anime's ID on Breadbox?")? else {
            return Ok(None);
        };
        let page = format!("{} / {}", TITLE, breadbox_id);

        let Some(title) = self
            .prompter
            .input(&page, "What is the anime's title?", None, false)?
        else {
            return Ok(None);
        };
        let Some(mal_id) = self.ask_numeric(&page, "What is the anime's ID on MyAnimeList?")? else {
            return Ok(None);
        };
        let Some(anilist_id) = self.ask_numeric(&page, "What is the anime's ID on AniList?")? else {
            return Ok(None);
        };

        let mut nyaa_ids = Vec::new();
        loop {
            let Some(id) = self.ask_numeric(&page, "What is the ID of the torrent on Nyaa.si?")? else {
                return Ok(None);
            };
            nyaa_ids.push(id);

            if !self
                .prompter
                .yes_no(&page, "Would you like to add another torrent?", false)?
            {
                break;
            }
        }

        let audio = self.prompter.checklist(
            &page,
            "Select the languages that are available as audio.",
            LANGUAGES,
        )?;
        let subtitles = self.prompter.checklist(
            &page,
            "Select the languages that are available as subtitles.",
            LANGUAGES,
        )?;

        Ok(Some(Contribution {
            breadbox_id,
            title,
            mal_id,
            anilist_id,
            nyaa_ids,
            audio,
            subtitles,
        }))
    }

    /// Resolves torrents, replaces the record, then uploads the cover as a
    /// separate step. A failed cover upload leaves the saved record in place.
    async fn submit(&mut self, contribution: Contribution) -> Result<()> {
        let page = format!("{} / {}", TITLE, contribution.breadbox_id);

        self.prompter.busy("Finding torrent info...");
        let mut torrents = Vec::with_capacity(contribution.nyaa_ids.len());
        for &torrent_id in &contribution.nyaa_ids {
            match self.nyaa.fetch(torrent_id).await {
                Ok(torrent) => torrents.push(torrent),
                Err(e) => {
                    warn!("Torrent {} could not be resolved: {}", torrent_id, e);
                    self.prompter.message(
                        &page,
                        &format!("Could not read torrent {}: {}\n\nNothing was saved.", torrent_id, e),
                    )?;
                    return Ok(());
                }
            }
        }

        let breadbox_id = contribution.breadbox_id.to_string();
        let mal_id = contribution.mal_id;
        let external = contribution.external(&self.jikan);
        let record = contribution.into_record(external, torrents);

        self.prompter.busy("Uploading metadata...");
        let client = logged_in(&self.client)?;
        let response = client.anime().patch(&breadbox_id, &record).await?;
        info!("Metadata for {} saved: {} ({})", breadbox_id, response.details, response.code);
        self.prompter.message(&page, &describe(&response))?;

        self.prompter.busy("Downloading thumbnail...");
        let thumbnail = self.upload_thumbnail(&breadbox_id, mal_id).await;
        match thumbnail {
            Ok(response) => self.prompter.message(&page, &describe(&response))?,
            Err(e) => {
                warn!("Thumbnail upload for {} failed: {:#}", breadbox_id, e);
                self.prompter.message(
                    &page,
                    &format!(
                        "The metadata was saved, but the thumbnail could not be uploaded.\n\n{:#}",
                        e
                    ),
                )?;
            }
        }

        Ok(())
    }

    async fn upload_thumbnail(&self, breadbox_id: &str, mal_id: u64) -> Result<ApiResponse> {
        let image_url = self.jikan.cover_image_url(mal_id).await?;
        let jpeg = self.jikan.download(&image_url).await?;
        let client = logged_in(&self.client)?;
        Ok(client.anime().upload_thumbnail(breadbox_id, jpeg).await?)
    }
}

fn describe(response: &ApiResponse) -> String {
    format!("{}\n\nBreadbox response code: {}", response.details, response.code)
}
