use super::{is_exit, App, Transition};
use crate::ui::{MenuItem, Prompter, THEMES};
use anyhow::Result;
use tracing::{info, warn};
use url::Url;

const TITLE: &str = "Breadbox / Settings";

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

impl<P: Prompter> App<P> {
    pub(super) async fn settings_menu(&mut self) -> Result<Transition> {
        let config = &self.config;
        let items = [
            MenuItem::new("Server", config.server.clone().unwrap_or_default()),
            MenuItem::new("Downloads", config.downloads_folder.clone()),
            MenuItem::new("Player", config.player.clone()),
            MenuItem::new(
                "Auto-exit",
                format!("close the player when playback ends ({})", on_off(config.vlc_auto_exit)),
            ),
            MenuItem::new("Theme", on_off(config.enable_theme)),
            MenuItem::new("Theme name", config.theme.clone()),
            MenuItem::new(
                "Log out",
                self.user.as_ref().map(|u| u.username.clone()).unwrap_or_default(),
            ),
        ];

        let Some(choice) = self.prompter.menu(TITLE, "Change a setting:", &items)? else {
            return Ok(Transition::Pop);
        };

        match choice.as_str() {
            "Server" => self.change_server().await?,
            "Downloads" => {
                let current = self.config.downloads_folder.clone();
                if let Some(folder) = self
                    .prompter
                    .input(TITLE, "Where should downloads be saved?", Some(&current), false)?
                {
                    self.config.downloads_folder = folder;
                    self.save_config()?;
                }
            }
            "Player" => {
                let current = self.config.player.clone();
                if let Some(player) = self
                    .prompter
                    .input(TITLE, "Which program should play streams?", Some(&current), false)?
                {
                    self.config.player = player;
                    self.save_config()?;
                }
            }
            "Auto-exit" => {
                self.config.vlc_auto_exit = !self.config.vlc_auto_exit;
                self.save_config()?;
            }
            "Theme" => {
                self.config.enable_theme = !self.config.enable_theme;
                self.apply_theme();
                self.save_config()?;
            }
            "Theme name" => {
                let themes: Vec<MenuItem> =
                    THEMES.iter().map(|(name, _)| MenuItem::plain(*name)).collect();
                if let Some(theme) = self.prompter.menu(TITLE, "Choose a theme:", &themes)? {
                    self.config.theme = theme;
                    self.apply_theme();
                    self.save_config()?;
                }
            }
            "Log out" => {
                self.credentials.clear()?;
                self.logout();
                info!("Logged out");
                self.login().await?;
            }
            _ => {}
        }

        Ok(Transition::Stay)
    }

    async fn change_server(&mut self) -> Result<()> {
        let current = self.config.server.clone().unwrap_or_default();
        let Some(input) = self
            .prompter
            .input(TITLE, "Breadbox server URL:", Some(&current), false)?
        else {
            return Ok(());
        };

        let server = input.trim().trim_end_matches('/').to_string();
        if server == current {
            return Ok(());
        }
        if let Err(e) = Url::parse(&server) {
            self.prompter
                .message(TITLE, &format!("{} is not a valid URL: {}", server, e))?;
            return Ok(());
        }

        // The current session stays in place until the new one works.
        info!("Switching server to {}", server);
        match self.connect(&server).await {
            Ok((client, user)) => {
                self.config.server = Some(server);
                self.save_config()?;
                self.client = Some(client);
                self.user = Some(user);
                self.update_backtitle();
            }
            Err(e) if is_exit(&e) => info!("Server change to {} cancelled", server),
            Err(e) => {
                warn!("Could not switch to {}: {:#}", server, e);
                self.prompter.message(
                    TITLE,
                    &format!(
                        "Could not connect to {}. Still using {}.\n\n{:#}",
                        server, current, e
                    ),
                )?;
            }
        }
        Ok(())
    }
}
