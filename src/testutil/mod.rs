//! Mock servers and a scripted prompter shared by the unit tests.

use crate::ui::{MenuItem, Prompter};
use anyhow::Result;
use axum::Router;
use std::collections::VecDeque;

pub const TEST_KEY: &str = "abcdefgh-0123456789";
pub const TEST_USER_ID: u64 = 671_471_129_011;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

#[derive(Debug, Clone)]
pub enum Answer {
    Choose(&'static str),
    Type(&'static str),
    Yes,
    No,
    Pick(Vec<&'static str>),
    Cancel,
}

/// Answers prompts from a fixed script. Messages are recorded without
/// consuming an answer. Once the script runs out every menu and input is
/// cancelled, so the flow unwinds back to exit.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    pub messages: Vec<String>,
    pub menus: Vec<Vec<MenuItem>>,
    pub backtitle: String,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: answers.into(),
            ..Self::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Option<Answer> {
        let answer = self.answers.pop_front();
        if let Some(ref answer) = answer {
            eprintln!("{} -> {:?}", prompt, answer);
        }
        answer
    }
}

impl Prompter for ScriptedPrompter {
    fn menu(&mut self, _title: &str, text: &str, items: &[MenuItem]) -> Result<Option<String>> {
        self.menus.push(items.to_vec());
        match self.next(text) {
            None | Some(Answer::Cancel) => Ok(None),
            Some(Answer::Choose(tag)) => {
                assert!(
                    items.iter().any(|item| item.tag == tag),
                    "menu {:?} has no option {:?}: {:?}",
                    text,
                    tag,
                    items
                );
                Ok(Some(tag.to_string()))
            }
            Some(other) => panic!("menu {:?} got {:?}", text, other),
        }
    }

    fn input(&mut self, _title: &str, text: &str, _default: Option<&str>, _secret: bool) -> Result<Option<String>> {
        match self.next(text) {
            None | Some(Answer::Cancel) => Ok(None),
            Some(Answer::Type(value)) => Ok(Some(value.to_string())),
            Some(other) => panic!("input {:?} got {:?}", text, other),
        }
    }

    fn yes_no(&mut self, _title: &str, text: &str, _default_yes: bool) -> Result<bool> {
        match self.next(text) {
            None | Some(Answer::No) | Some(Answer::Cancel) => Ok(false),
            Some(Answer::Yes) => Ok(true),
            Some(other) => panic!("yes/no {:?} got {:?}", text, other),
        }
    }

    fn checklist(&mut self, _title: &str, text: &str, _items: &[&str]) -> Result<Vec<String>> {
        match self.next(text) {
            None | Some(Answer::Cancel) => Ok(Vec::new()),
            Some(Answer::Pick(picks)) => Ok(picks.into_iter().map(str::to_string).collect()),
            Some(other) => panic!("checklist {:?} got {:?}", text, other),
        }
    }

    fn message(&mut self, _title: &str, text: &str) -> Result<()> {
        self.messages.push(text.to_string());
        Ok(())
    }

    fn busy(&mut self, _text: &str) {}

    fn set_backtitle(&mut self, backtitle: &str) {
        self.backtitle = backtitle.to_string();
    }

    fn width(&self) -> usize {
        80
    }
}
