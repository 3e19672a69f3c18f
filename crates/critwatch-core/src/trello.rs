//! Board source backed by the Trello REST API (v1). Credentials travel as the
//! `key` and `token` query parameters on every request.

use crate::config::BoardConfig;
use crate::error::{CritwatchError, Result};
use crate::http;
use crate::types::Card;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "trello";

/// Read and write access to the kanban board.
pub trait BoardSource {
    fn list_id_by_name(&self, board_id: &str, name: &str) -> Result<String>;
    fn cards_in_list(&self, list_id: &str) -> Result<Vec<Card>>;
    fn cards_on_board(&self, board_id: &str) -> Result<Vec<Card>>;
    fn create_card(&self, list_id: &str, name: &str, desc: &str) -> Result<Card>;
    fn update_card_description(&self, card_id: &str, desc: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct BoardList {
    id: String,
    name: String,
}

pub struct TrelloClient {
    api_base: String,
    api_key: String,
    token: String,
    client: Client,
}

impl TrelloClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            token: token.into().trim().to_string(),
            client: http::client(timeout)?,
        })
    }

    pub fn from_config(board: &BoardConfig, timeout: Duration) -> Result<Self> {
        Self::new(&board.api_base, &board.api_key, &board.token, timeout)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = http::join_url(&self.api_base, path);
        tracing::debug!(%url, "trello GET");
        let resp = self.authed(self.client.get(&url)).send()?;
        Ok(http::ensure_success(SERVICE, resp)?.json()?)
    }
}

impl BoardSource for TrelloClient {
    fn list_id_by_name(&self, board_id: &str, name: &str) -> Result<String> {
        let lists: Vec<BoardList> = self.get_json(&format!("boards/{board_id}/lists"))?;
        lists
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
            .ok_or_else(|| CritwatchError::ListNotFound(format!("'{name}' on board {board_id}")))
    }

    fn cards_in_list(&self, list_id: &str) -> Result<Vec<Card>> {
        self.get_json(&format!("lists/{list_id}/cards"))
    }

    fn cards_on_board(&self, board_id: &str) -> Result<Vec<Card>> {
        self.get_json(&format!("boards/{board_id}/cards"))
    }

    fn create_card(&self, list_id: &str, name: &str, desc: &str) -> Result<Card> {
        let url = http::join_url(&self.api_base, "cards");
        tracing::debug!(%url, %list_id, %name, "trello create card");
        let req = self
            .client
            .post(&url)
            .query(&[("idList", list_id), ("name", name), ("desc", desc)]);
        let resp = self.authed(req).send()?;
        Ok(http::ensure_success(SERVICE, resp)?.json()?)
    }

    fn update_card_description(&self, card_id: &str, desc: &str) -> Result<()> {
        let url = http::join_url(&self.api_base, &format!("cards/{card_id}"));
        tracing::debug!(%url, "trello update card description");
        let req = self.client.put(&url).query(&[("desc", desc)]);
        http::ensure_success(SERVICE, self.authed(req).send()?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
