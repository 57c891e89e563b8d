//! Askama templates for the browser UI.
//!
//! Each page struct renders one file under `templates/`. Every page carries a
//! `title` and a [`Nav`] for the shared layout in `base.html`.

use askama::Template;
use axum::response::Html;
use text2dataset_core::{ChatMessage, CommunityShare, Dataset, HistoryEntry, LabeledRow, User};

use crate::error::{AppError, AppResult};

/// Rows shown on the dataset page; the download has the rest.
const PREVIEW_ROWS: usize = 100;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn render(template: &impl Template) -> AppResult<Html<String>> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(format!("Template error: {e}")))
}

/// Account links in the page header.
pub struct Nav {
    pub logged_in: bool,
    pub username: String,
    pub is_admin: bool,
}

impl Nav {
    pub fn new(user: Option<&User>) -> Self {
        Self {
            logged_in: user.is_some(),
            username: user.map(|u| u.username.clone()).unwrap_or_default(),
            is_admin: user.is_some_and(|u| u.is_admin),
        }
    }
}

/// A tag with its query-string form.
pub struct TagRef {
    pub name: String,
    pub encoded: String,
}

impl TagRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            encoded: urlencoding::encode(name).into_owned(),
        }
    }
}

pub struct HistoryRow {
    pub dataset_id: String,
    pub name: String,
    pub mode: String,
    pub format: String,
    pub entity_count: usize,
    pub created: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            dataset_id: entry.dataset_id.to_string(),
            name: entry.name.clone(),
            mode: entry.params.mode.to_string(),
            format: entry.params.format.to_string(),
            entity_count: entry.entity_count,
            created: entry.created_at.format(TIME_FORMAT).to_string(),
        }
    }
}

pub struct ShareRow {
    pub share_id: String,
    pub dataset_id: String,
    pub name: String,
    pub description: String,
    pub owner: String,
    pub mode: String,
    pub format: String,
    pub entity_count: usize,
    pub likes: u64,
    pub downloads: u64,
    pub tags: Vec<TagRef>,
}

impl From<&CommunityShare> for ShareRow {
    fn from(share: &CommunityShare) -> Self {
        Self {
            share_id: share.id.to_string(),
            dataset_id: share.dataset_id.to_string(),
            name: share.name.clone(),
            description: share.description.clone(),
            owner: share.owner.clone(),
            mode: share.mode.to_string(),
            format: share.format.to_string(),
            entity_count: share.entity_count,
            likes: share.likes,
            downloads: share.download_count,
            tags: share.tags.iter().map(|t| TagRef::new(t)).collect(),
        }
    }
}

pub struct MessageRow {
    pub author: String,
    pub created: String,
    pub body: String,
}

impl From<&ChatMessage> for MessageRow {
    fn from(message: &ChatMessage) -> Self {
        Self {
            author: message.author.clone(),
            created: message.created_at.format(TIME_FORMAT).to_string(),
            body: message.body.clone(),
        }
    }
}

fn message_rows(messages: &[ChatMessage]) -> Vec<MessageRow> {
    messages.iter().map(MessageRow::from).collect()
}

/// Generation form.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub max_file_mb: usize,
}

impl<'a> IndexTemplate<'a> {
    pub fn new(user: Option<&User>, max_file_size: usize) -> Self {
        Self {
            title: "Generate a dataset",
            nav: Nav::new(user),
            max_file_mb: max_file_size / (1024 * 1024),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub error: &'a str,
}

impl<'a> LoginTemplate<'a> {
    pub fn new(error: Option<&'a str>) -> Self {
        Self {
            title: "Log in",
            nav: Nav::new(None),
            error: error.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub error: &'a str,
    pub password_min_length: usize,
}

impl<'a> SignupTemplate<'a> {
    pub fn new(error: Option<&'a str>, password_min_length: usize) -> Self {
        Self {
            title: "Sign up",
            nav: Nav::new(None),
            error: error.unwrap_or_default(),
            password_min_length,
        }
    }
}

/// Recently generated datasets.
#[derive(Template)]
#[template(path = "history.html")]
pub struct HistoryTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub entries: Vec<HistoryRow>,
}

impl<'a> HistoryTemplate<'a> {
    pub fn new(user: Option<&User>, entries: &[HistoryEntry]) -> Self {
        Self {
            title: "History",
            nav: Nav::new(user),
            entries: entries.iter().map(HistoryRow::from).collect(),
        }
    }
}

/// Shared datasets with the search form.
#[derive(Template)]
#[template(path = "community.html")]
pub struct CommunityTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub query: &'a str,
    pub tag: &'a str,
    pub popular: bool,
    pub shares: Vec<ShareRow>,
}

impl<'a> CommunityTemplate<'a> {
    pub fn new(
        user: Option<&User>,
        shares: &[CommunityShare],
        query: &'a str,
        tag: &'a str,
        popular: bool,
    ) -> Self {
        Self {
            title: "Community datasets",
            nav: Nav::new(user),
            query,
            tag,
            popular,
            shares: shares.iter().map(ShareRow::from).collect(),
        }
    }
}

/// One dataset: preview, sharing, moderation and its discussion.
#[derive(Template)]
#[template(path = "view.html")]
pub struct ViewTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub dataset_id: String,
    pub filename: &'a str,
    pub mode: String,
    pub format: String,
    pub entity_count: usize,
    pub sentence_count: usize,
    pub expires: String,
    pub rows: &'a [LabeledRow],
    pub is_shared: bool,
    pub share_description: &'a str,
    pub share_likes: u64,
    pub can_share: bool,
    pub owner: &'a str,
    pub messages: Vec<MessageRow>,
    pub chat_action: String,
}

impl<'a> ViewTemplate<'a> {
    pub fn new(
        user: Option<&User>,
        dataset: &'a Dataset,
        share: Option<&'a CommunityShare>,
        messages: &[ChatMessage],
    ) -> Self {
        let preview = dataset.rows.len().min(PREVIEW_ROWS);
        Self {
            title: &dataset.name,
            nav: Nav::new(user),
            dataset_id: dataset.id.to_string(),
            filename: &dataset.filename,
            mode: dataset.params.mode.to_string(),
            format: dataset.params.format.to_string(),
            entity_count: dataset.entity_count,
            sentence_count: dataset.params.sentence_count,
            expires: dataset.expires_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            rows: &dataset.rows[..preview],
            is_shared: share.is_some(),
            share_description: share.map(|s| s.description.as_str()).unwrap_or_default(),
            share_likes: share.map_or(0, |s| s.likes),
            can_share: share.is_none()
                && user.is_some_and(|u| dataset.is_owned_by(&u.username)),
            owner: dataset.owner.as_deref().unwrap_or_default(),
            messages: message_rows(messages),
            chat_action: format!("/chat/{}", dataset.id),
        }
    }
}

#[derive(Template)]
#[template(path = "global_chat.html")]
pub struct GlobalChatTemplate<'a> {
    pub title: &'a str,
    pub nav: Nav,
    pub messages: Vec<MessageRow>,
    pub chat_action: String,
}

impl<'a> GlobalChatTemplate<'a> {
    pub fn new(user: Option<&User>, messages: &[ChatMessage]) -> Self {
        Self {
            title: "Chat",
            nav: Nav::new(user),
            messages: message_rows(messages),
            chat_action: "/global_chat".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use text2dataset_core::{ChatTarget, GenerationParams, InputSource, LabelMode, OutputFormat};
    use uuid::Uuid;

    fn dataset(owner: &str) -> Dataset {
        Dataset::new(
            Uuid::now_v7(),
            "dataset_news.csv".into(),
            Some(owner.into()),
            GenerationParams {
                mode: LabelMode::Fast,
                format: OutputFormat::Csv,
                custom_name: Some("news".into()),
                sentence_count: 1,
                source: InputSource::Text,
            },
            vec![LabeledRow::new("R&D moved to Paris.", "Paris", "GPE")],
            chrono::Duration::hours(24),
        )
    }

    #[test]
    fn test_user_content_is_escaped() {
        let messages = vec![ChatMessage::new(
            "o'malley".into(),
            "<img src=x onerror=alert(1)>",
            ChatTarget::Global,
        )
        .unwrap()];

        let page = GlobalChatTemplate::new(None, &messages).render().unwrap();
        assert!(page.contains("&lt;img"));
        assert!(!page.contains("<img"));
        assert!(!page.contains("o'malley"));
        assert!(page.contains("Log in</a> to chat"));
    }

    #[test]
    fn test_nav_shows_account() {
        let user = User::new("alice".into(), "secret123", false);
        let page = IndexTemplate::new(Some(&user), 10 * 1024 * 1024).render().unwrap();
        assert!(page.contains("alice"));
        assert!(page.contains("/logout"));
        assert!(page.contains("max 10 MB"));
    }

    #[test]
    fn test_tag_links_are_url_encoded() {
        let data = dataset("alice");
        let share =
            CommunityShare::new(&data, "alice".into(), "Research and development", "R&D, a b")
                .unwrap();

        let page = CommunityTemplate::new(None, &[share], "", "R&D", false)
            .render()
            .unwrap();
        assert!(page.contains(r#"href="/community?tag=R%26D""#), "{page}");
        assert!(page.contains(r#"href="/community?tag=a%20b""#), "{page}");
        assert!(page.contains(">R&amp;D</a>"));
    }

    #[test]
    fn test_view_offers_share_only_to_owner() {
        let data = dataset("alice");
        let alice = User::new("alice".into(), "secret123", false);
        let bob = User::new("bob".into(), "secret123", true);

        let owner_page = ViewTemplate::new(Some(&alice), &data, None, &[]).render().unwrap();
        assert!(owner_page.contains(r#"action="/share_dataset""#));
        assert!(!owner_page.contains("/admin/delete_dataset"));
        assert!(owner_page.contains("R&amp;D moved to Paris."));

        let admin_page = ViewTemplate::new(Some(&bob), &data, None, &[]).render().unwrap();
        assert!(!admin_page.contains(r#"action="/share_dataset""#));
        assert!(admin_page.contains("/admin/delete_dataset"));
        assert!(admin_page.contains("ban alice"));
    }
}
