use super::identity::Identity;
use super::state::AppState;
use super::workflow::fetch_and_ingest;
use crate::domain::{
    article::{ingest_articles, BiasLabel, IngestReport, SourceArticle},
    assistant::{answer_question, summarize, SummaryStyle},
    chat::{get_chat_history, save_chat_history, ChatMessage},
    feed::{get_feed, FeedItem, FeedQuery},
    user::{require_identity, resolve_user, update_profile, ProfileUpdate, User},
    vote::{record_vote, Vote},
};
use crate::types::{NewsError, NewsResult};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// APIのルーティングを構築する
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/feed", get(feed_handler))
        .route("/vote", post(vote_handler))
        .route("/articles/ingest", post(ingest_handler))
        .route("/summary", post(summary_handler))
        .route("/chat", post(chat_handler))
        .route(
            "/chat-history",
            get(get_chat_history_handler).post(save_chat_history_handler),
        )
        .route(
            "/user",
            get(user_handler)
                .put(update_user_handler)
                .post(update_user_handler),
        )
        .with_state(state)
}

// axumの抽出エラーも`{"error"}`形式の400として返す
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> NewsResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| NewsError::invalid_input(rejection.body_text()))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> NewsResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| NewsError::invalid_input(rejection.body_text()))
}

fn parse_article_id(raw: &str) -> NewsResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| NewsError::invalid_input(format!("articleIdが不正です: {}", raw)))
}

// 空の値（`limit=`）は未指定として扱う
fn parse_limit(raw: Option<&str>) -> NewsResult<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| NewsError::invalid_input(format!("limitが不正です: {}", value))),
    }
}

fn parse_bias(raw: Option<&str>) -> NewsResult<Option<BiasLabel>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<BiasLabel>()
            .map(Some)
            .map_err(|e| NewsError::invalid_input(e.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<String>,
    pub category: Option<String>,
    /// left / center / right
    pub bias: Option<String>,
}

async fn feed_handler(
    State(state): State<AppState>,
    identity: Identity,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> NewsResult<Json<Vec<FeedItem>>> {
    let params = query_params(params)?;
    let query = FeedQuery {
        limit: parse_limit(params.limit.as_deref())?,
        category: params.category.filter(|c| !c.trim().is_empty()),
        bias_label: parse_bias(params.bias.as_deref())?,
    };
    let items = get_feed(&query, identity.as_deref(), &state.pool).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub article_id: String,
    /// true=賛成、false=反対
    pub vote_type: bool,
}

async fn vote_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> NewsResult<Json<Vote>> {
    // 認証をリクエスト本文の検証より先に行う
    let external_id = require_identity(identity.as_deref())?;
    let body = json_body(body)?;
    let article_id = parse_article_id(&body.article_id)?;

    let vote = record_vote(Some(external_id), article_id, body.vote_type, &state.pool).await?;
    Ok(Json(vote))
}

/// 記事を直接渡すか、カテゴリを指定してニュースAPIから取得する（どちらか一方）
#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    pub articles: Option<Vec<SourceArticle>>,
    pub category: Option<String>,
}

async fn ingest_handler(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> NewsResult<Json<IngestReport>> {
    let body = json_body(body)?;
    let report = match (body.articles, body.category) {
        (Some(articles), None) => ingest_articles(&articles, &state.pool).await?,
        (None, Some(category)) => {
            let category = category.trim();
            if category.is_empty() {
                return Err(NewsError::invalid_input("categoryが空です"));
            }
            fetch_and_ingest(state.news_client.as_ref(), category, &state.pool).await?
        }
        (Some(_), Some(_)) => {
            return Err(NewsError::invalid_input(
                "articlesとcategoryは同時に指定できません",
            ))
        }
        (None, None) => {
            return Err(NewsError::invalid_input(
                "articlesまたはcategoryのどちらかが必要です",
            ))
        }
    };
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub content: String,
    #[serde(default)]
    pub style: SummaryStyle,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

async fn summary_handler(
    State(state): State<AppState>,
    body: Result<Json<SummaryRequest>, JsonRejection>,
) -> NewsResult<Json<SummaryResponse>> {
    let body = json_body(body)?;
    let summary = summarize(state.completion_client.as_ref(), &body.content, body.style).await?;
    Ok(Json(SummaryResponse { summary }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> NewsResult<Json<ChatResponse>> {
    let body = json_body(body)?;
    let answer =
        answer_question(state.completion_client.as_ref(), &body.content, &body.question).await?;
    Ok(Json(ChatResponse { answer }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryParams {
    pub article_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub messages: Vec<ChatMessage>,
}

async fn get_chat_history_handler(
    State(state): State<AppState>,
    identity: Identity,
    params: Result<Query<ChatHistoryParams>, QueryRejection>,
) -> NewsResult<Json<ChatHistoryResponse>> {
    let external_id = require_identity(identity.as_deref())?;
    let params = query_params(params)?;
    let article_id = parse_article_id(&params.article_id)?;

    let messages = get_chat_history(Some(external_id), article_id, &state.pool).await?;
    Ok(Json(ChatHistoryResponse { messages }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatHistoryRequest {
    pub article_id: String,
    pub messages: Vec<ChatMessage>,
}

async fn save_chat_history_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<SaveChatHistoryRequest>, JsonRejection>,
) -> NewsResult<StatusCode> {
    let external_id = require_identity(identity.as_deref())?;
    let body = json_body(body)?;
    let article_id = parse_article_id(&body.article_id)?;

    save_chat_history(Some(external_id), article_id, &body.messages, &state.pool).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> NewsResult<Json<User>> {
    let external_id = require_identity(identity.as_deref())?;
    let user = resolve_user(external_id, &state.pool).await?;
    Ok(Json(user))
}

async fn update_user_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> NewsResult<Json<User>> {
    let external_id = require_identity(identity.as_deref())?;
    let update = json_body(body)?;
    let user = update_profile(Some(external_id), &update, &state.pool).await?;
    Ok(Json(user))
}
