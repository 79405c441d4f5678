use super::consts;
use super::AppState;
use crate::middleware::other::{self, CallerId};
use actix_web::{
    http::StatusCode, middleware::from_fn, web, web::Json, web::Path, web::Query, HttpMessage,
    HttpRequest, HttpResponse, Scope,
};
use application::command::vote::VoteTally;
use application::error::AppError;
use application::query::catalog::{CollectionCount, SongListing};
use application::store::StoreError;
use domain::song::SongError;
use domain::value::{SongId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing or malformed {} header", consts::USER_ID_HEADER)]
    MissingCaller,
    #[error(transparent)]
    App(#[from] AppError),
}

impl actix_web::error::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCaller => StatusCode::UNAUTHORIZED,
            Self::App(AppError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::App(AppError::SongNotFound(_)) => StatusCode::NOT_FOUND,
            Self::App(AppError::SongError(SongError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::App(AppError::StoreError(StoreError::Timeout(_))) => StatusCode::SERVICE_UNAVAILABLE,
            Self::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteTallyResponse {
    pub likes: u64,
    pub dislikes: u64,
    /// "like" / "dislike" / "none"，匿名查询时不返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<&'static str>,
}

impl From<VoteTally> for VoteTallyResponse {
    fn from(tally: VoteTally) -> Self {
        Self {
            likes: tally.likes,
            dislikes: tally.dislikes,
            user_vote: tally.user_vote.map(|s| s.as_str()),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SongResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub like_count: i32,
    pub dislike_count: i32,
    pub play_count: i32,
    pub deleted: bool,
}

impl From<SongListing> for SongResponse {
    fn from(listing: SongListing) -> Self {
        let song = listing.song;
        Self {
            id: song.id.as_i64(),
            name: song.name,
            url: listing.url,
            like_count: song.like_count,
            dislike_count: song.dislike_count,
            play_count: song.play_count,
            deleted: song.deleted,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub key: String,
    pub name: String,
    pub active_songs: usize,
}

impl From<CollectionCount> for CollectionResponse {
    fn from(count: CollectionCount) -> Self {
        Self {
            key: count.key,
            name: count.name,
            active_songs: count.active_songs,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListSongsQuery {
    pub collection: String,
    #[serde(default, alias = "include_deleted")]
    pub include_deleted: bool,
}

fn caller(req: &HttpRequest) -> Option<UserId> {
    req.extensions().get::<CallerId>().map(|c| c.0)
}

fn required_caller(req: &HttpRequest) -> Result<UserId, ApiError> {
    caller(req).ok_or(ApiError::MissingCaller)
}

async fn like(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: Path<i64>,
) -> Result<Json<VoteTallyResponse>, ApiError> {
    let user_id = required_caller(&req)?;
    let tally = state
        .votes
        .like(SongId::from(path.into_inner()), user_id)
        .await?;
    Ok(Json(tally.into()))
}

async fn dislike(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: Path<i64>,
) -> Result<Json<VoteTallyResponse>, ApiError> {
    let user_id = required_caller(&req)?;
    let tally = state
        .votes
        .dislike(SongId::from(path.into_inner()), user_id)
        .await?;
    Ok(Json(tally.into()))
}

async fn cancel_vote(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: Path<i64>,
) -> Result<Json<VoteTallyResponse>, ApiError> {
    let user_id = required_caller(&req)?;
    let tally = state
        .votes
        .cancel(SongId::from(path.into_inner()), user_id)
        .await?;
    Ok(Json(tally.into()))
}

async fn vote_counts(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: Path<i64>,
) -> Result<Json<VoteTallyResponse>, ApiError> {
    let tally = state
        .votes
        .counts(SongId::from(path.into_inner()), caller(&req))
        .await?;
    Ok(Json(tally.into()))
}

async fn list_songs(
    state: web::Data<AppState>,
    Query(query): Query<ListSongsQuery>,
) -> Result<Json<Vec<SongResponse>>, ApiError> {
    let listings = state
        .catalog
        .get(&query.collection, query.include_deleted)
        .await?;
    Ok(Json(listings.into_iter().map(SongResponse::from).collect()))
}

async fn list_collections(
    state: web::Data<AppState>,
) -> Result<Json<Vec<CollectionResponse>>, ApiError> {
    let counts = state.catalog.collection_counts().await?;
    Ok(Json(counts.into_iter().map(CollectionResponse::from).collect()))
}

async fn delete_song(
    state: web::Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    state.songs.delete_song(SongId::from(path.into_inner())).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn restore_song(
    state: web::Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    state.songs.restore_song(SongId::from(path.into_inner())).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn record_play(
    state: web::Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    state.songs.record_play(SongId::from(path.into_inner())).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn scope_songs() -> Scope {
    web::scope("/songs")
        .route("", web::get().to(list_songs))
        .route("/{id}/like", web::post().to(like))
        .route("/{id}/dislike", web::post().to(dislike))
        .route("/{id}/vote", web::delete().to(cancel_vote))
        .route("/{id}/votes", web::get().to(vote_counts))
        .route("/{id}/delete", web::post().to(delete_song))
        .route("/{id}/restore", web::post().to(restore_song))
        .route("/{id}/play", web::post().to(record_play))
}

pub fn configure_service(svc: &mut web::ServiceConfig) {
    svc.service(
        web::scope(consts::URL_PATH_NATIVE_API)
            .wrap(from_fn(other::caller_identity))
            .service(scope_songs())
            .route("/collections", web::get().to(list_collections)),
    );
}
