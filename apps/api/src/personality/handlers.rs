use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::personality::composer::Report;
use crate::personality::demographics::Demographics;
use crate::personality::questions::{AnswerRecord, Question, RawAnswer};
use crate::state::AppState;

#[derive(Serialize)]
pub struct QuestionPageResponse {
    pub page: usize,
    pub total_pages: usize,
    pub questions: Vec<Question>,
}

#[derive(Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<RawAnswer>,
}

#[derive(Serialize)]
pub struct SubmitAnswersResponse {
    pub result_id: Uuid,
}

#[derive(Serialize)]
pub struct SubmitDemographicsResponse {
    pub top_coalition: String,
    pub match_percent: u8,
}

/// GET /api/v1/personality/questions/:page
/// Pages are 1-based.
pub async fn handle_get_questions(
    State(state): State<AppState>,
    Path(page): Path<usize>,
) -> Result<Json<QuestionPageResponse>, AppError> {
    let bank = state.engine.questions();
    let questions = bank
        .page(page)
        .ok_or_else(|| AppError::NotFound(format!("Question page {page} does not exist")))?;
    Ok(Json(QuestionPageResponse {
        page,
        total_pages: bank.total_pages(),
        questions: questions.to_vec(),
    }))
}

/// POST /api/v1/personality/results
pub async fn handle_submit_answers(
    State(state): State<AppState>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<(StatusCode, Json<SubmitAnswersResponse>), AppError> {
    let answers = req
        .answers
        .into_iter()
        .map(AnswerRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let result_id = state.engine.submit_answers(answers).await?;
    Ok((StatusCode::CREATED, Json(SubmitAnswersResponse { result_id })))
}

/// POST /api/v1/personality/results/:id/demographics
pub async fn handle_submit_demographics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(demographics): Json<Demographics>,
) -> Result<Json<SubmitDemographicsResponse>, AppError> {
    let top = state.engine.submit_demographics(id, demographics).await?;
    Ok(Json(SubmitDemographicsResponse {
        match_percent: top.match_percent(),
        top_coalition: top.name,
    }))
}

/// GET /api/v1/personality/results/:id/report
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, AppError> {
    let report = state.engine.get_report(id).await?;
    Ok(Json(Report::clone(&report)))
}
