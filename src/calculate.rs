use crate::answers::parse_answers;
use crate::error::CalculateError;
use crate::invoker::ModelInvoker;
use crate::models::{AnswerSet, CalculateRequest};
use crate::normalize::normalize;
use crate::prompt::build_prompt;

/// Run one sketch through normalize → model → parse.
///
/// Normalization and invocation failures abort the request. An unparseable
/// completion is not a failure: it yields an empty answer set.
pub async fn calculate(
    invoker: &dyn ModelInvoker,
    request: CalculateRequest,
) -> Result<AnswerSet, CalculateError> {
    let payload = request.image.ok_or(CalculateError::MissingImage)?;
    let image = normalize(&payload)?;

    let raw = invoker.invoke(build_prompt(), &image).await?;
    tracing::debug!(raw = %raw, "model completion");

    let answers = parse_answers(&raw);
    tracing::info!(answers = answers.len(), "sketch calculated");
    Ok(answers)
}
