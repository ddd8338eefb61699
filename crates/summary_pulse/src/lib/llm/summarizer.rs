use std::future::Future;

use credential_vault::Credential;

use crate::ClientError;

/// The remote summarization capability.
///
/// Implementations own the wire protocol entirely; callers only choose the
/// model name and handle the outcome.
pub trait Summarizer {
    fn summarize(
        &self,
        credential: &Credential,
        model_name: &str,
        content: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}
