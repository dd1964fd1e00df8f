//! Join links. The host advertises `{base}?join={CODE}`; a participant
//! opening that link gets the code pre-filled.

use url::Url;

use crate::core::code::{CodeError, SessionCode};

const JOIN_PARAM: &str = "join";

/// Join link errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinUrlError {
    /// Not a URL.
    #[error("invalid join url: {0}")]
    Url(#[from] url::ParseError),

    /// URL has no `join` parameter.
    #[error("join url has no code")]
    MissingCode,

    /// The `join` parameter is not a session code.
    #[error(transparent)]
    Code(#[from] CodeError),
}

/// Build the join link for `code` under `base`. Any existing `join`
/// parameter is replaced; other query parameters are kept.
pub fn join_url(base: &str, code: &SessionCode) -> Result<Url, JoinUrlError> {
    let mut url = Url::parse(base)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != JOIN_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query.append_pair(JOIN_PARAM, code.as_str());
    }
    Ok(url)
}

/// Pull the session code out of a join link.
pub fn code_from_join_url(link: &str) -> Result<SessionCode, JoinUrlError> {
    let url = Url::parse(link)?;
    let (_, raw) = url
        .query_pairs()
        .find(|(k, _)| k == JOIN_PARAM)
        .ok_or(JoinUrlError::MissingCode)?;
    Ok(SessionCode::parse(&raw)?)
}
