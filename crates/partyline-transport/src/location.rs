//! Building socket URIs from a service location.

use url::Url;

use crate::TransportError;

/// Builds the socket URI for a session endpoint.
///
/// - `http` becomes `ws` and `https` becomes `wss`; `ws`/`wss` are kept.
/// - `path` is appended to the base path with exactly one `/` between them.
/// - `query` pairs are form-urlencoded and appended after any query the
///   base already had, in iteration order.
/// - Host, port, and fragment are preserved.
///
/// ```rust
/// use partyline_transport::build_location;
///
/// let url = build_location(
///     "https://party.example.com/v1",
///     "party/42/session",
///     [("access_token", "a b&c")],
/// )
/// .unwrap();
/// assert_eq!(
///     url.as_str(),
///     "wss://party.example.com/v1/party/42/session?access_token=a+b%26c"
/// );
/// ```
///
/// # Errors
/// Returns [`TransportError::InvalidLocation`] if `base` is not a URL or
/// uses a scheme other than `http`, `https`, `ws`, or `wss`.
pub fn build_location<I, K, V>(base: &str, path: &str, query: I) -> Result<Url, TransportError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url =
        Url::parse(base).map_err(|e| TransportError::InvalidLocation(format!("{base}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidLocation(format!(
                "unsupported scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidLocation(format!("cannot use scheme {scheme}")))?;

    let mut joined = url.path().trim_end_matches('/').to_owned();
    joined.push('/');
    joined.push_str(path.trim_start_matches('/'));
    url.set_path(&joined);

    let mut query = query.into_iter().peekable();
    if query.peek().is_some() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key.as_ref(), value.as_ref());
        }
    }

    Ok(url)
}
