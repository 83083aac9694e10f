//! Request framing.

use crate::Source;

/// Builds the complete POST request for `body`.
pub(crate) fn build_request(source: &Source, user_agent: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}\r\n\
         User-Agent: {}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        source.path(),
        source.authority(),
        user_agent,
        body.len(),
        body
    )
}
