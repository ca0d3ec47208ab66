use reqwest::StatusCode;

use crate::metadata::types::{Classification, FetchOutcome};

/// Decide whether a fetch produced something worth extracting from.
///
/// 403 and 429 are explicit refusals; retrying them only burns the time
/// budget, so they go straight to the fallback like any other failure.
pub fn classify(outcome: &FetchOutcome) -> Classification {
    match outcome {
        FetchOutcome::Failed { error, attempts } => {
            Classification::Failed(format!("{error} after {attempts} attempt(s)"))
        }
        FetchOutcome::Response { response, .. } => match response.status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                Classification::Blocked(response.status)
            }
            status if status.is_success() => Classification::Usable,
            status => Classification::Failed(format!("http status {}", status.as_u16())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::{PageResponse, TransportError};

    fn response(status: u16) -> FetchOutcome {
        FetchOutcome::Response {
            response: PageResponse {
                status: StatusCode::from_u16(status).unwrap(),
                content_type: Some("text/html".into()),
                final_url: url::Url::parse("https://example.com").unwrap(),
                body: String::new(),
                truncated: false,
            },
            attempts: 1,
        }
    }

    #[test]
    fn test_success_is_usable() {
        assert_eq!(classify(&response(200)), Classification::Usable);
        assert_eq!(classify(&response(204)), Classification::Usable);
    }

    #[test]
    fn test_refusals_are_blocked() {
        assert_eq!(
            classify(&response(403)),
            Classification::Blocked(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            classify(&response(429)),
            Classification::Blocked(StatusCode::TOO_MANY_REQUESTS)
        );
    }

    #[test]
    fn test_other_statuses_fail() {
        for status in [304, 401, 404, 500, 503] {
            assert!(
                matches!(classify(&response(status)), Classification::Failed(_)),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_transport_failure_fails() {
        let outcome = FetchOutcome::Failed {
            error: TransportError::Timeout,
            attempts: 3,
        };
        assert_eq!(
            classify(&outcome),
            Classification::Failed("request timed out after 3 attempt(s)".into())
        );
    }
}
