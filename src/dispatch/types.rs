//! Outbound trigger payloads.

use serde::Serialize;

use crate::pipeline::event::{EventKind, ResultId, WebhookEvent};

/// An admitted event reduced to what the trigger endpoint needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub kind: EventKind,
    pub result_id: ResultId,
}

impl From<&WebhookEvent> for DispatchRequest {
    fn from(event: &WebhookEvent) -> Self {
        Self {
            kind: event.kind(),
            result_id: event.result_id().clone(),
        }
    }
}

/// Body of `POST /repos/{owner}/{repo}/dispatches`.
#[derive(Debug, Serialize)]
pub struct RepositoryDispatch<'a> {
    pub event_type: &'a str,
    pub client_payload: ClientPayload<'a>,
}

#[derive(Debug, Serialize)]
pub struct ClientPayload<'a> {
    pub result_id: &'a ResultId,
    pub event_type: &'static str,
}

impl DispatchRequest {
    pub fn body<'a>(&'a self, event_type: &'a str) -> RepositoryDispatch<'a> {
        RepositoryDispatch {
            event_type,
            client_payload: ClientPayload {
                result_id: &self.result_id,
                event_type: self.kind.as_str(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_shape() {
        let event = WebhookEvent::Deleted {
            result_id: ResultId::from(456),
        };
        let request = DispatchRequest::from(&event);
        let body = serde_json::to_value(request.body("c2_new_activity")).unwrap();

        assert_eq!(
            body,
            json!({
                "event_type": "c2_new_activity",
                "client_payload": {"result_id": 456, "event_type": "result-deleted"}
            })
        );
    }

    #[test]
    fn test_string_id_kept_as_string() {
        let request = DispatchRequest {
            kind: EventKind::ResultAdded,
            result_id: ResultId::Text("r-1".into()),
        };
        let body = serde_json::to_value(request.body("sync")).unwrap();
        assert_eq!(body["client_payload"]["result_id"], json!("r-1"));
    }
}
