use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Append-only record of a mutation: who did what, where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub route: String,
    pub subroute: String,
    pub action: String,
    /// RFC 3339
    pub date: String,
    /// Public view of the acting account, `{}` when anonymous
    pub actor: Value,
    pub summary: String,
}

impl HistoryRecord {
    pub fn new(
        route: impl Into<String>,
        subroute: impl Into<String>,
        action: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            route: route.into(),
            subroute: subroute.into(),
            action: action.into(),
            date: chrono::Utc::now().to_rfc3339(),
            actor: json!({}),
            summary: summary.into(),
        }
    }

    pub fn by(mut self, actor: Option<Value>) -> Self {
        if let Some(actor) = actor {
            self.actor = actor;
        }
        self
    }
}

/// A route and the subroutes seen under it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSummary {
    pub name: String,
    pub subroutes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_actor() {
        let record = HistoryRecord::new("patients", "profile", "create", "Created patient");
        assert_eq!(record.actor, json!({}));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.date).is_ok());
    }

    #[test]
    fn test_actor_attached() {
        let record = HistoryRecord::new("users", "sign", "sign-in", "Signed in")
            .by(Some(json!({ "id": "u1", "type": "user" })));
        assert_eq!(record.actor["id"], "u1");
    }
}
