use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "JOB")]
    Job,
    #[serde(rename = "TOOL-NEGOTIATION")]
    ToolNegotiation,
    #[serde(rename = "TOOL-NEGOTIATION-RESPONSE")]
    ToolNegotiationResponse,
    #[serde(rename = "TOOL-RENTAL")]
    ToolRental,
    #[serde(rename = "MAINTENANCE")]
    Maintenance,
    #[serde(rename = "PAYMENT")]
    Payment,
    #[serde(rename = "ACCOUNT")]
    Account,
    #[serde(rename = "OTHER")]
    Other,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Job => "JOB",
            NotificationType::ToolNegotiation => "TOOL-NEGOTIATION",
            NotificationType::ToolNegotiationResponse => "TOOL-NEGOTIATION-RESPONSE",
            NotificationType::ToolRental => "TOOL-RENTAL",
            NotificationType::Maintenance => "MAINTENANCE",
            NotificationType::Payment => "PAYMENT",
            NotificationType::Account => "ACCOUNT",
            NotificationType::Other => "OTHER",
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "JOB" => NotificationType::Job,
            "TOOL-NEGOTIATION" => NotificationType::ToolNegotiation,
            "TOOL-NEGOTIATION-RESPONSE" => NotificationType::ToolNegotiationResponse,
            "TOOL-RENTAL" => NotificationType::ToolRental,
            "MAINTENANCE" => NotificationType::Maintenance,
            "PAYMENT" => NotificationType::Payment,
            "ACCOUNT" => NotificationType::Account,
            _ => NotificationType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub payload: Option<Value>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_fall_back_to_other() {
        assert_eq!(NotificationType::from("SMS".to_string()), NotificationType::Other);
        assert_eq!(
            NotificationType::from(NotificationType::ToolRental.as_str().to_string()),
            NotificationType::ToolRental
        );
    }

    #[test]
    fn serde_uses_column_values() {
        let v = serde_json::to_value(NotificationType::ToolNegotiationResponse).unwrap();
        assert_eq!(v, serde_json::json!("TOOL-NEGOTIATION-RESPONSE"));
    }
}
