/// External collaborator ports for workflow side effects
///
/// Action and AI steps never perform integrations inline. They call an
/// [`ActionPort`] or [`AiPort`]; the canned implementations here return fixed
/// success payloads and stand in until real email/SMS/CRM/model clients are wired.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use std::fmt;

/// Side-effecting operations an action step can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SendEmail,
    AssignUser,
    ChangeStage,
    ApplyTag,
    CreateTask,
    Notify,
    AiAutoReply,
    ScheduleCall,
    SendSms,
    Webhook,
    CrmSync,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "send_email" => ActionKind::SendEmail,
            "assign_user" => ActionKind::AssignUser,
            "change_stage" => ActionKind::ChangeStage,
            "apply_tag" => ActionKind::ApplyTag,
            "create_task" => ActionKind::CreateTask,
            "notify" => ActionKind::Notify,
            "ai_auto_reply" => ActionKind::AiAutoReply,
            "schedule_call" => ActionKind::ScheduleCall,
            "send_sms" => ActionKind::SendSms,
            "webhook" => ActionKind::Webhook,
            "crm_sync" => ActionKind::CrmSync,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SendEmail => "send_email",
            ActionKind::AssignUser => "assign_user",
            ActionKind::ChangeStage => "change_stage",
            ActionKind::ApplyTag => "apply_tag",
            ActionKind::CreateTask => "create_task",
            ActionKind::Notify => "notify",
            ActionKind::AiAutoReply => "ai_auto_reply",
            ActionKind::ScheduleCall => "schedule_call",
            ActionKind::SendSms => "send_sms",
            ActionKind::Webhook => "webhook",
            ActionKind::CrmSync => "crm_sync",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated-content operations an ai_action step can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiActionKind {
    DraftReply,
    CallSummary,
    ObjectionHandling,
    LeadInsights,
    NextBestAction,
    LeadScoring,
}

impl AiActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw {
            "draft_reply" => AiActionKind::DraftReply,
            "call_summary" => AiActionKind::CallSummary,
            "objection_handling" => AiActionKind::ObjectionHandling,
            "lead_insights" => AiActionKind::LeadInsights,
            "next_best_action" => AiActionKind::NextBestAction,
            "lead_scoring" => AiActionKind::LeadScoring,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiActionKind::DraftReply => "draft_reply",
            AiActionKind::CallSummary => "call_summary",
            AiActionKind::ObjectionHandling => "objection_handling",
            AiActionKind::LeadInsights => "lead_insights",
            AiActionKind::NextBestAction => "next_best_action",
            AiActionKind::LeadScoring => "lead_scoring",
        }
    }
}

impl fmt::Display for AiActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ActionPort: Send + Sync {
    /// Perform `kind` with the step config against the trigger payload
    async fn perform(&self, kind: ActionKind, config: &Value, payload: &Value) -> Result<Value>;
}

#[async_trait]
pub trait AiPort: Send + Sync {
    async fn generate(&self, kind: AiActionKind, config: &Value, payload: &Value) -> Result<Value>;

    /// Classify text as "positive", "negative" or "neutral"
    async fn analyze_sentiment(&self, text: &str) -> Result<String>;
}

fn field<'a>(source: &'a Value, key: &str) -> Option<&'a str> {
    source.get(key).and_then(Value::as_str)
}

/// Canned action results; no integration is contacted
#[derive(Debug, Clone, Default)]
pub struct CannedActions;

#[async_trait]
impl ActionPort for CannedActions {
    async fn perform(&self, kind: ActionKind, config: &Value, payload: &Value) -> Result<Value> {
        tracing::debug!("🧪 Canned action: {}", kind);

        let output = match kind {
            ActionKind::SendEmail => json!({
                "sent": true,
                "to": field(config, "to").or_else(|| field(payload, "email")),
                "subject": field(config, "subject"),
            }),
            ActionKind::AssignUser => json!({
                "assigned_to": field(config, "userId"),
                "lead_id": field(payload, "lead_id"),
            }),
            ActionKind::ChangeStage => json!({
                "stage": field(config, "stage"),
                "lead_id": field(payload, "lead_id"),
            }),
            ActionKind::ApplyTag => json!({
                "tag": field(config, "tag"),
                "lead_id": field(payload, "lead_id"),
            }),
            ActionKind::CreateTask => json!({
                "task_id": uuid::Uuid::new_v4().to_string(),
                "title": field(config, "title").unwrap_or("Follow up"),
            }),
            ActionKind::Notify => json!({ "notified": true }),
            ActionKind::AiAutoReply => json!({
                "sent": true,
                "reply": field(config, "reply"),
            }),
            ActionKind::ScheduleCall => json!({
                "scheduled": true,
                "scheduled_for": field(config, "scheduledFor"),
                "lead_id": field(payload, "lead_id"),
            }),
            ActionKind::SendSms => json!({
                "sent": true,
                "to": field(config, "to").or_else(|| field(payload, "phone")),
            }),
            ActionKind::Webhook => json!({
                "delivered": true,
                "url": field(config, "url"),
            }),
            ActionKind::CrmSync => json!({
                "synced": true,
                "crm": field(config, "crm").unwrap_or("default"),
            }),
        };

        Ok(output)
    }
}

/// Canned AI results: fixed templates plus a pseudo-random lead score
#[derive(Debug, Clone, Default)]
pub struct CannedAi;

#[async_trait]
impl AiPort for CannedAi {
    async fn generate(&self, kind: AiActionKind, config: &Value, payload: &Value) -> Result<Value> {
        tracing::debug!("🧪 Canned AI action: {}", kind);

        let name = field(payload, "name").unwrap_or("there");
        let score = payload.get("score").and_then(Value::as_f64).unwrap_or(50.0);

        let output = match kind {
            AiActionKind::DraftReply => json!({
                "reply": format!(
                    "Hi {}, thanks for reaching out! I'd love to set up a quick call to learn more about your needs.",
                    name
                ),
                "tone": field(config, "tone").unwrap_or("friendly"),
            }),
            AiActionKind::CallSummary => json!({
                "summary": format!("Call with {} covered current pain points and next steps.", name),
                "action_items": ["Send pricing overview", "Book follow-up demo"],
            }),
            AiActionKind::ObjectionHandling => json!({
                "objection": field(payload, "objection").or_else(|| field(payload, "message")),
                "responses": [
                    "Acknowledge the concern and ask what is driving it.",
                    "Share a customer story with a similar situation.",
                ],
            }),
            AiActionKind::LeadInsights => json!({
                "engagement": if score >= 70.0 { "high" } else if score >= 40.0 { "medium" } else { "low" },
                "insights": ["Engaged with recent emails", "Company is hiring in sales"],
            }),
            AiActionKind::NextBestAction => json!({
                "action": if score >= 70.0 { "schedule_demo" } else { "send_follow_up" },
            }),
            AiActionKind::LeadScoring => {
                let mut rng = rand::thread_rng();
                json!({
                    "score": rng.gen_range(0..=100),
                    "confidence": rng.gen_range(0.6..0.95),
                })
            }
        };

        Ok(output)
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<String> {
        const POSITIVE: [&str; 5] = ["great", "love", "interested", "thanks", "perfect"];
        const NEGATIVE: [&str; 5] = ["not interested", "expensive", "cancel", "angry", "unsubscribe"];

        let text = text.to_lowercase();
        let sentiment = if NEGATIVE.iter().any(|w| text.contains(w)) {
            "negative"
        } else if POSITIVE.iter().any(|w| text.contains(w)) {
            "positive"
        } else {
            "neutral"
        };

        Ok(sentiment.to_string())
    }
}
