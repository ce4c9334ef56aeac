/// Step execution handlers
///
/// Evaluates a single workflow step against the execution context:
/// - trigger: does the event payload match the configured trigger
/// - condition: gate on tags, fields, score, sentiment or message content
/// - action: side effect through the action port (notify also writes a notification row)
/// - ai_action: generated content through the AI port
/// - delay: compute the resume time
///
/// Expected business failures come back as unsuccessful [`StepOutcome`]s; errors from
/// ports or malformed config are folded into failures the same way.

use crate::runtime::integrations::{ActionKind, ActionPort, AiActionKind, AiPort};
use crate::store::{NewNotification, NotificationStore};
use crate::workflow::types::{ExecutionContext, Step, StepOutcome, StepType};
use anyhow::Result;
use chrono::{TimeDelta, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Known trigger subtypes; anything else activates unconditionally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerKind {
    FormSubmitted,
    ButtonClicked,
    NewLeadAdded,
    TagApplied,
    AiAssistantTriggered,
    Any,
}

impl TriggerKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("form_submitted") => TriggerKind::FormSubmitted,
            Some("button_clicked") => TriggerKind::ButtonClicked,
            Some("new_lead_added") => TriggerKind::NewLeadAdded,
            Some("tag_applied") => TriggerKind::TagApplied,
            Some("ai_assistant_triggered") => TriggerKind::AiAssistantTriggered,
            _ => TriggerKind::Any,
        }
    }
}

/// Known condition subtypes; anything else passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConditionKind {
    HasTag,
    FieldEquals,
    LeadScoreAbove,
    AiSentiment,
    MessageContains,
    Any,
}

impl ConditionKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("has_tag") => ConditionKind::HasTag,
            Some("field_equals") => ConditionKind::FieldEquals,
            Some("lead_score_above") => ConditionKind::LeadScoreAbove,
            Some("ai_sentiment") => ConditionKind::AiSentiment,
            Some("message_contains") => ConditionKind::MessageContains,
            _ => ConditionKind::Any,
        }
    }
}

pub struct StepExecutor {
    actions: Arc<dyn ActionPort>,
    ai: Arc<dyn AiPort>,
    notifications: NotificationStore,
}

impl StepExecutor {
    pub fn new(actions: Arc<dyn ActionPort>, ai: Arc<dyn AiPort>, notifications: NotificationStore) -> Self {
        Self {
            actions,
            ai,
            notifications,
        }
    }

    /// Execute a single step; never fails, errors become unsuccessful outcomes
    pub async fn execute_step(&self, step: &Step, context: &ExecutionContext) -> StepOutcome {
        tracing::info!("📍 Executing step '{}' ({})", step.id, step.step_type.as_str());
        let start_time = std::time::Instant::now();

        let result = match step.step_type {
            StepType::Trigger => Ok(self.evaluate_trigger(step, &context.trigger_data)),
            StepType::Condition => self.evaluate_condition(step, &context.trigger_data).await,
            StepType::Action => self.execute_action(step, context).await,
            StepType::AiAction => self.execute_ai_action(step, &context.trigger_data).await,
            StepType::Delay => self.compute_delay(step),
        };

        let outcome = result.unwrap_or_else(|e| StepOutcome::failure(step, e.to_string()));

        if outcome.success {
            tracing::info!("✅ Step '{}' succeeded in {:?}: {}", step.id, start_time.elapsed(), outcome.message);
        } else {
            tracing::warn!("❌ Step '{}' failed in {:?}: {}", step.id, start_time.elapsed(), outcome.message);
        }

        outcome
    }

    fn evaluate_trigger(&self, step: &Step, payload: &Value) -> StepOutcome {
        match TriggerKind::parse(step.config_str("triggerType")) {
            TriggerKind::FormSubmitted => {
                match_identified(step, payload, "form_id", step.config_str("formId"), "Form")
            }
            TriggerKind::ButtonClicked => {
                match_identified(step, payload, "button_id", step.config_str("buttonId"), "Button")
            }
            TriggerKind::AiAssistantTriggered => {
                match_identified(step, payload, "assistant_id", step.config_str("assistantId"), "AI assistant")
            }
            TriggerKind::NewLeadAdded => {
                let lead_id = payload
                    .get("lead_id")
                    .and_then(Value::as_str)
                    .or_else(|| lookup(payload, "lead.id").and_then(Value::as_str));
                match lead_id {
                    Some(id) => StepOutcome::success(step, format!("New lead {} added", id), json!({ "lead_id": id })),
                    None => StepOutcome::failure(step, "Trigger data has no new lead"),
                }
            }
            TriggerKind::TagApplied => {
                let tags = payload_tags(payload);
                if tags.is_empty() {
                    return StepOutcome::failure(step, "Trigger data has no applied tag");
                }
                match step.config_str("tag") {
                    Some(wanted) if !tags.iter().any(|t| t.eq_ignore_ascii_case(wanted)) => {
                        StepOutcome::failure(step, format!("Tag '{}' was not applied", wanted))
                    }
                    _ => StepOutcome::success(step, format!("Tag applied: {}", tags.join(", ")), json!({ "tags": tags })),
                }
            }
            TriggerKind::Any => StepOutcome::success(step, "Trigger activated", Value::Null),
        }
    }

    async fn evaluate_condition(&self, step: &Step, payload: &Value) -> Result<StepOutcome> {
        let kind = ConditionKind::parse(step.config_str("conditionType"));
        if kind == ConditionKind::Any {
            return Ok(StepOutcome::success(step, "No condition configured", Value::Null));
        }

        let expected = step
            .config_text("conditionValue")
            .ok_or_else(|| anyhow::anyhow!("Condition '{}' is missing conditionValue", step.id))?;

        let (passed, observed) = match kind {
            ConditionKind::HasTag => {
                let tags = payload_tags(payload);
                (tags.iter().any(|t| t.eq_ignore_ascii_case(&expected)), json!(tags))
            }
            ConditionKind::FieldEquals => {
                let field = step
                    .config_str("field")
                    .ok_or_else(|| anyhow::anyhow!("Condition '{}' is missing field", step.id))?;
                let actual = lookup(payload, field).and_then(value_text);
                (actual.as_deref() == Some(expected.as_str()), json!(actual))
            }
            ConditionKind::LeadScoreAbove => {
                let threshold: f64 = expected
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("conditionValue '{}' is not a number", expected))?;
                let field = step.config_str("field").unwrap_or("score");
                let Some(score) = lookup(payload, field).and_then(value_number) else {
                    return Ok(StepOutcome::failure(step, format!("Trigger data has no '{}'", field)));
                };
                (score > threshold, json!(score))
            }
            ConditionKind::AiSentiment => {
                let sentiment = match payload.get("sentiment").and_then(Value::as_str) {
                    Some(sentiment) => sentiment.to_string(),
                    None => {
                        let text = message_text(step, payload).unwrap_or_default();
                        self.ai.analyze_sentiment(&text).await?
                    }
                };
                (sentiment.eq_ignore_ascii_case(&expected), json!(sentiment))
            }
            ConditionKind::MessageContains => {
                let text = message_text(step, payload).unwrap_or_default();
                (text.to_lowercase().contains(&expected.to_lowercase()), json!(text))
            }
            ConditionKind::Any => (true, Value::Null),
        };

        let label = step.config_str("conditionType").unwrap_or_default();
        let data = json!({ "expected": expected, "observed": observed });

        Ok(if passed {
            StepOutcome::success(step, format!("Condition {} met", label), data)
        } else {
            StepOutcome {
                data,
                ..StepOutcome::failure(step, format!("Condition {} not met", label))
            }
        })
    }

    async fn execute_action(&self, step: &Step, context: &ExecutionContext) -> Result<StepOutcome> {
        let raw = step
            .config_str("actionType")
            .ok_or_else(|| anyhow::anyhow!("Action '{}' is missing actionType", step.id))?;
        let kind = ActionKind::parse(raw).ok_or_else(|| anyhow::anyhow!("Unknown action type: {}", raw))?;
        let payload = &context.trigger_data;

        let output = match kind {
            ActionKind::Notify => {
                let notification = NewNotification {
                    user_id: step
                        .config_str("userId")
                        .or_else(|| payload.get("assigned_to").and_then(Value::as_str))
                        .unwrap_or("system")
                        .to_string(),
                    company_id: context.company_id.clone().unwrap_or_else(|| "default".to_string()),
                    kind: "workflow_notification".to_string(),
                    title: step.config_str("title").unwrap_or("Workflow notification").to_string(),
                    message: step.config_str("message").unwrap_or_default().to_string(),
                    metadata: json!({
                        "workflow_id": context.workflow_id,
                        "execution_id": context.execution_id,
                        "step_id": step.id,
                    }),
                };
                let id = self.notifications.insert(notification).await?;
                json!({ "notification_id": id })
            }
            ActionKind::AiAutoReply => {
                let draft = self.ai.generate(AiActionKind::DraftReply, &step.config, payload).await?;
                let mut config = step.config.clone();
                if let (Some(map), Some(reply)) = (config.as_object_mut(), draft.get("reply")) {
                    map.insert("reply".to_string(), reply.clone());
                }
                self.actions.perform(kind, &config, payload).await?
            }
            _ => self.actions.perform(kind, &step.config, payload).await?,
        };

        Ok(StepOutcome::success(step, format!("Action {} completed", kind), output))
    }

    async fn execute_ai_action(&self, step: &Step, payload: &Value) -> Result<StepOutcome> {
        let raw = step
            .config_str("aiActionType")
            .ok_or_else(|| anyhow::anyhow!("AI action '{}' is missing aiActionType", step.id))?;
        let kind = AiActionKind::parse(raw).ok_or_else(|| anyhow::anyhow!("Unknown AI action type: {}", raw))?;

        let output = self.ai.generate(kind, &step.config, payload).await?;
        Ok(StepOutcome::success(step, format!("AI action {} completed", kind), output))
    }

    /// Informational only: the resume time is reported, execution is not suspended
    fn compute_delay(&self, step: &Step) -> Result<StepOutcome> {
        let amount = step
            .config
            .get("delayAmount")
            .and_then(value_number)
            .ok_or_else(|| anyhow::anyhow!("Delay '{}' is missing a numeric delayAmount", step.id))?;
        if amount < 0.0 {
            return Err(anyhow::anyhow!("Delay '{}' has a negative amount", step.id));
        }

        let unit = step.config_str("delayUnit").unwrap_or("minutes");
        let unit_seconds: f64 = match unit {
            "minute" | "minutes" => 60.0,
            "hour" | "hours" => 3_600.0,
            "day" | "days" => 86_400.0,
            other => return Err(anyhow::anyhow!("Unknown delay unit: {}", other)),
        };

        let seconds = (amount * unit_seconds).round();
        let resume_at = (seconds < i64::MAX as f64)
            .then(|| TimeDelta::try_seconds(seconds as i64))
            .flatten()
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .ok_or_else(|| anyhow::anyhow!("Delay '{}' of {} {} is out of range", step.id, amount, unit))?;
        let delay_seconds = seconds as i64;

        Ok(StepOutcome::success(
            step,
            format!("Delay of {} {} until {}", amount, unit, resume_at.to_rfc3339()),
            json!({ "resume_at": resume_at, "delay_seconds": delay_seconds }),
        ))
    }
}

/// Trigger that matches when the payload carries `key`, and the configured id if any
fn match_identified(step: &Step, payload: &Value, key: &str, wanted: Option<&str>, label: &str) -> StepOutcome {
    let Some(actual) = payload.get(key).and_then(value_text) else {
        return StepOutcome::failure(step, format!("Trigger data has no {}", key));
    };

    match wanted {
        Some(wanted) if wanted != actual => {
            StepOutcome::failure(step, format!("{} {} does not match {}", label, actual, wanted))
        }
        _ => StepOutcome::success(step, format!("{} {} matched", label, actual), json!({ key: actual })),
    }
}

/// Resolve a field in the payload: `$`-prefixed paths are JSONPath, others dot notation
pub(crate) fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.starts_with('$') {
        return match jsonpath_lib::select(payload, path) {
            Ok(found) => found.into_iter().next(),
            Err(e) => {
                tracing::warn!("⚠️ Invalid JSONPath '{}': {:?}", path, e);
                None
            }
        };
    }

    path.split('.').try_fold(payload, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Tags from `tags` (array) and/or `tag` (single string)
fn payload_tags(payload: &Value) -> Vec<String> {
    let mut tags: Vec<String> = payload
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    if let Some(tag) = payload.get("tag").and_then(Value::as_str) {
        tags.push(tag.to_string());
    }
    tags
}

fn message_text(step: &Step, payload: &Value) -> Option<String> {
    let field = step.config_str("field").unwrap_or("message");
    lookup(payload, field).and_then(value_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::integrations::{CannedActions, CannedAi};
    use crate::store::test_utils::setup_test_pool;
    use crate::workflow::types::Workflow;

    async fn executor() -> (StepExecutor, NotificationStore) {
        let notifications = NotificationStore::new(setup_test_pool().await);
        let executor = StepExecutor::new(Arc::new(CannedActions), Arc::new(CannedAi), notifications.clone());
        (executor, notifications)
    }

    fn context(trigger_data: Value) -> ExecutionContext {
        let workflow = Workflow {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            description: None,
            company_id: Some("acme".to_string()),
            steps: vec![],
            connections: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ExecutionContext::new(&workflow, trigger_data)
    }

    fn condition(config: Value) -> Step {
        Step::new("c1", StepType::Condition, config)
    }

    #[tokio::test]
    async fn has_tag_matches_any_listed_tag() {
        let (executor, _) = executor().await;
        let step = condition(json!({ "conditionType": "has_tag", "conditionValue": "hot" }));

        let outcome = executor
            .execute_step(&step, &context(json!({ "tags": ["hot", "enterprise"] })))
            .await;
        assert!(outcome.success);

        let outcome = executor.execute_step(&step, &context(json!({ "tags": ["cold"] }))).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn lead_score_above_is_strict() {
        let (executor, _) = executor().await;
        let step = condition(json!({ "conditionType": "lead_score_above", "conditionValue": "50" }));

        assert!(!executor.execute_step(&step, &context(json!({ "score": 40 }))).await.success);
        assert!(!executor.execute_step(&step, &context(json!({ "score": 50 }))).await.success);
        assert!(executor.execute_step(&step, &context(json!({ "score": 51.5 }))).await.success);
        assert!(!executor.execute_step(&step, &context(json!({}))).await.success);
    }

    #[tokio::test]
    async fn field_equals_supports_dot_and_jsonpath() {
        let (executor, _) = executor().await;
        let payload = json!({ "lead": { "stage": "qualified", "employees": 250 } });

        let dotted = condition(json!({ "conditionType": "field_equals", "field": "lead.stage", "conditionValue": "qualified" }));
        assert!(executor.execute_step(&dotted, &context(payload.clone())).await.success);

        let jsonpath = condition(json!({ "conditionType": "field_equals", "field": "$.lead.employees", "conditionValue": 250 }));
        assert!(executor.execute_step(&jsonpath, &context(payload.clone())).await.success);

        let missing_field = condition(json!({ "conditionType": "field_equals", "conditionValue": "x" }));
        let outcome = executor.execute_step(&missing_field, &context(payload)).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("missing field"));
    }

    #[tokio::test]
    async fn sentiment_and_message_conditions() {
        let (executor, _) = executor().await;

        let sentiment = condition(json!({ "conditionType": "ai_sentiment", "conditionValue": "negative" }));
        let outcome = executor
            .execute_step(&sentiment, &context(json!({ "message": "Way too expensive for us" })))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.data["observed"], "negative");

        let explicit = executor
            .execute_step(&sentiment, &context(json!({ "sentiment": "positive", "message": "cancel" })))
            .await;
        assert!(!explicit.success);

        let contains = condition(json!({ "conditionType": "message_contains", "conditionValue": "PRICING" }));
        assert!(executor
            .execute_step(&contains, &context(json!({ "message": "Can you share pricing?" })))
            .await
            .success);
    }

    #[tokio::test]
    async fn unknown_condition_type_passes() {
        let (executor, _) = executor().await;
        let outcome = executor.execute_step(&condition(json!({})), &context(json!({}))).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn triggers_match_against_payload() {
        let (executor, _) = executor().await;

        let form = Step::new("t1", StepType::Trigger, json!({ "triggerType": "form_submitted", "formId": "demo" }));
        assert!(executor.execute_step(&form, &context(json!({ "form_id": "demo" }))).await.success);
        assert!(!executor.execute_step(&form, &context(json!({ "form_id": "other" }))).await.success);
        assert!(!executor.execute_step(&form, &context(json!({}))).await.success);

        let lead = Step::new("t2", StepType::Trigger, json!({ "triggerType": "new_lead_added" }));
        assert!(executor.execute_step(&lead, &context(json!({ "lead": { "id": "l9" } }))).await.success);

        let tag = Step::new("t3", StepType::Trigger, json!({ "triggerType": "tag_applied", "tag": "vip" }));
        assert!(executor.execute_step(&tag, &context(json!({ "tag": "VIP" }))).await.success);
        assert!(!executor.execute_step(&tag, &context(json!({ "tags": ["cold"] }))).await.success);

        let any = Step::new("t4", StepType::Trigger, json!({}));
        assert!(executor.execute_step(&any, &context(json!(null))).await.success);
    }

    #[tokio::test]
    async fn notify_action_writes_notification() {
        let (executor, notifications) = executor().await;
        let step = Step::new(
            "a1",
            StepType::Action,
            json!({ "actionType": "notify", "title": "Hot lead", "message": "Call now", "userId": "rep-7" }),
        );

        let outcome = executor.execute_step(&step, &context(json!({}))).await;
        assert!(outcome.success);

        let rows = notifications.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, "rep-7");
        assert_eq!(rows[0].company_id, "acme");
        assert_eq!(rows[0].metadata["workflow_id"], "wf-1");
    }

    #[tokio::test]
    async fn auto_reply_sends_drafted_text() {
        let (executor, _) = executor().await;
        let step = Step::new("a2", StepType::Action, json!({ "actionType": "ai_auto_reply" }));

        let outcome = executor.execute_step(&step, &context(json!({ "name": "Dana" }))).await;
        assert!(outcome.success);
        assert!(outcome.data["reply"].as_str().unwrap().contains("Dana"));
    }

    #[tokio::test]
    async fn unknown_action_fails_without_panicking() {
        let (executor, _) = executor().await;
        let step = Step::new("a3", StepType::Action, json!({ "actionType": "fax" }));
        let outcome = executor.execute_step(&step, &context(json!({}))).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("Unknown action type"));
    }

    #[tokio::test]
    async fn delay_reports_resume_time_without_sleeping() {
        let (executor, _) = executor().await;
        let step = Step::new("d1", StepType::Delay, json!({ "delayAmount": 2, "delayUnit": "hours" }));

        let before = Utc::now();
        let outcome = executor.execute_step(&step, &context(json!({}))).await;
        assert!(outcome.success);
        assert_eq!(outcome.data["delay_seconds"], 7_200);

        let resume_at: chrono::DateTime<Utc> = serde_json::from_value(outcome.data["resume_at"].clone()).unwrap();
        assert!(resume_at >= before + TimeDelta::hours(2));
        assert!(resume_at <= Utc::now() + TimeDelta::hours(2));

        let bad_unit = Step::new("d2", StepType::Delay, json!({ "delayAmount": 1, "delayUnit": "weeks" }));
        assert!(!executor.execute_step(&bad_unit, &context(json!({}))).await.success);
    }

    #[tokio::test]
    async fn delay_beyond_calendar_range_fails_the_step() {
        let (executor, _) = executor().await;

        for amount in [json!(1e12), json!(1e300), json!(i64::MAX)] {
            let step = Step::new("d3", StepType::Delay, json!({ "delayAmount": amount, "delayUnit": "days" }));
            let outcome = executor.execute_step(&step, &context(json!({}))).await;
            assert!(!outcome.success);
            assert!(outcome.message.contains("out of range"));
        }
    }

    #[test]
    fn lookup_walks_arrays_by_index() {
        let payload = json!({ "contacts": [{ "email": "a@x.io" }, { "email": "b@x.io" }] });
        assert_eq!(lookup(&payload, "contacts.1.email"), Some(&json!("b@x.io")));
        assert_eq!(lookup(&payload, "contacts.5.email"), None);
    }
}
