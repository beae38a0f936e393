//! User-defined condition/action rules over article fields.
//!
//! Rules are stored as JSON-shaped [`Rule`] values and compiled before use:
//! unknown fields, operators and action types fail deserialization, and
//! compilation rejects malformed regexes and ill-typed values.
//!
//! Conditions (all must hold, an empty list always matches), case-insensitive:
//! - `contains` / `not_contains`: substring
//! - `equals` / `not_equals`: whole value
//! - `matches_regex`: regex search
//! - `greater_than` / `less_than`: numeric, anything non-numeric is false
//! - `in_list` / `not_in_list`: membership in the given list
//!
//! List fields (`topics`) match when any element does; the negated operators
//! match when no element does. A missing field never matches.

use metrics::counter;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::article::{Article, ArticleId, ArticleState, UserId};
use crate::error::ValidationError;
use crate::logging::TARGET_RULES;
use crate::metrics::{describe, RULES_MATCHED_TOTAL};

pub type RuleId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    #[default]
    Filter,
    Priority,
    Category,
    Extract,
    Summarize,
    CustomPrompt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Zero or negative asks the store for a fresh id.
    #[serde(default)]
    pub id: RuleId,
    #[serde(default)]
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    /// Content, or the description when there is no content.
    Content,
    Description,
    Author,
    Link,
    Sentiment,
    Topics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    MatchesRegex,
    GreaterThan,
    LessThan,
    InList,
    NotInList,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::MatchesRegex => "matches_regex",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::InList => "in_list",
            Operator::NotInList => "not_in_list",
        }
    }
}

/// Scalar as written in rule JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl Scalar {
    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Hide,
    Star,
    SetPriority,
    AddTag,
    RemoveTag,
    MarkRead,
    Categorize,
    ExtractEntities,
    Summarize,
    RunPrompt,
    Skip,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Hide => "hide",
            ActionKind::Star => "star",
            ActionKind::SetPriority => "set_priority",
            ActionKind::AddTag => "add_tag",
            ActionKind::RemoveTag => "remove_tag",
            ActionKind::MarkRead => "mark_read",
            ActionKind::Categorize => "categorize",
            ActionKind::ExtractEntities => "extract_entities",
            ActionKind::Summarize => "summarize",
            ActionKind::RunPrompt => "run_prompt",
            ActionKind::Skip => "skip",
        }
    }
}

/// Action as stored: a closed type plus an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Validated action with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Hide,
    Star,
    MarkRead,
    Skip,
    AddTag(String),
    RemoveTag(String),
    Categorize(String),
    SetPriority(String),
    /// Known action this engine does not run; recorded as skipped.
    Unsupported(ActionKind),
}

#[derive(Debug, Clone)]
enum Check {
    Contains(String),
    Equals(String),
    Regex(Regex),
    GreaterThan(Option<f64>),
    LessThan(Option<f64>),
    InList(Vec<String>),
}

#[derive(Debug, Clone)]
struct CompiledCondition {
    field: Field,
    check: Check,
    negated: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: RuleId,
    pub name: String,
    pub priority: i32,
    conditions: Vec<CompiledCondition>,
    actions: Vec<Action>,
}

impl Rule {
    /// Validates regexes, value shapes and action payloads.
    pub fn compile(&self) -> Result<CompiledRule, ValidationError> {
        let conditions = self
            .conditions
            .iter()
            .map(|c| self.compile_condition(c))
            .collect::<Result<Vec<_>, _>>()?;
        let actions = self
            .actions
            .iter()
            .map(|a| self.compile_action(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledRule {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            conditions,
            actions,
        })
    }

    fn compile_condition(&self, c: &Condition) -> Result<CompiledCondition, ValidationError> {
        let value_error = |expected: &'static str| ValidationError::ConditionValue {
            rule: self.name.clone(),
            operator: c.operator.as_str(),
            expected,
        };
        let scalar = || match &c.value {
            ConditionValue::Scalar(s) => Ok(s),
            ConditionValue::List(_) => Err(value_error("a single value")),
        };

        let (check, negated) = match c.operator {
            Operator::Contains | Operator::NotContains => (
                Check::Contains(scalar()?.to_string().to_lowercase()),
                c.operator == Operator::NotContains,
            ),
            Operator::Equals | Operator::NotEquals => (
                Check::Equals(scalar()?.to_string().to_lowercase()),
                c.operator == Operator::NotEquals,
            ),
            Operator::MatchesRegex => {
                let pattern = scalar()?.to_string();
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ValidationError::InvalidRegex {
                        rule: self.name.clone(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                (Check::Regex(re), false)
            }
            Operator::GreaterThan => (Check::GreaterThan(scalar()?.as_number()), false),
            Operator::LessThan => (Check::LessThan(scalar()?.as_number()), false),
            Operator::InList | Operator::NotInList => {
                let ConditionValue::List(items) = &c.value else {
                    return Err(value_error("a list"));
                };
                (
                    Check::InList(items.iter().map(|s| s.to_string().to_lowercase()).collect()),
                    c.operator == Operator::NotInList,
                )
            }
        };
        Ok(CompiledCondition {
            field: c.field,
            check,
            negated,
        })
    }

    fn compile_action(&self, a: &ActionSpec) -> Result<Action, ValidationError> {
        let text = || -> Result<String, ValidationError> {
            let v = match &a.value {
                Some(serde_json::Value::String(s)) => s.trim().to_string(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            if v.is_empty() {
                return Err(ValidationError::EmptyActionValue {
                    rule: self.name.clone(),
                    action: a.kind.as_str(),
                });
            }
            Ok(v)
        };
        Ok(match a.kind {
            ActionKind::Hide => Action::Hide,
            ActionKind::Star => Action::Star,
            ActionKind::MarkRead => Action::MarkRead,
            ActionKind::Skip => Action::Skip,
            ActionKind::AddTag => Action::AddTag(text()?),
            ActionKind::RemoveTag => Action::RemoveTag(text()?),
            ActionKind::Categorize => Action::Categorize(text()?),
            ActionKind::SetPriority => Action::SetPriority(text()?),
            k @ (ActionKind::ExtractEntities | ActionKind::Summarize | ActionKind::RunPrompt) => {
                Action::Unsupported(k)
            }
        })
    }
}

/// Per-rule action log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub actions: ActionReport,
}

/// Result of running all rules on one article. `state` is what the caller commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub article_id: ArticleId,
    pub state: ArticleState,
    pub matches: Vec<RuleMatch>,
    /// A `skip` action ended evaluation early.
    pub stopped: bool,
}

impl RuleOutcome {
    pub fn changed(&self, original: &Article) -> bool {
        self.state != ArticleState::from(original)
    }
}

/// Active rules of one user, compiled and in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compiles the active rules; any invalid rule rejects the whole set.
    pub fn new(rules: &[Rule]) -> Result<Self, ValidationError> {
        let mut compiled = rules
            .iter()
            .filter(|r| r.is_active)
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        compiled.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule against a working copy, so later rules see earlier edits.
    pub fn apply(&self, article: &Article) -> RuleOutcome {
        describe();
        let mut work = article.clone();
        let mut matches = Vec::new();
        let mut stopped = false;

        for rule in &self.rules {
            if !rule.conditions.iter().all(|c| eval_condition(c, &work)) {
                continue;
            }
            counter!(RULES_MATCHED_TOTAL).increment(1);
            debug!(target: TARGET_RULES, rule_id = rule.id, article_id = article.id, "rule matched");

            let mut report = ActionReport::default();
            for action in &rule.actions {
                if execute(action, &mut work, &mut report) {
                    stopped = true;
                }
            }
            matches.push(RuleMatch {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                actions: report,
            });
            if stopped {
                break;
            }
        }

        RuleOutcome {
            article_id: article.id,
            state: ArticleState::from(&work),
            matches,
            stopped,
        }
    }
}

enum FieldValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

fn field_value(article: &Article, field: Field) -> Option<FieldValue> {
    let text = |s: Option<&str>| s.map(|v| FieldValue::Text(v.to_lowercase()));
    match field {
        Field::Title => text(Some(&article.title)),
        Field::Content => text(article.content.as_deref().or(article.description.as_deref())),
        Field::Description => text(article.description.as_deref()),
        Field::Author => text(article.author.as_deref()),
        Field::Link => text(Some(&article.link)),
        Field::Sentiment => article.sentiment().map(FieldValue::Number),
        Field::Topics => article
            .topics
            .as_ref()
            .map(|t| FieldValue::List(t.iter().map(|s| s.to_lowercase()).collect())),
    }
}

fn eval_condition(c: &CompiledCondition, article: &Article) -> bool {
    let Some(value) = field_value(article, c.field) else {
        return false;
    };
    let hit = match value {
        FieldValue::Text(s) => check_scalar(&c.check, &s, s.trim().parse().ok()),
        FieldValue::Number(n) => check_scalar(&c.check, &n.to_string(), Some(n)),
        FieldValue::List(items) => match c.check {
            Check::GreaterThan(_) | Check::LessThan(_) => return false,
            _ => items.iter().any(|s| check_scalar(&c.check, s, None)),
        },
    };
    hit != c.negated
}

fn check_scalar(check: &Check, text: &str, number: Option<f64>) -> bool {
    match check {
        Check::Contains(needle) => text.contains(needle.as_str()),
        Check::Equals(other) => match (number, other.trim().parse::<f64>()) {
            (Some(n), Ok(o)) => n == o,
            _ => text == other,
        },
        Check::Regex(re) => re.is_match(text),
        Check::GreaterThan(limit) => matches!((number, limit), (Some(n), Some(l)) if n > *l),
        Check::LessThan(limit) => matches!((number, limit), (Some(n), Some(l)) if n < *l),
        Check::InList(items) => items.iter().any(|i| i == text),
    }
}

/// Applies one action to the working copy. Returns `true` for `skip`.
fn execute(action: &Action, work: &mut Article, report: &mut ActionReport) -> bool {
    match action {
        Action::Hide => {
            work.is_read = true;
            report.executed.push("Hidden article".into());
        }
        Action::Star => {
            work.is_bookmarked = true;
            report.executed.push("Starred article".into());
        }
        Action::MarkRead => {
            work.is_read = true;
            report.executed.push("Marked as read".into());
        }
        Action::AddTag(tag) => {
            let topics = work.topics.get_or_insert_with(Vec::new);
            if !topics.iter().any(|t| t == tag) {
                topics.push(tag.clone());
            }
            report.executed.push(format!("Added tag: {tag}"));
        }
        Action::RemoveTag(tag) => {
            if let Some(topics) = work.topics.as_mut() {
                topics.retain(|t| t != tag);
            }
            report.executed.push(format!("Removed tag: {tag}"));
        }
        Action::Categorize(category) => {
            let tag = format!("category:{category}");
            let topics = work.topics.get_or_insert_with(Vec::new);
            if !topics.contains(&tag) {
                topics.push(tag);
            }
            report.executed.push(format!("Categorized as: {category}"));
        }
        Action::SetPriority(p) => {
            report.executed.push(format!("Set priority to {p}"));
        }
        Action::Unsupported(kind) => {
            report
                .skipped
                .push(format!("Unsupported action type: {}", kind.as_str()));
        }
        Action::Skip => {
            report.executed.push("Stopped further rules".into());
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::fixtures;
    use serde_json::json;

    fn rule(id: RuleId, priority: i32, conditions: serde_json::Value, actions: serde_json::Value) -> Rule {
        serde_json::from_value(json!({
            "id": id,
            "user_id": 1,
            "name": format!("rule-{id}"),
            "priority": priority,
            "conditions": conditions,
            "actions": actions,
        }))
        .unwrap()
    }

    #[test]
    fn empty_conditions_always_match() {
        let engine = RuleEngine::new(&[rule(1, 0, json!([]), json!([{"type": "star"}]))]).unwrap();
        let out = engine.apply(&fixtures::article(1, "anything"));
        assert!(out.state.is_bookmarked);
        assert_eq!(out.matches.len(), 1);
    }

    #[test]
    fn greater_than_on_text_is_false() {
        let r = rule(
            1,
            0,
            json!([{"field": "title", "operator": "greater_than", "value": 3}]),
            json!([{"type": "star"}]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        let out = engine.apply(&fixtures::article(1, "breaking news"));
        assert!(out.matches.is_empty());
        assert!(!out.state.is_bookmarked);
    }

    #[test]
    fn sentiment_thresholds_are_numeric() {
        let r = rule(
            1,
            0,
            json!([{"field": "sentiment", "operator": "less_than", "value": "-0.5"}]),
            json!([{"type": "hide"}]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        let mut a = fixtures::enriched(1, "grim", vec![1.0], &[]);
        if let Some(e) = a.enrichment.as_mut() {
            e.sentiment = -0.8;
        }
        assert!(engine.apply(&a).state.is_read);
        // not enriched: no sentiment, no match
        assert!(!engine.apply(&fixtures::article(2, "grim")).state.is_read);
    }

    #[test]
    fn add_tag_is_idempotent() {
        let r = rule(
            1,
            0,
            json!([]),
            json!([{"type": "add_tag", "value": "x"}, {"type": "add_tag", "value": "x"}]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        let out = engine.apply(&fixtures::enriched(1, "t", vec![1.0], &["x"]));
        assert_eq!(out.state.topics, Some(vec!["x".to_string()]));
    }

    #[test]
    fn remove_tag_and_categorize() {
        let r = rule(
            1,
            0,
            json!([]),
            json!([
                {"type": "remove_tag", "value": "old"},
                {"type": "categorize", "value": "finance"},
                {"type": "categorize", "value": "finance"}
            ]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        let out = engine.apply(&fixtures::enriched(1, "t", vec![1.0], &["old", "keep"]));
        assert_eq!(
            out.state.topics,
            Some(vec!["keep".to_string(), "category:finance".to_string()])
        );
    }

    #[test]
    fn topics_match_when_any_element_does() {
        let cond = |op: &str, v: serde_json::Value| {
            rule(1, 0, json!([{"field": "topics", "operator": op, "value": v}]), json!([{"type": "star"}]))
        };
        let a = fixtures::enriched(1, "t", vec![1.0], &["AI", "business"]);
        let starred = |r: Rule| RuleEngine::new(&[r]).unwrap().apply(&a).state.is_bookmarked;

        assert!(starred(cond("equals", json!("ai"))));
        assert!(starred(cond("in_list", json!(["sports", "business"]))));
        assert!(!starred(cond("not_in_list", json!(["sports", "business"]))));
        assert!(!starred(cond("not_contains", json!("bus"))));
        assert!(starred(cond("not_equals", json!("sports"))));
    }

    #[test]
    fn missing_field_never_matches_even_negated() {
        let r = rule(
            1,
            0,
            json!([{"field": "author", "operator": "not_contains", "value": "bob"}]),
            json!([{"type": "star"}]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        assert!(engine.apply(&fixtures::article(1, "t")).matches.is_empty());
    }

    #[test]
    fn content_falls_back_to_description() {
        let r = rule(
            1,
            0,
            json!([{"field": "content", "operator": "matches_regex", "value": "rate\\s+hike"}]),
            json!([{"type": "mark_read"}]),
        );
        let engine = RuleEngine::new(&[r]).unwrap();
        let mut a = fixtures::article(1, "t");
        a.description = Some("Surprise RATE   hike announced".into());
        assert!(engine.apply(&a).state.is_read);
    }

    #[test]
    fn priority_order_and_skip() {
        let rules = [
            rule(1, 1, json!([]), json!([{"type": "add_tag", "value": "low"}])),
            rule(2, 10, json!([]), json!([{"type": "add_tag", "value": "high"}, {"type": "skip"}])),
            rule(3, 5, json!([]), json!([{"type": "add_tag", "value": "mid"}])),
        ];
        let engine = RuleEngine::new(&rules).unwrap();
        let out = engine.apply(&fixtures::article(1, "t"));
        assert!(out.stopped);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].rule_id, 2);
        assert_eq!(out.state.topics, Some(vec!["high".to_string()]));
    }

    #[test]
    fn later_rules_see_earlier_edits() {
        let rules = [
            rule(1, 2, json!([]), json!([{"type": "add_tag", "value": "flagged"}])),
            rule(
                2,
                1,
                json!([{"field": "topics", "operator": "contains", "value": "flagged"}]),
                json!([{"type": "hide"}]),
            ),
        ];
        let out = RuleEngine::new(&rules).unwrap().apply(&fixtures::article(1, "t"));
        assert!(out.state.is_read);
        assert_eq!(out.matches.len(), 2);
    }

    #[test]
    fn unsupported_actions_are_skipped_not_errors() {
        let r = rule(
            1,
            0,
            json!([]),
            json!([
                {"type": "summarize"},
                {"type": "set_priority", "value": 3},
                {"type": "run_prompt", "value": "tl;dr"}
            ]),
        );
        let out = RuleEngine::new(&[r]).unwrap().apply(&fixtures::article(1, "t"));
        let report = &out.matches[0].actions;
        assert_eq!(report.executed, vec!["Set priority to 3".to_string()]);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut r = rule(1, 0, json!([]), json!([{"type": "star"}]));
        r.is_active = false;
        let engine = RuleEngine::new(&[r]).unwrap();
        assert!(engine.is_empty());
    }

    #[test]
    fn malformed_regex_is_rejected() {
        let r = rule(
            1,
            0,
            json!([{"field": "title", "operator": "matches_regex", "value": "(unclosed"}]),
            json!([]),
        );
        assert!(matches!(
            RuleEngine::new(&[r]),
            Err(ValidationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn ill_typed_values_are_rejected() {
        let r = rule(
            1,
            0,
            json!([{"field": "title", "operator": "in_list", "value": "a"}]),
            json!([]),
        );
        assert!(matches!(r.compile(), Err(ValidationError::ConditionValue { .. })));

        let r = rule(1, 0, json!([]), json!([{"type": "add_tag"}]));
        assert!(matches!(r.compile(), Err(ValidationError::EmptyActionValue { .. })));
    }

    #[test]
    fn unknown_operator_or_action_fails_to_parse() {
        let bad_op = json!({
            "id": 1, "user_id": 1, "name": "x",
            "conditions": [{"field": "title", "operator": "fuzzy", "value": "a"}]
        });
        assert!(serde_json::from_value::<Rule>(bad_op).is_err());
        let bad_action = json!({
            "id": 1, "user_id": 1, "name": "x",
            "actions": [{"type": "delete"}]
        });
        assert!(serde_json::from_value::<Rule>(bad_action).is_err());
    }
}
