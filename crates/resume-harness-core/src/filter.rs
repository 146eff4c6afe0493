//! Tagged filter expressions for index-side retrieval constraints.
//!
//! [`SearchFilters`] from callers are translated into a small expression
//! tree with enumerated predicate kinds. Index backends map the tree onto
//! their native filter grammar with a pure function; the in-memory backend
//! evaluates it directly against vector payloads via [`FilterExpr::matches`].
//!
//! Construction normalizes case: skill, location, and education values are
//! lowercased once here so every backend sees identical constraints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::SearchFilters;

/// A filter predicate over vector payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpr {
    /// Field equals the value (string comparison ignores case).
    Equals { field: String, value: Value },
    /// Field (scalar or array) holds at least one of the values.
    MemberOf { field: String, values: Vec<Value> },
    /// Field is a number within the inclusive `[min, max]` range; a
    /// missing bound is unbounded on that side.
    RangeBounded {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Every clause holds.
    All { clauses: Vec<FilterExpr> },
}

impl FilterExpr {
    /// Translate caller filters into an expression tree.
    ///
    /// Skills become an all-of conjunction of single-value membership
    /// clauses: a document must carry every requested skill. Experience
    /// bounds collapse into one inclusive range. Returns `None` when no
    /// constraint is present.
    pub fn from_filters(filters: &SearchFilters) -> Option<FilterExpr> {
        let mut clauses: Vec<FilterExpr> = Vec::new();

        for skill in &filters.skills {
            clauses.push(FilterExpr::MemberOf {
                field: "skills".to_string(),
                values: vec![Value::String(skill.to_lowercase())],
            });
        }

        if filters.experience_min.is_some() || filters.experience_max.is_some() {
            clauses.push(FilterExpr::RangeBounded {
                field: "experience".to_string(),
                min: filters.experience_min.map(f64::from),
                max: filters.experience_max.map(f64::from),
            });
        }

        if let Some(location) = &filters.location {
            clauses.push(FilterExpr::Equals {
                field: "location".to_string(),
                value: Value::String(location.to_lowercase()),
            });
        }

        if !filters.education.is_empty() {
            clauses.push(FilterExpr::MemberOf {
                field: "education".to_string(),
                values: filters
                    .education
                    .iter()
                    .map(|e| Value::String(e.to_lowercase()))
                    .collect(),
            });
        }

        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(FilterExpr::All { clauses }),
        }
    }

    /// Evaluate the expression against a payload object.
    ///
    /// Used by the in-memory index; networked backends translate the tree
    /// to their own grammar instead of calling this.
    pub fn matches(&self, payload: &Value) -> bool {
        match self {
            FilterExpr::Equals { field, value } => payload
                .get(field)
                .map(|v| value_eq(v, value))
                .unwrap_or(false),
            FilterExpr::MemberOf { field, values } => match payload.get(field) {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| values.iter().any(|v| value_eq(item, v))),
                Some(scalar) => values.iter().any(|v| value_eq(scalar, v)),
                None => false,
            },
            FilterExpr::RangeBounded { field, min, max } => {
                let n = match payload.get(field).and_then(Value::as_f64) {
                    Some(n) => n,
                    None => return false,
                };
                min.map(|lo| n >= lo).unwrap_or(true) && max.map(|hi| n <= hi).unwrap_or(true)
            }
            FilterExpr::All { clauses } => clauses.iter().all(|c| c.matches(payload)),
        }
    }
}

/// Value equality with case-insensitive string comparison.
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filters_no_expr() {
        assert_eq!(FilterExpr::from_filters(&SearchFilters::default()), None);
    }

    #[test]
    fn test_single_clause_not_wrapped() {
        let filters = SearchFilters {
            location: Some("Berlin".into()),
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();
        assert_eq!(
            expr,
            FilterExpr::Equals {
                field: "location".into(),
                value: json!("berlin"),
            }
        );
    }

    #[test]
    fn test_skills_become_all_of_membership() {
        let filters = SearchFilters {
            skills: vec!["React".into(), "SQL".into()],
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();

        let both = json!({ "skills": ["react", "sql", "aws"] });
        let one = json!({ "skills": ["react"] });
        assert!(expr.matches(&both));
        assert!(!expr.matches(&one), "all requested skills must be present");
    }

    #[test]
    fn test_experience_range_inclusive() {
        let filters = SearchFilters {
            experience_min: Some(2),
            experience_max: Some(5),
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();

        assert!(expr.matches(&json!({ "experience": 2 })));
        assert!(expr.matches(&json!({ "experience": 5 })));
        assert!(!expr.matches(&json!({ "experience": 6 })));
        assert!(!expr.matches(&json!({ "experience": 1 })));
        assert!(!expr.matches(&json!({})), "missing field never matches");
    }

    #[test]
    fn test_half_open_range() {
        let filters = SearchFilters {
            experience_min: Some(3),
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();
        assert!(expr.matches(&json!({ "experience": 30 })));
        assert!(!expr.matches(&json!({ "experience": 2 })));
    }

    #[test]
    fn test_education_membership() {
        let filters = SearchFilters {
            education: vec!["Bachelor".into(), "Master".into()],
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();
        assert!(expr.matches(&json!({ "education": ["bachelor"] })));
        assert!(!expr.matches(&json!({ "education": ["phd"] })));
    }

    #[test]
    fn test_combined_filters_conjoin() {
        let filters = SearchFilters {
            skills: vec!["rust".into()],
            experience_min: Some(2),
            location: Some("berlin".into()),
            ..Default::default()
        };
        let expr = FilterExpr::from_filters(&filters).unwrap();
        match &expr {
            FilterExpr::All { clauses } => assert_eq!(clauses.len(), 3),
            other => panic!("expected All, got {other:?}"),
        }

        let hit = json!({ "skills": ["rust"], "experience": 4, "location": "Berlin" });
        let miss = json!({ "skills": ["rust"], "experience": 1, "location": "berlin" });
        assert!(expr.matches(&hit));
        assert!(!expr.matches(&miss));
    }

    #[test]
    fn test_serde_tagged_form() {
        let expr = FilterExpr::Equals {
            field: "location".into(),
            value: json!("berlin"),
        };
        let s = serde_json::to_string(&expr).unwrap();
        assert!(s.contains("\"kind\":\"equals\""));
        let back: FilterExpr = serde_json::from_str(&s).unwrap();
        assert_eq!(back, expr);
    }
}
