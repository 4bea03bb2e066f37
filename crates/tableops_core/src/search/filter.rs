//! Search restriction generator.
//!
//! # Responsibility
//! - Turn free text into a restriction over the searchable fields.
//!
//! # Invariants
//! - Every term binds two values: `%term%` for substring clauses and the
//!   bare term for exact clauses.
//! - Terms are ANDed; each term may match a different field.

use crate::model::restriction::{renumber_placeholders, RecordRestriction};
use crate::model::value::Value;

/// Splits search text into terms, collapsing repeated whitespace.
pub fn search_terms(search_text: &str) -> Vec<&str> {
    search_text.split_whitespace().collect()
}

/// Builds the restriction for `search_text`.
///
/// `search_filter` is the OR'd clause over searchable fields, using `{0}`
/// for the wildcard form and `{1}` for the exact form. Returns `None` when
/// there is no searchable field or the text is blank.
pub fn search_restriction(
    search_filter: Option<&str>,
    search_text: &str,
) -> Option<RecordRestriction> {
    let search_filter = search_filter.filter(|filter| !filter.trim().is_empty())?;
    let terms = search_terms(search_text);

    match terms.as_slice() {
        [] => None,
        [term] => Some(RecordRestriction::from_parts(
            search_filter.to_string(),
            term_parameters(term).to_vec(),
        )),
        terms => {
            let groups = (0..terms.len())
                .map(|position| format!("({})", renumber_placeholders(search_filter, position * 2)))
                .collect::<Vec<_>>();
            let parameters = terms.iter().flat_map(|term| term_parameters(term)).collect();
            Some(RecordRestriction::from_parts(groups.join(" AND "), parameters))
        }
    }
}

fn term_parameters(term: &str) -> [Value; 2] {
    [Value::Text(format!("%{term}%")), Value::Text(term.to_string())]
}

#[cfg(test)]
mod tests {
    use super::search_restriction;
    use crate::model::value::Value;

    const FILTER: &str = "Name LIKE {0} OR Code={1}";

    #[test]
    fn single_term_binds_wildcard_and_exact_forms() {
        let restriction = search_restriction(Some(FILTER), "  foo ").unwrap();
        assert_eq!(restriction.filter_expression(), FILTER);
        assert_eq!(
            restriction.parameters(),
            &[Value::Text("%foo%".into()), Value::Text("foo".into())]
        );
    }

    #[test]
    fn multiple_terms_become_and_groups_with_offsets() {
        let restriction = search_restriction(Some(FILTER), "foo   bar").unwrap();
        assert_eq!(
            restriction.filter_expression(),
            "(Name LIKE {0} OR Code={1}) AND (Name LIKE {2} OR Code={3})"
        );
        assert_eq!(restriction.parameters().len(), 4);
        assert_eq!(restriction.parameters()[2], Value::Text("%bar%".into()));
    }

    #[test]
    fn blank_text_or_missing_filter_yields_nothing() {
        assert!(search_restriction(Some(FILTER), "   ").is_none());
        assert!(search_restriction(None, "foo").is_none());
    }
}
