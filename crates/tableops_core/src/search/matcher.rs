//! In-memory search matching.

use crate::model::compiled::CompiledModel;
use crate::model::table::SearchType;
use crate::model::value::ValueKind;

/// Returns whether any searchable field of `record` matches any term.
///
/// Text fields compare case-insensitively, by substring or whole value
/// depending on their search type. Other fields must equal the term
/// exactly.
pub fn is_search_match<T>(model: &CompiledModel<T>, record: &T, terms: &[&str]) -> bool {
    let descriptors = model.descriptors();
    descriptors.searchable_indices().iter().any(|index| {
        let Some(field) = descriptors.field(*index) else {
            return false;
        };
        let Some(value) = model.get_value(record, *index) else {
            return false;
        };
        let text = value.to_search_text();

        if field.kind != ValueKind::Text {
            return terms.iter().any(|term| text == *term);
        }

        let text = text.to_lowercase();
        match field.effective_search_type() {
            Some(SearchType::FullValueMatch) => {
                terms.iter().any(|term| text == term.to_lowercase())
            }
            _ => terms.iter().any(|term| text.contains(&term.to_lowercase())),
        }
    })
}
