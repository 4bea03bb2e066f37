//! Dialect and statement scoped text amendments.
//!
//! # Responsibility
//! - Normalize declared amendments (trim, pad by affix position).
//! - Pick the amendment that fills a given slot of a given statement.
//!
//! # Invariants
//! - Dialect-specific amendments are consulted before untargeted ones, so
//!   they override them for the same slot.
//! - At most one amendment fills a slot; an unfilled slot renders nothing.

use crate::db::Dialect;
use crate::model::table::{AffixPosition, AmendExpression, StatementTypes, TargetExpression};

/// Statement family a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Count,
    /// Multi-row and key-only selects.
    SelectSet,
    SelectRow,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn flag(self) -> StatementTypes {
        match self {
            Self::Count => StatementTypes::SELECT_COUNT,
            Self::SelectSet => StatementTypes::SELECT_SET,
            Self::SelectRow => StatementTypes::SELECT_ROW,
            Self::Insert => StatementTypes::INSERT,
            Self::Update => StatementTypes::UPDATE,
            Self::Delete => StatementTypes::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Amendment {
    dialect: Option<Dialect>,
    target: TargetExpression,
    statements: StatementTypes,
    position: AffixPosition,
    text: String,
}

impl Amendment {
    fn applies(
        &self,
        dialect: Dialect,
        kind: StatementKind,
        target: TargetExpression,
        position: AffixPosition,
    ) -> bool {
        self.dialect.map_or(true, |scoped| scoped == dialect)
            && self.statements.contains(kind.flag())
            && self.target == target
            && self.position == position
    }
}

/// Ordered amendments of one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmendmentSet {
    amendments: Vec<Amendment>,
}

impl AmendmentSet {
    pub fn derive(declared: &[AmendExpression]) -> Self {
        let normalize = |amendment: &AmendExpression| {
            let text = amendment.text.trim();
            Amendment {
                dialect: amendment.dialect,
                target: amendment.target,
                statements: amendment.statements,
                position: amendment.position,
                text: match amendment.position {
                    AffixPosition::Prefix => format!("{text} "),
                    AffixPosition::Suffix => format!(" {text}"),
                },
            }
        };

        let specific = declared
            .iter()
            .filter(|amendment| amendment.dialect.is_some())
            .map(normalize);
        let generic = declared
            .iter()
            .filter(|amendment| amendment.dialect.is_none())
            .map(normalize);

        Self {
            amendments: specific.chain(generic).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amendments.is_empty()
    }

    /// Text for one slot, already padded; `None` leaves the slot empty.
    pub fn affix(
        &self,
        dialect: Dialect,
        kind: StatementKind,
        target: TargetExpression,
        position: AffixPosition,
    ) -> Option<&str> {
        self.amendments
            .iter()
            .find(|amendment| amendment.applies(dialect, kind, target, position))
            .map(|amendment| amendment.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{AmendmentSet, StatementKind};
    use crate::db::Dialect;
    use crate::model::table::{AffixPosition, AmendExpression, StatementTypes, TargetExpression};

    #[test]
    fn text_is_trimmed_and_padded_by_position() {
        let set = AmendmentSet::derive(&[
            AmendExpression::new("  TOP 1 ").target(TargetExpression::FieldList),
            AmendExpression::new("LIMIT 1 ").position(AffixPosition::Suffix),
        ]);

        assert_eq!(
            set.affix(
                Dialect::SqlServer,
                StatementKind::SelectSet,
                TargetExpression::FieldList,
                AffixPosition::Prefix
            ),
            Some("TOP 1 ")
        );
        assert_eq!(
            set.affix(
                Dialect::Sqlite,
                StatementKind::Delete,
                TargetExpression::TableName,
                AffixPosition::Suffix
            ),
            Some(" LIMIT 1")
        );
    }

    #[test]
    fn dialect_specific_amendment_wins_regardless_of_declaration_order() {
        let set = AmendmentSet::derive(&[
            AmendExpression::new("generic"),
            AmendExpression::new("mysql only").for_dialect(Dialect::MySql),
        ]);

        let pick = |dialect| {
            set.affix(
                dialect,
                StatementKind::Insert,
                TargetExpression::TableName,
                AffixPosition::Prefix,
            )
        };
        assert_eq!(pick(Dialect::MySql), Some("mysql only "));
        assert_eq!(pick(Dialect::Oracle), Some("generic "));
    }

    #[test]
    fn statement_scope_is_respected() {
        let set = AmendmentSet::derive(&[
            AmendExpression::new("ONLY")
                .statements(StatementTypes::SELECT_SET | StatementTypes::SELECT_ROW),
        ]);
        let slot = |kind| {
            set.affix(Dialect::PostgreSql, kind, TargetExpression::TableName, AffixPosition::Prefix)
        };

        assert_eq!(slot(StatementKind::SelectRow), Some("ONLY "));
        assert_eq!(slot(StatementKind::Update), None);
        assert_eq!(slot(StatementKind::Count), None);
    }
}
