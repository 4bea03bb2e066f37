//! Statement templates.
//!
//! # Responsibility
//! - Describe each statement as a small plan: literal text, the table
//!   expression, field references, amendable field lists and runtime holes.
//! - Render plans for one connection: escaping, amendments, then custom
//!   runtime tokens.
//!
//! # Invariants
//! - Plans are built once per record type and never change afterwards.
//! - Positional parameter placeholders in a plan are dense per statement;
//!   update statements bind SET values first and key values last.
//! - Holes (filter, order-by) are filled after token substitution, so
//!   caller text is never rewritten by amendments or tokens.

use crate::db::Dialect;
use crate::model::amendment::{AmendmentSet, StatementKind};
use crate::model::descriptor::DescriptorTable;
use crate::model::escaping::EscapingResolver;
use crate::model::table::{AffixPosition, SearchType, TargetExpression};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(String),
    /// Table expression; amendable.
    Table,
    /// Field at a descriptor index.
    Field(usize),
    /// Field list expression; amendable.
    FieldList(Vec<Segment>),
    Filter,
    OrderBy,
}

impl Segment {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// One statement of the template family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan {
    kind: StatementKind,
    segments: Vec<Segment>,
}

impl StatementPlan {
    fn new(kind: StatementKind, segments: Vec<Segment>) -> Self {
        Self { kind, segments }
    }

    /// Same statement cut after `WHERE`, followed by a caller filter.
    fn with_filter_after_where(&self) -> Self {
        let mut segments = Vec::new();
        for segment in &self.segments {
            if let Segment::Text(text) = segment {
                if let Some(position) = text.find(" WHERE ") {
                    segments.push(Segment::text(&text[..position + " WHERE ".len()]));
                    break;
                }
            }
            segments.push(segment.clone());
        }
        segments.push(Segment::Filter);
        Self::new(self.kind, segments)
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Renders the plan with canonical identifiers and no amendments.
    pub fn canonical_text(&self, table: &DescriptorTable) -> String {
        let mut out = String::new();
        canonical_segments(&self.segments, table, &mut out);
        out
    }
}

fn canonical_segments(segments: &[Segment], table: &DescriptorTable, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Table => out.push_str(&table.canonical_table_name()),
            Segment::Field(index) => {
                if let Some(field) = table.field(*index) {
                    out.push_str(&field.canonical_name());
                }
            }
            Segment::FieldList(inner) => canonical_segments(inner, table, out),
            Segment::Filter => out.push_str(FILTER_HOLE),
            Segment::OrderBy => out.push_str(ORDER_BY_HOLE),
        }
    }
}

const FILTER_HOLE: &str = "{filter}";
const ORDER_BY_HOLE: &str = "{order_by}";

/// Canonical plans of every statement a record type supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlans {
    pub count: StatementPlan,
    pub count_where: StatementPlan,
    pub select_set: StatementPlan,
    pub select_set_where: StatementPlan,
    pub select_keys: StatementPlan,
    pub select_keys_where: StatementPlan,
    pub select_row: StatementPlan,
    pub insert: StatementPlan,
    pub update: StatementPlan,
    pub update_where: StatementPlan,
    pub delete: StatementPlan,
    pub delete_where: StatementPlan,
    search_filter: Vec<Segment>,
    primary_key_list: Vec<Segment>,
}

impl StatementPlans {
    pub fn compile(table: &DescriptorTable) -> Self {
        let keys = table.primary_key_indices();
        let key_list = if table.has_any_primary_key() {
            field_list(keys)
        } else {
            vec![Segment::text("*")]
        };

        let count = StatementPlan::new(
            StatementKind::Count,
            vec![Segment::text("SELECT COUNT(*) FROM "), Segment::Table],
        );
        let count_where = {
            let mut segments = count.segments.clone();
            segments.extend([Segment::text(" WHERE "), Segment::Filter]);
            StatementPlan::new(StatementKind::Count, segments)
        };

        let select = |list: Vec<Segment>, filtered: bool| {
            let mut segments = vec![
                Segment::text("SELECT "),
                Segment::FieldList(list),
                Segment::text(" FROM "),
                Segment::Table,
            ];
            if filtered {
                segments.extend([Segment::text(" WHERE "), Segment::Filter]);
            }
            segments.extend([Segment::text(" ORDER BY "), Segment::OrderBy]);
            StatementPlan::new(StatementKind::SelectSet, segments)
        };

        let mut select_row = vec![
            Segment::text("SELECT * FROM "),
            Segment::Table,
            Segment::text(" WHERE "),
        ];
        select_row.extend(assignments(keys, 0, " AND "));

        let insert_fields = table.insert_indices();
        let placeholders = (0..insert_fields.len())
            .map(|index| format!("{{{index}}}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = vec![
            Segment::text("INSERT INTO "),
            Segment::Table,
            Segment::text("("),
            Segment::FieldList(field_list(insert_fields)),
            Segment::text(format!(") VALUES ({placeholders})")),
        ];

        let update_fields = table.update_indices();
        let mut update = vec![
            Segment::text("UPDATE "),
            Segment::Table,
            Segment::text(" SET "),
            Segment::FieldList(assignments(update_fields, 0, ", ")),
            Segment::text(" WHERE "),
        ];
        update.extend(assignments(keys, update_fields.len(), " AND "));

        let mut delete = vec![
            Segment::text("DELETE FROM "),
            Segment::Table,
            Segment::text(" WHERE "),
        ];
        delete.extend(assignments(keys, 0, " AND "));

        let update = StatementPlan::new(StatementKind::Update, update);
        let delete = StatementPlan::new(StatementKind::Delete, delete);

        Self {
            count,
            count_where,
            select_set: select(vec![Segment::text("*")], false),
            select_set_where: select(vec![Segment::text("*")], true),
            select_keys: select(key_list.clone(), false),
            select_keys_where: select(key_list, true),
            select_row: StatementPlan::new(StatementKind::SelectRow, select_row),
            insert: StatementPlan::new(StatementKind::Insert, insert),
            update_where: update.with_filter_after_where(),
            update,
            delete_where: delete.with_filter_after_where(),
            delete,
            search_filter: search_filter(table),
            primary_key_list: field_list(keys),
        }
    }

    fn all(&self) -> [(&'static str, &StatementPlan); 12] {
        [
            ("count", &self.count),
            ("count_where", &self.count_where),
            ("select_set", &self.select_set),
            ("select_set_where", &self.select_set_where),
            ("select_keys", &self.select_keys),
            ("select_keys_where", &self.select_keys_where),
            ("select_row", &self.select_row),
            ("insert", &self.insert),
            ("update", &self.update),
            ("update_where", &self.update_where),
            ("delete", &self.delete),
            ("delete_where", &self.delete_where),
        ]
    }

    /// Search filter with `{0}` (wildcard form) and `{1}` (exact form).
    pub fn canonical_search_filter(&self, table: &DescriptorTable) -> String {
        let mut out = String::new();
        canonical_segments(&self.search_filter, table, &mut out);
        out
    }
}

fn field_list(indices: &[usize]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(indices.len() * 2);
    for (position, index) in indices.iter().enumerate() {
        if position > 0 {
            segments.push(Segment::text(", "));
        }
        segments.push(Segment::Field(*index));
    }
    segments
}

/// `a={offset}<sep>b={offset + 1}...`
fn assignments(indices: &[usize], offset: usize, separator: &str) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(indices.len() * 2);
    for (position, index) in indices.iter().enumerate() {
        if position > 0 {
            segments.push(Segment::text(separator));
        }
        segments.push(Segment::Field(*index));
        segments.push(Segment::text(format!("={{{}}}", offset + position)));
    }
    segments
}

fn search_filter(table: &DescriptorTable) -> Vec<Segment> {
    let mut segments = Vec::new();
    for index in table.searchable_indices() {
        let Some(search) = table
            .field(*index)
            .and_then(|field| field.effective_search_type())
        else {
            continue;
        };
        if !segments.is_empty() {
            segments.push(Segment::text(" OR "));
        }
        segments.push(Segment::Field(*index));
        segments.push(Segment::text(match search {
            SearchType::LikeExpression => " LIKE {0}",
            _ => "={1}",
        }));
    }
    segments
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Filter,
    OrderBy,
}

/// A statement rendered for one connection, with runtime holes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedTemplate {
    pieces: Vec<Piece>,
}

impl ResolvedTemplate {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Piece::Text(last)) = self.pieces.last_mut() {
            last.push_str(text);
        } else {
            self.pieces.push(Piece::Text(text.to_string()));
        }
    }

    fn apply_tokens(&mut self, tokens: &[(String, String)]) {
        for piece in &mut self.pieces {
            if let Piece::Text(text) = piece {
                for (token, replacement) in tokens {
                    if !token.is_empty() && text.contains(token.as_str()) {
                        *text = text.replace(token.as_str(), replacement);
                    }
                }
            }
        }
    }

    /// Fills the filter and order-by holes.
    pub fn fill(&self, filter: &str, order_by: &str) -> String {
        let mut sql = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => sql.push_str(text),
                Piece::Filter => sql.push_str(filter),
                Piece::OrderBy => sql.push_str(order_by),
            }
        }
        sql
    }

    /// Statement text for templates without holes.
    pub fn sql(&self) -> String {
        self.fill("", "")
    }
}

impl Display for ResolvedTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fill(FILTER_HOLE, ORDER_BY_HOLE))
    }
}

struct RenderContext<'a> {
    dialect: Dialect,
    kind: StatementKind,
    resolver: &'a EscapingResolver,
    amendments: &'a AmendmentSet,
}

impl RenderContext<'_> {
    fn render(&self, segments: &[Segment], out: &mut ResolvedTemplate) {
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_text(text),
                Segment::Table => {
                    self.affix(TargetExpression::TableName, AffixPosition::Prefix, out);
                    out.push_text(self.resolver.table_name());
                    self.affix(TargetExpression::TableName, AffixPosition::Suffix, out);
                }
                Segment::Field(index) => out.push_text(self.resolver.field_name(*index)),
                Segment::FieldList(inner) => {
                    self.affix(TargetExpression::FieldList, AffixPosition::Prefix, out);
                    self.render(inner, out);
                    self.affix(TargetExpression::FieldList, AffixPosition::Suffix, out);
                }
                Segment::Filter => out.pieces.push(Piece::Filter),
                Segment::OrderBy => out.pieces.push(Piece::OrderBy),
            }
        }
    }

    fn affix(&self, target: TargetExpression, position: AffixPosition, out: &mut ResolvedTemplate) {
        if let Some(text) = self.amendments.affix(self.dialect, self.kind, target, position) {
            out.push_text(text);
        }
    }
}

/// Every statement of a record type rendered for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    pub count: ResolvedTemplate,
    pub count_where: ResolvedTemplate,
    pub select_set: ResolvedTemplate,
    pub select_set_where: ResolvedTemplate,
    pub select_keys: ResolvedTemplate,
    pub select_keys_where: ResolvedTemplate,
    pub select_row: ResolvedTemplate,
    pub insert: ResolvedTemplate,
    pub update: ResolvedTemplate,
    pub update_where: ResolvedTemplate,
    pub delete: ResolvedTemplate,
    pub delete_where: ResolvedTemplate,
    search_filter: Option<String>,
    primary_key_list: String,
}

impl TemplateSet {
    pub fn resolve(
        plans: &StatementPlans,
        dialect: Dialect,
        resolver: &EscapingResolver,
        amendments: &AmendmentSet,
        custom_tokens: &[(String, String)],
    ) -> Self {
        let render = |plan: &StatementPlan| {
            let mut template = ResolvedTemplate::default();
            RenderContext {
                dialect,
                kind: plan.kind,
                resolver,
                amendments,
            }
            .render(&plan.segments, &mut template);
            template.apply_tokens(custom_tokens);
            template
        };

        let plain = |segments: &[Segment]| {
            let mut template = ResolvedTemplate::default();
            RenderContext {
                dialect,
                kind: StatementKind::SelectSet,
                resolver,
                amendments: &AmendmentSet::default(),
            }
            .render(segments, &mut template);
            template.sql()
        };

        let search_filter = Some(plain(&plans.search_filter)).filter(|filter| !filter.is_empty());

        Self {
            count: render(&plans.count),
            count_where: render(&plans.count_where),
            select_set: render(&plans.select_set),
            select_set_where: render(&plans.select_set_where),
            select_keys: render(&plans.select_keys),
            select_keys_where: render(&plans.select_keys_where),
            select_row: render(&plans.select_row),
            insert: render(&plans.insert),
            update: render(&plans.update),
            update_where: render(&plans.update_where),
            delete: render(&plans.delete),
            delete_where: render(&plans.delete_where),
            search_filter,
            primary_key_list: plain(&plans.primary_key_list),
        }
    }

    /// Search filter OR'd over searchable fields, if any.
    pub fn search_filter(&self) -> Option<&str> {
        self.search_filter.as_deref()
    }

    /// Key field list used as the default ordering.
    pub fn primary_key_list(&self) -> &str {
        &self.primary_key_list
    }

    /// Named statements for display.
    pub fn statements(&self) -> Vec<(&'static str, &ResolvedTemplate)> {
        vec![
            ("count", &self.count),
            ("count_where", &self.count_where),
            ("select_set", &self.select_set),
            ("select_set_where", &self.select_set_where),
            ("select_keys", &self.select_keys),
            ("select_keys_where", &self.select_keys_where),
            ("select_row", &self.select_row),
            ("insert", &self.insert),
            ("update", &self.update),
            ("update_where", &self.update_where),
            ("delete", &self.delete),
            ("delete_where", &self.delete_where),
        ]
    }
}

/// Canonical statement texts of a record type, for diagnostics.
pub fn canonical_statements(
    plans: &StatementPlans,
    table: &DescriptorTable,
) -> Vec<(&'static str, String)> {
    plans
        .all()
        .into_iter()
        .map(|(name, plan)| (name, plan.canonical_text(table)))
        .collect()
}
