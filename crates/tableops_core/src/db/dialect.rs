//! SQL dialects and identifier quoting rules.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Target database syntax variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dialect {
    SqlServer,
    MySql,
    Oracle,
    Sqlite,
    PostgreSql,
    Access,
    Other,
}

impl Dialect {
    pub const ALL: [Dialect; 7] = [
        Dialect::SqlServer,
        Dialect::MySql,
        Dialect::Oracle,
        Dialect::Sqlite,
        Dialect::PostgreSql,
        Dialect::Access,
        Dialect::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::MySql => "mysql",
            Self::Oracle => "oracle",
            Self::Sqlite => "sqlite",
            Self::PostgreSql => "postgresql",
            Self::Access => "access",
            Self::Other => "other",
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "mysql" => Ok(Self::MySql),
            "oracle" => Ok(Self::Oracle),
            "sqlite" => Ok(Self::Sqlite),
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "access" => Ok(Self::Access),
            "other" => Ok(Self::Other),
            other => Err(format!(
                "unsupported dialect `{other}`; expected sqlserver|mysql|oracle|sqlite|postgresql|access|other"
            )),
        }
    }
}

/// Quotes `identifier` for `dialect`.
///
/// ANSI double quotes are used when requested; otherwise SQL Server and
/// Access use brackets, MySQL uses back-ticks and everything else falls back
/// to ANSI quotes.
pub fn escape_identifier(identifier: &str, dialect: Dialect, use_ansi_quotes: bool) -> String {
    let identifier = identifier.trim();

    if use_ansi_quotes {
        return format!("\"{identifier}\"");
    }

    match dialect {
        Dialect::SqlServer | Dialect::Access => format!("[{identifier}]"),
        Dialect::MySql => format!("`{identifier}`"),
        _ => format!("\"{identifier}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_identifier, Dialect};

    #[test]
    fn native_quotes_follow_dialect() {
        assert_eq!(escape_identifier("Order", Dialect::SqlServer, false), "[Order]");
        assert_eq!(escape_identifier("Order", Dialect::Access, false), "[Order]");
        assert_eq!(escape_identifier("Order", Dialect::MySql, false), "`Order`");
        assert_eq!(escape_identifier("Order", Dialect::Oracle, false), "\"Order\"");
    }

    #[test]
    fn ansi_quotes_win_over_dialect() {
        assert_eq!(escape_identifier(" Order ", Dialect::MySql, true), "\"Order\"");
    }

    #[test]
    fn dialect_names_parse_case_insensitively() {
        assert_eq!("Postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert!("db2".parse::<Dialect>().is_err());
    }
}
