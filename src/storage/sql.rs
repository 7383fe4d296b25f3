//! SQL statement builders for record tables

use crate::schema::ID_COLUMN_NAME;

/// Drop a record table
pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

/// Remove every row while keeping the table
pub fn truncate(table: &str) -> String {
    format!("DELETE FROM {}", table)
}

pub fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

pub fn select_by_id(table: &str) -> String {
    format!("SELECT * FROM {} WHERE {} = ?1", table, ID_COLUMN_NAME)
}

pub fn delete_by_id(table: &str) -> String {
    format!("DELETE FROM {} WHERE {} = ?1", table, ID_COLUMN_NAME)
}

pub fn delete_where(table: &str, predicate: &str) -> String {
    format!("DELETE FROM {} WHERE {}", table, predicate)
}

/// Insert with positional placeholders for `columns`
pub fn insert(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Update keyed on `id`; the id is bound after the column values
pub fn update_by_id(table: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = if columns.is_empty() {
        vec![format!("{0} = {0}", ID_COLUMN_NAME)]
    } else {
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect()
    };
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        table,
        assignments.join(", "),
        ID_COLUMN_NAME,
        columns.len() + 1
    )
}

/// A `LIMIT`/`OFFSET` window over a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Translate 1-based paging into a window. Paging is off when either
/// `page` or `page_size` is not positive.
pub fn page_window(page: i64, page_size: i64) -> Option<PageWindow> {
    if page <= 0 || page_size <= 0 {
        return None;
    }
    Some(PageWindow {
        limit: page_size,
        offset: (page - 1).saturating_mul(page_size),
    })
}

/// `SELECT *` with optional predicate, ordering and paging
pub fn select(table: &str, predicate: Option<&str>, order: Option<&str>, window: Option<PageWindow>) -> String {
    let mut sql = format!("SELECT * FROM {}", table);
    if let Some(predicate) = predicate {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }
    if let Some(order) = order {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    if let Some(window) = window {
        if window.offset > 0 {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", window.limit, window.offset));
        } else {
            sql.push_str(&format!(" LIMIT {}", window.limit));
        }
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 2), Some(PageWindow { limit: 2, offset: 0 }));
        assert_eq!(page_window(2, 2), Some(PageWindow { limit: 2, offset: 2 }));
        assert_eq!(page_window(5, 2), Some(PageWindow { limit: 2, offset: 8 }));
        assert_eq!(page_window(0, 2), None);
        assert_eq!(page_window(3, 0), None);
        assert_eq!(page_window(-1, 10), None);
    }

    #[test]
    fn test_select_clauses() {
        assert_eq!(select("t", None, None, None), "SELECT * FROM t");
        assert_eq!(
            select("t", Some("a = ?1"), Some("b DESC"), page_window(1, 5)),
            "SELECT * FROM t WHERE a = ?1 ORDER BY b DESC LIMIT 5"
        );
        assert_eq!(
            select("t", None, Some("b ASC"), page_window(3, 5)),
            "SELECT * FROM t ORDER BY b ASC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_insert_and_update_placeholders() {
        assert_eq!(insert("t", &["a", "b"]), "INSERT INTO t (a, b) VALUES (?1, ?2)");
        assert_eq!(insert("t", &[]), "INSERT INTO t DEFAULT VALUES");
        assert_eq!(update_by_id("t", &["a", "b"]), "UPDATE t SET a = ?1, b = ?2 WHERE id = ?3");
        assert_eq!(update_by_id("t", &[]), "UPDATE t SET id = id WHERE id = ?1");
    }

    #[test]
    fn test_table_statements() {
        assert_eq!(drop_table("t"), "DROP TABLE IF EXISTS t");
        assert_eq!(truncate("t"), "DELETE FROM t");
        assert_eq!(count("t"), "SELECT COUNT(*) FROM t");
    }
}
