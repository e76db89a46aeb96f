use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};
use warp::http::{header, Response};

use crate::{
    actions::cart,
    constants::{SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_EMPTY, SHOPPING_LIST_HEADER},
    error::Error,
    jwt::SessionData,
    schema::{AmountRow, ShoppingListRow},
};

/// A rendered shopping list, ready to be served as a download.
#[derive(Debug, Clone)]
pub struct ShoppingListDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Groups raw cart rows by (ingredient name, measurement unit) and sums the
/// amounts. Two ingredients sharing a name but measured in different units
/// stay separate. Rows come back sorted ascending by case-folded ingredient
/// name, so the output is a pure function of the input multiset.
pub fn aggregate_shopping_list(rows: Vec<AmountRow>) -> Vec<ShoppingListRow> {
    let mut totals: BTreeMap<(String, String, String), i64> = BTreeMap::new();

    for row in rows {
        let key = (row.name.to_lowercase(), row.name, row.measurement_unit);
        *totals.entry(key).or_insert(0) += i64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((_, name, measurement_unit), total_amount)| ShoppingListRow {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Renders the aggregated rows as a UTF-8 plain-text document, one
/// ingredient per line. An empty cart renders a single placeholder line
/// instead of a body; no error is produced.
pub fn render_shopping_list(username: &str, rows: &[ShoppingListRow]) -> ShoppingListDocument {
    let mut content = String::from(SHOPPING_LIST_HEADER);
    content.push('\n');

    if rows.is_empty() {
        content.push_str(SHOPPING_LIST_EMPTY);
        content.push('\n');
    } else {
        for row in rows {
            content.push_str(&format!(
                "- {} - {} {}\n",
                row.name, row.total_amount, row.measurement_unit
            ));
        }
    }

    ShoppingListDocument {
        filename: format!("{username}_shopping_list.txt"),
        content_type: SHOPPING_LIST_CONTENT_TYPE,
        bytes: content.into_bytes(),
    }
}

/// Builds the shopping-list download for the authenticated user: reads the
/// cart's amount rows, consolidates them and renders the document.
pub async fn export_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<ShoppingListDocument, Error> {
    let rows = cart::list_cart_amount_rows(session.user_id, pool).await?;
    let rows = aggregate_shopping_list(rows);

    log::debug!(
        "Exporting shopping list for user {} ({} rows)",
        session.user_id,
        rows.len()
    );

    Ok(render_shopping_list(&session.username, &rows))
}

/// Wraps the document in a response with a `Content-Disposition: attachment`
/// header, the shape the consuming server returns from its download route.
pub fn as_attachment(document: ShoppingListDocument) -> Result<Response<Vec<u8>>, Error> {
    Response::builder()
        .header(header::CONTENT_TYPE, document.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", document.filename),
        )
        .body(document.bytes)
        .map_err(|_| Error::internal("Failed to build attachment response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> AmountRow {
        AmountRow {
            name: String::from(name),
            measurement_unit: String::from(unit),
            amount,
        }
    }

    #[test]
    fn empty_cart_aggregates_to_nothing() {
        assert!(aggregate_shopping_list(vec![]).is_empty());
    }

    #[test]
    fn amounts_sum_per_name_and_unit() {
        let rows = aggregate_shopping_list(vec![row("Salt", "g", 5), row("Salt", "g", 10)]);

        assert_eq!(
            rows,
            vec![ShoppingListRow {
                name: String::from("Salt"),
                measurement_unit: String::from("g"),
                total_amount: 15,
            }]
        );
    }

    #[test]
    fn different_units_stay_separate() {
        let rows = aggregate_shopping_list(vec![row("Salt", "g", 5), row("Salt", "tsp", 1)]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement_unit, "g");
        assert_eq!(rows[1].measurement_unit, "tsp");
    }

    #[test]
    fn rows_sort_by_name_case_insensitively() {
        let rows = aggregate_shopping_list(vec![
            row("Zucchini", "pcs", 1),
            row("apple", "pcs", 2),
            row("Banana", "pcs", 3),
        ]);

        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "Banana", "Zucchini"]);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let input = vec![row("Flour", "g", 200), row("Egg", "pcs", 2), row("Flour", "g", 100)];
        assert_eq!(
            aggregate_shopping_list(input.clone()),
            aggregate_shopping_list(input)
        );
    }

    #[test]
    fn document_lines_follow_the_format() {
        let rows = aggregate_shopping_list(vec![
            row("Flour", "g", 200),
            row("Egg", "pcs", 2),
            row("Flour", "g", 100),
        ]);
        let document = render_shopping_list("alice", &rows);

        let content = String::from_utf8(document.bytes).unwrap();
        assert_eq!(
            content,
            format!("{SHOPPING_LIST_HEADER}\n- Egg - 2 pcs\n- Flour - 300 g\n")
        );
        assert_eq!(document.filename, "alice_shopping_list.txt");
    }

    #[test]
    fn empty_cart_renders_the_placeholder() {
        let document = render_shopping_list("alice", &[]);

        let content = String::from_utf8(document.bytes).unwrap();
        assert_eq!(content, format!("{SHOPPING_LIST_HEADER}\n{SHOPPING_LIST_EMPTY}\n"));
    }

    #[test]
    fn attachment_carries_the_download_headers() {
        let document = render_shopping_list("alice", &[]);
        let response = as_attachment(document).unwrap();

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            SHOPPING_LIST_CONTENT_TYPE
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=alice_shopping_list.txt"
        );
    }
}
