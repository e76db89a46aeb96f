use foodshare_sdk::schema::{AmountRow, ShoppingListRow};
use foodshare_sdk::{
    aggregate_shopping_list, render_shopping_list, SHOPPING_LIST_EMPTY, SHOPPING_LIST_HEADER,
};

fn row(name: &str, unit: &str, amount: i32) -> AmountRow {
    AmountRow {
        name: String::from(name),
        measurement_unit: String::from(unit),
        amount,
    }
}

/// Two recipes in the cart, one shared ingredient: the export consolidates
/// the shared ingredient and lists the result alphabetically.
#[test]
fn cart_with_two_recipes_exports_a_consolidated_list() {
    foodshare_sdk::init_logging();

    // Recipe A: Flour 200 g, Egg 2 pcs. Recipe B: Flour 100 g.
    let cart_rows = vec![
        row("Flour", "g", 200),
        row("Egg", "pcs", 2),
        row("Flour", "g", 100),
    ];

    let rows = aggregate_shopping_list(cart_rows);
    assert_eq!(
        rows,
        vec![
            ShoppingListRow {
                name: String::from("Egg"),
                measurement_unit: String::from("pcs"),
                total_amount: 2,
            },
            ShoppingListRow {
                name: String::from("Flour"),
                measurement_unit: String::from("g"),
                total_amount: 300,
            },
        ]
    );

    let document = render_shopping_list("alice", &rows);
    let content = String::from_utf8(document.bytes).unwrap();

    assert_eq!(
        content,
        format!("{SHOPPING_LIST_HEADER}\n- Egg - 2 pcs\n- Flour - 300 g\n")
    );
    assert_eq!(document.filename, "alice_shopping_list.txt");
    assert_eq!(document.content_type, "text/plain; charset=utf-8");
}

#[test]
fn repeated_export_of_the_same_cart_is_identical() {
    let cart_rows = vec![
        row("Zucchini", "pcs", 1),
        row("Apple", "pcs", 2),
        row("Zucchini", "pcs", 4),
    ];

    let first = aggregate_shopping_list(cart_rows.clone());
    let second = aggregate_shopping_list(cart_rows);
    assert_eq!(first, second);

    let names: Vec<&str> = first.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Apple", "Zucchini"]);
}

/// Same ingredient name under two units is two shopping-list lines.
#[test]
fn units_are_part_of_the_grouping_key() {
    let rows = aggregate_shopping_list(vec![
        row("Salt", "g", 5),
        row("Salt", "tsp", 1),
        row("Salt", "g", 10),
    ]);

    assert_eq!(
        rows,
        vec![
            ShoppingListRow {
                name: String::from("Salt"),
                measurement_unit: String::from("g"),
                total_amount: 15,
            },
            ShoppingListRow {
                name: String::from("Salt"),
                measurement_unit: String::from("tsp"),
                total_amount: 1,
            },
        ]
    );
}

/// The empty cart is a handled result: an empty aggregate and a placeholder
/// document, never an error or a partial row.
#[test]
fn empty_cart_renders_the_placeholder_document() {
    let rows = aggregate_shopping_list(vec![]);
    assert!(rows.is_empty());

    let document = render_shopping_list("bob", &rows);
    let content = String::from_utf8(document.bytes).unwrap();

    assert_eq!(content, format!("{SHOPPING_LIST_HEADER}\n{SHOPPING_LIST_EMPTY}\n"));
    assert_eq!(document.filename, "bob_shopping_list.txt");
}
