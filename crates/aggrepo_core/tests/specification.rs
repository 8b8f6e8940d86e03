mod common;

use aggrepo_core::{Query, RepoError, Repository, SortOrder, Specification};
use common::{line, order, seeded_context, Order};

fn orders() -> Vec<Order> {
    let mut orders: Vec<_> = (1..=8)
        .map(|rank| order(rank, if rank % 2 == 0 { "paid" } else { "open" }))
        .collect();
    orders[2].customer = "ada".to_string();
    orders
}

fn samples() -> Vec<Specification<Order>> {
    vec![
        Specification::any(),
        Specification::field("status").eq("paid"),
        Specification::field("rank").gt(4),
        Specification::field("total").le(30.0),
        Specification::field("customer").ne("ada"),
        Specification::field("discount").is_null(),
        Specification::predicate("rank_is_odd", |order: &Order| order.rank % 2 == 1),
    ]
}

#[test]
fn and_not_equals_left_and_not_right() {
    let orders = orders();
    for left in samples() {
        for right in samples() {
            let combined = left.clone().and_not(right.clone());
            for order in &orders {
                assert_eq!(
                    combined.is_satisfied_by(order),
                    left.is_satisfied_by(order) && !right.is_satisfied_by(order),
                    "left={left:?} right={right:?} rank={}",
                    order.rank
                );
            }
        }
    }
}

#[test]
fn store_filtering_agrees_with_in_memory_evaluation() {
    let orders = orders();
    let context = seeded_context(&orders);
    let repo = context.repository::<Order>();

    let specs = samples();
    let mut combined = Vec::new();
    for left in &specs {
        for right in &specs {
            combined.push(left.clone() & right.clone());
            combined.push(left.clone() | !right.clone());
        }
    }

    for spec in specs.into_iter().chain(combined) {
        let mut expected: Vec<_> = orders
            .iter()
            .filter(|order| spec.is_satisfied_by(order))
            .map(|order| order.id)
            .collect();
        expected.sort();

        let actual: Vec<_> = repo
            .find_all(&Query::matching(spec.clone()))
            .unwrap()
            .into_items()
            .into_iter()
            .map(|order| order.id)
            .collect();

        assert_eq!(actual, expected, "spec={spec:?}");
        assert_eq!(repo.exists(&spec).unwrap(), !expected.is_empty());
    }
}

#[test]
fn comparisons_against_missing_fields_never_match() {
    let orders = orders();
    let context = seeded_context(&orders);
    let repo = context.repository::<Order>();

    for spec in [
        Specification::field("discount").eq(0),
        Specification::field("discount").ne(0),
        Specification::field("discount").lt(100),
    ] {
        assert!(!repo.exists(&spec).unwrap());
    }

    let negated = !Specification::field("discount").eq(0);
    assert_eq!(repo.find_all(&Query::matching(negated)).unwrap().len(), orders.len());
}

fn orders_with_lines() -> Vec<Order> {
    let mut orders: Vec<_> = (1..=4).map(|rank| order(rank, "open")).collect();
    orders[0].lines = Some(vec![line("sku-1", 1)]);
    orders[1].lines = Some(vec![line("sku-2", 3)]);
    orders
}

#[test]
fn relation_fields_cannot_be_filtered_or_sorted_on() {
    let context = seeded_context(&orders_with_lines());
    let repo = context.repository::<Order>();
    let on_lines = Specification::field("lines").is_not_null();

    for query in [
        Query::matching(on_lines.clone()).eager_load("lines"),
        Query::matching(on_lines.clone().and(Specification::predicate("any", |_: &Order| true))),
        Query::all()
            .sort_by("lines", SortOrder::Ascending)
            .page(1, 2),
    ] {
        assert!(matches!(
            repo.find_all(&query),
            Err(RepoError::InvalidOperation(_))
        ));
    }
    assert!(matches!(
        repo.exists(&!on_lines),
        Err(RepoError::InvalidOperation(_))
    ));
}

#[test]
fn eager_loading_does_not_change_which_rows_match() {
    let context = seeded_context(&orders_with_lines());
    let repo = context.repository::<Order>();
    let has_lines = Specification::predicate("has_lines", |order: &Order| order.lines.is_some());

    let lazy = repo.find_all(&Query::matching(has_lines.clone())).unwrap();
    let paged = Query::matching(has_lines)
        .eager_load("lines")
        .sort_by("rank", SortOrder::Ascending)
        .page(1, 10);
    let page = repo.find_all(&paged).unwrap().into_page().unwrap();

    // Predicates see the stored aggregate, without relations.
    assert!(lazy.is_empty());
    assert_eq!(page.total_count(), 0);
    assert!(page.data().is_empty());

    let ranked = Query::matching(Specification::predicate("low_rank", |order: &Order| {
        order.rank <= 3
    }))
    .eager_load("lines")
    .sort_by("rank", SortOrder::Descending)
    .page(1, 2);
    let page = repo.find_all(&ranked).unwrap().into_page().unwrap();

    assert_eq!(page.total_count(), 3);
    assert_eq!(page.page_count(), 2);
    let ranks: Vec<_> = page.data().iter().map(|order| order.rank).collect();
    assert_eq!(ranks, vec![3, 2]);
    assert!(page.data()[0].lines.is_none());
    assert_eq!(page.data()[1].lines.as_ref().unwrap()[0].sku, "sku-2");
}
