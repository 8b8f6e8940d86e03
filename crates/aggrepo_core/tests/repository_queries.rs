mod common;

use aggrepo_core::{Query, RepoError, Repository, SortOrder, Specification};
use common::{line, order, seeded_context, Order};

fn ranked_orders(count: i64) -> Vec<Order> {
    // Stored out of rank order so sorting is observable.
    (1..=count)
        .rev()
        .map(|rank| order(rank, if rank % 3 == 0 { "paid" } else { "open" }))
        .collect()
}

fn ranks(orders: &[Order]) -> Vec<i64> {
    orders.iter().map(|order| order.rank).collect()
}

#[test]
fn second_page_of_five_returns_ranks_six_to_ten() {
    let context = seeded_context(&ranked_orders(12));
    let repo = context.repository::<Order>();

    let query = Query::all().sort_by("rank", SortOrder::Ascending).page(2, 5);
    let page = repo.find_all(&query).unwrap().into_page().unwrap();

    assert_eq!(page.total_count(), 12);
    assert_eq!(page.page_count(), 3);
    assert_eq!(page.page_number(), 2);
    assert_eq!(page.page_size(), 5);
    assert_eq!(ranks(page.data()), vec![6, 7, 8, 9, 10]);
}

#[test]
fn paging_respects_filter_and_descending_order() {
    let context = seeded_context(&ranked_orders(12));
    let repo = context.repository::<Order>();

    let query = Query::matching(Specification::field("status").eq("open"))
        .sort_by("rank", SortOrder::Descending)
        .page(1, 3);
    let page = repo.find_all(&query).unwrap().into_page().unwrap();

    assert_eq!(page.total_count(), 8);
    assert_eq!(page.page_count(), 3);
    assert_eq!(ranks(page.data()), vec![11, 10, 8]);
}

#[test]
fn opaque_predicates_page_the_same_way() {
    let context = seeded_context(&ranked_orders(12));
    let repo = context.repository::<Order>();

    let query = Query::matching(Specification::predicate("rank_over_two", |order: &Order| {
        order.rank > 2
    }))
    .sort_by("rank", SortOrder::Ascending)
    .page(2, 4);
    let page = repo.find_all(&query).unwrap().into_page().unwrap();

    assert_eq!(page.total_count(), 10);
    assert_eq!(ranks(page.data()), vec![7, 8, 9, 10]);
}

#[test]
fn unpaged_queries_return_sorted_sequences() {
    let context = seeded_context(&ranked_orders(5));
    let repo = context.repository::<Order>();

    let items = repo
        .find_all(&Query::all().sort_by("rank", SortOrder::Ascending))
        .unwrap()
        .into_items();
    assert_eq!(ranks(&items), vec![1, 2, 3, 4, 5]);

    let unsorted = repo.find_all(&Query::all()).unwrap();
    assert!(unsorted.clone().into_page().is_none());
    assert_eq!(unsorted.len(), 5);
}

#[test]
fn get_all_fails_where_find_all_is_empty() {
    let context = seeded_context(&ranked_orders(4));
    let repo = context.repository::<Order>();
    let nothing = Query::matching(Specification::field("status").eq("refunded"));

    assert!(repo.find_all(&nothing).unwrap().is_empty());
    assert!(matches!(
        repo.get_all(&nothing),
        Err(RepoError::NotFound { kind: "order", id: None })
    ));

    let empty_page = nothing.clone().sort_by("rank", SortOrder::Ascending).page(1, 10);
    let page = repo.find_all(&empty_page).unwrap().into_page().unwrap();
    assert_eq!(page.total_count(), 0);
    assert_eq!(page.page_count(), 0);
    assert!(matches!(
        repo.get_all(&empty_page),
        Err(RepoError::NotFound { .. })
    ));

    assert_eq!(repo.get_all(&Query::all()).unwrap().len(), 4);
}

#[test]
fn paging_without_sort_is_invalid() {
    let context = seeded_context(&ranked_orders(3));
    let repo = context.repository::<Order>();

    for query in [
        Query::all().page(1, 2),
        Query::all().sort_by("rank", SortOrder::Unspecified).page(1, 2),
    ] {
        assert!(matches!(
            repo.find_all(&query),
            Err(RepoError::InvalidOperation(_))
        ));
    }
}

#[test]
fn page_range_is_checked_before_sort() {
    let context = seeded_context(&ranked_orders(3));
    let repo = context.repository::<Order>();

    assert!(matches!(
        repo.find_all(&Query::all().page(0, 2)),
        Err(RepoError::OutOfRange {
            parameter: "page_number",
            value: 0
        })
    ));
    assert!(matches!(
        repo.find_all(&Query::all().sort_by("rank", SortOrder::Ascending).page(1, 0)),
        Err(RepoError::OutOfRange {
            parameter: "page_size",
            ..
        })
    ));
}

#[test]
fn get_and_find_split_on_missing_matches() {
    let context = seeded_context(&ranked_orders(3));
    let repo = context.repository::<Order>();

    let third = repo.get(&Specification::field("rank").eq(3), &[]).unwrap();
    assert_eq!(third.rank, 3);

    let none = Specification::field("rank").gt(100);
    assert!(repo.find(&none, &[]).unwrap().is_none());
    assert!(matches!(
        repo.get(&none, &[]),
        Err(RepoError::NotFound { id: None, .. })
    ));
    assert!(!repo.exists(&none).unwrap());
}

#[test]
fn get_by_key_reports_the_missing_identifier() {
    let context = seeded_context(&[]);
    let repo = context.repository::<Order>();
    let absent = order(1, "open");

    assert!(matches!(
        repo.get_by_key(absent.id),
        Err(RepoError::NotFound { id: Some(id), .. }) if id == absent.id
    ));
}

#[test]
fn relations_load_only_when_requested() {
    let mut with_lines = order(1, "open");
    with_lines.lines = Some(vec![line("sku-1", 2), line("sku-2", 1)]);
    let context = seeded_context(&[with_lines.clone()]);
    let repo = context.repository::<Order>();
    let spec = Specification::field("rank").eq(1);

    let lazy = repo.get(&spec, &[]).unwrap();
    assert!(lazy.lines.is_none());
    assert!(repo.get_by_key(with_lines.id).unwrap().lines.is_none());

    let eager = repo.get(&spec, &["lines"]).unwrap();
    let lines = eager.lines.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].sku, "sku-1");

    let listed = repo
        .find_all(&Query::all().eager_load("lines"))
        .unwrap()
        .into_items();
    assert!(listed[0].lines.is_some());
}

#[test]
fn updating_without_loaded_relations_keeps_them() {
    let mut with_lines = order(1, "open");
    with_lines.lines = Some(vec![line("sku-1", 2)]);
    let context = seeded_context(&[with_lines.clone()]);
    let repo = context.repository::<Order>();

    let mut lazy = repo.get_by_key(with_lines.id).unwrap();
    lazy.status = "paid".to_string();
    repo.update(&lazy).unwrap();
    context.commit().unwrap();

    let reloaded = repo
        .get(&Specification::field("status").eq("paid"), &["lines"])
        .unwrap();
    assert_eq!(reloaded.lines.unwrap().len(), 1);
}

#[test]
fn unknown_relations_and_bad_paths_are_invalid() {
    let context = seeded_context(&ranked_orders(2));
    let repo = context.repository::<Order>();

    assert!(matches!(
        repo.find(&Specification::any(), &["payments"]),
        Err(RepoError::InvalidOperation(_))
    ));
    assert!(matches!(
        repo.find_all(&Query::matching(Specification::field("rank; DROP TABLE").eq(1))),
        Err(RepoError::InvalidOperation(_))
    ));
}
