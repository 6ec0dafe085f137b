use docmodel::{memory::InMemoryStore, prelude::*};

#[derive(Entity)]
#[entity(collection = "test_items")]
struct Item;

async fn ints(values: ValueStream<Bson>) -> Vec<i32> {
    values.map_ok(|value| value.as_i32().unwrap()).try_collect().await.unwrap()
}

fn sorted(mut values: Vec<i32>) -> Vec<i32> {
    values.sort();
    values
}

async fn manager() -> Manager<Item> {
    let connections = Connections::new().with_backend("default", InMemoryStore::new());
    register::<Item>(&connections).await.unwrap()
}

/// Thirty items with `id` 1..=30 and `number` = id % 10.
async fn seeded() -> Manager<Item> {
    let items = manager().await;
    for x in 1..=30 {
        items.create(doc! { "id": x, "number": x % 10 }).await.unwrap();
    }
    items
}

#[tokio::test]
async fn test_count() {
    let items = seeded().await;

    assert_eq!(items.all().count().await.unwrap(), 30);
    assert_eq!(items.count(doc! { "number": 0 }).await.unwrap(), 3);
}

#[tokio::test]
async fn test_count_ignores_window_and_ordering() {
    let items = seeded().await;
    let query_set = items.filter(doc! { "number__in": [1, 2] }).order_by(["-id"]);

    assert_eq!(query_set.count().await.unwrap(), 6);
    assert_eq!(query_set.slice(..2).count().await.unwrap(), 6);
    assert_eq!(query_set.slice(..2).fetch().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pluck() {
    let items = seeded().await;

    assert_eq!(sorted(ints(items.all().pluck("id")).await), (1..=30).collect::<Vec<_>>());

    let mut numbers = ints(items.all().pluck("number")).await;
    numbers.sort();
    let mut expected = (0..10).chain(0..10).chain(0..10).collect::<Vec<_>>();
    expected.sort();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn test_pluck_missing_field_is_null() {
    let items = manager().await;
    items.create(doc! { "title": "Slayer" }).await.unwrap();

    assert_eq!(items.all().pluck("year").try_collect::<Vec<_>>().await.unwrap(), vec![Bson::Null]);
}

#[tokio::test]
async fn test_pluck_is_lazy_and_repeatable() {
    let items = manager().await;
    let query_set = items.all().order_by(["id"]);

    let ids = query_set.pluck("id");
    let rows = query_set.pluck_fields(&["id", "title"]);
    items.create(doc! { "id": 1, "title": "Slayer" }).await.unwrap();

    assert_eq!(ints(ids).await, vec![1]);
    assert_eq!(
        rows.try_collect::<Vec<_>>().await.unwrap(),
        vec![vec![Bson::Int32(1), Bson::from("Slayer")]],
    );

    items.create(doc! { "id": 2, "title": "Sabaton" }).await.unwrap();
    assert_eq!(ints(query_set.pluck("id")).await, vec![1, 2]);
}

#[tokio::test]
async fn test_pluck_with_multiple_fields() {
    let items = seeded().await;
    let rows = items
        .all()
        .order_by(["id"])
        .slice(..3)
        .pluck_fields(&["id", "number"])
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            vec![Bson::Int32(1), Bson::Int32(1)],
            vec![Bson::Int32(2), Bson::Int32(2)],
            vec![Bson::Int32(3), Bson::Int32(3)],
        ],
    );
}

#[tokio::test]
async fn test_filter_document() {
    let items = manager().await;
    let query_set = items.filter(doc! { "slug__in": ["foo", "bar"], "tag": "baz" });

    assert_eq!(
        query_set.filter_document().unwrap(),
        doc! { "slug": { "$in": ["foo", "bar"] }, "tag": "baz" },
    );
}

#[tokio::test]
async fn test_filter() {
    let items = seeded().await;

    assert_eq!(ints(items.filter(doc! { "id": 10 }).pluck("id")).await, vec![10]);
    assert_eq!(ints(items.filter(doc! { "number": 0, "id": 10 }).pluck("id")).await, vec![10]);
    assert_eq!(sorted(ints(items.filter(doc! { "number": 0 }).pluck("id")).await), vec![10, 20, 30]);
}

#[tokio::test]
async fn test_filter_in() {
    let items = seeded().await;

    assert_eq!(
        sorted(ints(items.filter(doc! { "id__in": [1, 3, 20, 40] }).pluck("id")).await),
        vec![1, 3, 20],
    );
    assert_eq!(
        sorted(ints(items.filter(doc! { "number__in": [0, 1] }).pluck("id")).await),
        vec![1, 10, 11, 20, 21, 30],
    );
    assert_eq!(
        sorted(ints(items.filter(doc! { "number__in": [1, 0] }).pluck("id")).await),
        vec![1, 10, 11, 20, 21, 30],
    );
}

#[tokio::test]
async fn test_relational_lookups() {
    let items = seeded().await;
    let ids = items
        .filter(doc! { "id__gt": 25 })
        .filter(doc! { "id__lte": 28 })
        .order_by(["id"])
        .pluck("id");

    assert_eq!(ints(ids).await, vec![26, 27, 28]);
    assert_eq!(items.count(doc! { "id__gte": 30 }).await.unwrap(), 1);
    assert_eq!(items.count(doc! { "id__lt": 1 }).await.unwrap(), 0);
}

#[tokio::test]
async fn test_filter_contains() {
    let items = manager().await;
    for title in ["Slayer", "Sabaton", "Metallica", "Metal Foobar", "Tristania"] {
        items.create(doc! { "title": title }).await.unwrap();
    }

    let titles = |filters: Document| {
        let query_set = items.filter(filters).order_by(["title"]);
        async move {
            query_set
                .pluck("title")
                .try_collect::<Vec<_>>()
                .await
                .unwrap()
                .into_iter()
                .map(|title| title.as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        }
    };

    assert!(titles(doc! { "title__contains": "metal" }).await.is_empty());
    assert_eq!(titles(doc! { "title__contains": "Metal" }).await, vec!["Metal Foobar", "Metallica"]);
    assert_eq!(titles(doc! { "title__icontains": "metal" }).await, vec!["Metal Foobar", "Metallica"]);
    assert_eq!(
        titles(doc! { "title__icontains": "ta" }).await,
        vec!["Metal Foobar", "Metallica", "Tristania"],
    );
}

#[tokio::test]
async fn test_filters_accumulate_without_touching_the_receiver() {
    let items = manager().await;
    let query_set = items.all();

    let with_ch = query_set.filter(doc! { "ch": "a" });
    assert_eq!(with_ch.filters(), &doc! { "ch": "a" });

    let with_number = with_ch.filter(doc! { "number": 2 });
    assert_eq!(with_number.filters(), &doc! { "ch": "a", "number": 2 });

    assert_eq!(with_ch.filters(), &doc! { "ch": "a" });
    assert!(query_set.filters().is_empty());
}

#[tokio::test]
async fn test_chained_filters_equal_merged_filters() {
    let items = manager().await;
    for (id, ch, number) in [(101, "a", 1), (102, "a", 1), (103, "a", 2), (104, "b", 1), (105, "b", 2)] {
        items.create(doc! { "id": id, "ch": ch, "number": number }).await.unwrap();
    }

    let chained = items.filter(doc! { "number": 1 }).filter(doc! { "ch": "a" });
    let merged = items.filter(doc! { "number": 1, "ch": "a" });

    assert_eq!(sorted(ints(chained.pluck("id")).await), vec![101, 102]);
    assert_eq!(sorted(ints(merged.pluck("id")).await), vec![101, 102]);
    assert_eq!(
        ints(items.filter(doc! { "number": 2 }).filter(doc! { "ch": "b" }).pluck("id")).await,
        vec![105],
    );
}

#[tokio::test]
async fn test_order_by() {
    let items = seeded().await;

    assert_eq!(ints(items.all().order_by(["id"]).pluck("id")).await, (1..=30).collect::<Vec<_>>());
    assert_eq!(
        ints(items.all().order_by(["-id"]).pluck("id")).await,
        (1..=30).rev().collect::<Vec<_>>(),
    );
}

#[tokio::test]
async fn test_order_by_multiple_keys() {
    let items = seeded().await;
    let ids = items
        .filter(doc! { "number__in": [1, 2] })
        .order_by(["number", "-id"])
        .pluck("id");

    assert_eq!(ints(ids).await, vec![21, 11, 1, 22, 12, 2]);
}

#[tokio::test]
async fn test_order_by_keeps_first_direction() {
    let items = seeded().await;
    let query_set = items.all().order_by(["id"]).order_by(["-id"]);

    assert_eq!(query_set.sort_document(), doc! { "id": 1 });
    assert_eq!(ints(query_set.slice(..3).pluck("id")).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_slices() {
    let items = seeded().await;
    let ordered = items.all().order_by(["id"]);

    assert_eq!(ints(ordered.slice(28..).pluck("id")).await, vec![29, 30]);
    assert_eq!(ints(ordered.slice(..5).pluck("id")).await, vec![1, 2, 3, 4, 5]);
    assert_eq!(ints(ordered.slice(11..15).pluck("id")).await, vec![12, 13, 14, 15]);
    assert_eq!(ints(ordered.slice(10..15).pluck("id")).await, vec![11, 12, 13, 14, 15]);
}

#[tokio::test]
async fn test_slices_compose() {
    let items = seeded().await;
    let window = items.all().order_by(["id"]).slice(10..20).slice(2..5);

    assert_eq!(window.offset(), Some(12));
    assert_eq!(window.limit(), Some(3));
    assert_eq!(ints(window.pluck("id")).await, vec![13, 14, 15]);

    let clipped = items.all().order_by(["id"]).slice(..4).slice(2..10);
    assert_eq!(ints(clipped.pluck("id")).await, vec![3, 4]);
}

#[tokio::test]
async fn test_empty_slice_yields_nothing() {
    let items = seeded().await;

    assert!(items.all().slice(5..5).fetch().await.unwrap().is_empty());
    assert!(items.all().slice(100..).fetch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slice_agrees_with_full_list() {
    let items = seeded().await;
    let ordered = items.all().order_by(["-number", "id"]);

    let all = ordered.pluck("id").try_collect::<Vec<_>>().await.unwrap();
    let window = ordered.slice(7..19).pluck("id").try_collect::<Vec<_>>().await.unwrap();

    assert_eq!(window, all[7..19].to_vec());
}

#[tokio::test]
async fn test_nth() {
    let items = seeded().await;
    let ordered = items.all().order_by(["id"]);

    assert_eq!(ordered.nth(0).await.unwrap().get("id"), Some(&Bson::Int32(1)));
    assert_eq!(ordered.first().await.unwrap().get("id"), Some(&Bson::Int32(1)));
    assert_eq!(ordered.nth(29).await.unwrap().get("id"), Some(&Bson::Int32(30)));
    assert_eq!(ordered.slice(10..).nth(2).await.unwrap().get("id"), Some(&Bson::Int32(13)));
}

#[tokio::test]
async fn test_nth_out_of_range() {
    let items = seeded().await;

    assert!(matches!(
        items.all().nth(30).await,
        Err(DocumentStoreError::IndexOutOfRange(30)),
    ));
    assert!(matches!(
        items.all().slice(..2).nth(2).await,
        Err(DocumentStoreError::IndexOutOfRange(2)),
    ));
}

#[tokio::test]
async fn test_iteration() {
    let items = seeded().await;
    let entities = items
        .all()
        .order_by(["id"])
        .slice(..2)
        .iter()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].get("id"), Some(&Bson::Int32(1)));
    assert_eq!(entities[1].get("id"), Some(&Bson::Int32(2)));
    assert!(entities.iter().all(Entity::is_saved));
}

#[tokio::test]
async fn test_iteration_is_lazy_and_repeatable() {
    let items = manager().await;
    let query_set = items.all().order_by(["id"]);

    let stream = query_set.iter();
    items.create(doc! { "id": 1 }).await.unwrap();

    assert_eq!(stream.try_collect::<Vec<_>>().await.unwrap().len(), 1);

    items.create(doc! { "id": 2 }).await.unwrap();
    assert_eq!(query_set.fetch().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_combined_filter_order_slice() {
    let items = seeded().await;
    let query_set = items.filter(doc! { "number": 2 }).order_by(["id"]).slice(..2);

    assert_eq!(ints(query_set.pluck("id")).await, vec![2, 12]);
}

#[tokio::test]
async fn test_get() {
    let items = seeded().await;
    let query_set = items.all().order_by(["id"]);

    assert_eq!(query_set.get(doc! { "id": 2 }).await.unwrap().get("id"), Some(&Bson::Int32(2)));
}

#[tokio::test]
async fn test_get_multiple_items_returned() {
    let items = seeded().await;

    match items.all().get(doc! { "number": 2 }).await {
        Err(DocumentStoreError::MultipleItemsReturned { entity, filters, count }) => {
            assert_eq!(entity, "Item");
            assert_eq!(filters, doc! { "number": 2 });
            assert_eq!(count, 3);
        }
        other => panic!("expected MultipleItemsReturned, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_does_not_exist() {
    let items = seeded().await;

    assert!(matches!(
        items.all().get(doc! { "id": 301 }).await,
        Err(DocumentStoreError::DoesNotExist { entity: "Item", .. }),
    ));
}

#[tokio::test]
async fn test_get_respects_previous_filters() {
    let items = seeded().await;

    assert!(matches!(
        items.filter(doc! { "number": 3 }).get(doc! { "id": 4 }).await,
        Err(DocumentStoreError::DoesNotExist { .. }),
    ));
    assert_eq!(
        items.filter(doc! { "number": 3 }).get(doc! { "id": 13 }).await.unwrap().get("id"),
        Some(&Bson::Int32(13)),
    );
}
