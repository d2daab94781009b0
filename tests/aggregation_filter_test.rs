use gridcrate::bson::{Bson, doc};
use gridcrate::{
    AggregationFilter, ColumnConfig, Condition, GridCompiler, GridError, GridRequest, Operator,
    PipelineBuilder, Sortation,
};

mod common;
use common::{AggregationDocumentFilter, COLLECTION, ints, setup_store};

async fn fetch(request: GridRequest) -> Result<gridcrate::ResultPage, GridError> {
    let store = setup_store().await;
    AggregationDocumentFilter::new()
        .get_data(&store, &request)
        .await
}

fn single(column: &str, operator: Operator, value: impl Into<Bson>) -> Vec<Vec<Condition>> {
    vec![vec![Condition::new(column, operator, value)]]
}

#[tokio::test]
async fn test_basic_request_shapes_documents() {
    let page = fetch(GridRequest::default()).await.unwrap();

    assert_eq!(page.total, 10);
    assert_eq!(ints(&page.items), (0..10).collect::<Vec<_>>());

    let first = &page.items[0];
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    assert_eq!(keys, ["id", "bool", "date", "float", "int", "string"]);
    assert_eq!(first.get_str("id").unwrap().len(), 24);
    assert_eq!(first.get_str("date").unwrap(), "2024-01-01 00:00:00");
    assert!(first.get_bool("bool").unwrap());
    assert_eq!(page.items[3].get_f64("float").unwrap(), 3.3);
    assert_eq!(page.items[9].get_str("date").unwrap(), "2024-01-10 00:00:00");
}

#[tokio::test]
async fn test_sortations() {
    let page = fetch(GridRequest::default().with_order_by(vec![Sortation::desc("int")]))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);

    let page = fetch(GridRequest::default().with_order_by(vec![Sortation::asc("id")]))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), (0..10).collect::<Vec<_>>());

    // Ties on bool keep insertion order.
    let page = fetch(GridRequest::default().with_order_by(vec![Sortation::desc("bool")]))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [0, 2, 4, 6, 8, 1, 3, 5, 7, 9]);

    let page = fetch(GridRequest::default().with_order_by(vec![
        Sortation::desc("bool"),
        Sortation::desc("float"),
    ]))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [8, 6, 4, 2, 0, 9, 7, 5, 3, 1]);
}

#[tokio::test]
async fn test_sort_callback_does_not_leak_computed_field() {
    let page = fetch(GridRequest::default().with_order_by(vec![Sortation::desc("custom_string")]))
        .await
        .unwrap();

    assert_eq!(page.items[0].get_str("string").unwrap(), "String 9");
    assert!(page.items.iter().all(|item| !item.contains_key("customString")));
}

#[tokio::test]
async fn test_unknown_sortation_column() {
    let err = fetch(GridRequest::default().with_order_by(vec![Sortation::asc("Unknown")]))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Column 'Unknown' cannot be used as sortation! Have you forgotten to add it to 'aggregation_documents' sortations?"
    );
    assert_eq!(err.code(), GridError::MISSING_SORTATION_COLUMN);
}

#[tokio::test]
async fn test_comparison_conditions() {
    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Gte, 8)))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [8, 9]);
    assert_eq!(page.total, 2);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Gt, 8)))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [9]);

    let page = fetch(GridRequest::default().with_filter(single("float", Operator::Lt, 2)))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [0, 1]);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Lte, 1)))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [0, 1]);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Neq, 1)))
        .await
        .unwrap();
    assert_eq!(page.total, 9);
}

#[tokio::test]
async fn test_list_conditions() {
    let values = Bson::Array(vec![6.into(), 7.into(), 8.into()]);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Eq, values.clone())))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [6, 7, 8]);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::In, values.clone())))
        .await
        .unwrap();
    assert_eq!(page.total, 3);

    let page = fetch(GridRequest::default().with_filter(single("int", Operator::Nin, values)))
        .await
        .unwrap();
    assert_eq!(page.total, 7);

    let page = fetch(GridRequest::default().with_filter(single(
        "int",
        Operator::Between,
        Bson::Array(vec![2.into(), 4.into()]),
    )))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [2, 3, 4]);

    let page = fetch(GridRequest::default().with_filter(single(
        "int",
        Operator::NotBetween,
        Bson::Array(vec![2.into(), 7.into()]),
    )))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [0, 1, 2, 7, 8, 9]);
}

#[tokio::test]
async fn test_text_conditions() {
    let page = fetch(GridRequest::default().with_filter(single("string", Operator::Like, "ing 1")))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [1]);

    let page = fetch(GridRequest::default().with_filter(single("string", Operator::Starts, "string")))
        .await
        .unwrap();
    assert_eq!(page.total, 10);

    let page = fetch(GridRequest::default().with_filter(single("string", Operator::Ends, " 5")))
        .await
        .unwrap();
    assert_eq!(ints(&page.items), [5]);

    let page = fetch(GridRequest::default().with_filter(single("string", Operator::Like, ".*")))
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_empty_and_not_empty() {
    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("string", Operator::Empty)]]),
    )
    .await
    .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);

    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("string", Operator::NotEmpty)]]),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 10);

    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("string", Operator::NotEmpty)]])
            .with_additional_filters(vec![vec![Condition::without_value(
                "string",
                Operator::Empty,
            )]]),
    )
    .await
    .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_exist_conditions() {
    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("string2", Operator::NotExist)]]),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 10);

    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("string2", Operator::Exist)]]),
    )
    .await
    .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_or_groups_and_additional_filters() {
    let page = fetch(GridRequest::default().with_filter(vec![vec![
        Condition::new("int", Operator::Eq, 1),
        Condition::new("int", Operator::Eq, 2),
        Condition::new("int", Operator::Eq, 3),
    ]]))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [1, 2, 3]);

    let page = fetch(
        GridRequest::default()
            .with_filter(vec![vec![
                Condition::new("int", Operator::Eq, 1),
                Condition::new("int", Operator::Eq, 2),
            ]])
            .with_additional_filters(single("bool", Operator::Eq, true)),
    )
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [2]);
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_date_condition_strings_are_coerced() {
    let page = fetch(GridRequest::default().with_filter(single(
        "date",
        Operator::Gte,
        "2024-01-08 00:00:00",
    )))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [7, 8, 9]);

    let page = fetch(GridRequest::default().with_filter(single(
        "date",
        Operator::Lt,
        "2024-01-02T00:00:00Z",
    )))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [0]);
}

#[tokio::test]
async fn test_condition_callback() {
    let page = fetch(GridRequest::default().with_filter(single(
        "custom_string",
        Operator::Like,
        "String 3",
    )))
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [3]);

    // The callback compares exactly, so a partial value finds nothing.
    let page = fetch(GridRequest::default().with_filter(single(
        "custom_string",
        Operator::Like,
        "String",
    )))
    .await
    .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_search() {
    let page = fetch(GridRequest::default().with_search("String 9")).await.unwrap();
    assert_eq!(ints(&page.items), [9]);
    assert_eq!(page.total, 1);

    let page = fetch(GridRequest::default().with_search("Unknown")).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);

    let page = fetch(GridRequest::default().with_search("")).await.unwrap();
    assert_eq!(page.total, 10);
}

#[tokio::test]
async fn test_pagination() {
    let page = fetch(
        GridRequest::default()
            .with_order_by(vec![Sortation::asc("int")])
            .with_page(2, 3),
    )
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [3, 4, 5]);
    assert_eq!(page.total, 10);

    let page = fetch(
        GridRequest::default()
            .with_order_by(vec![Sortation::asc("int")])
            .with_page(3, 2),
    )
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [4, 5]);

    let page = fetch(GridRequest::default().with_page(4, 3)).await.unwrap();
    assert_eq!(ints(&page.items), [9]);

    let page = fetch(GridRequest::default().with_page(5, 3)).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 10);
}

#[tokio::test]
async fn test_filtered_total_ignores_pagination() {
    let page = fetch(
        GridRequest::default()
            .with_filter(single("int", Operator::Gte, 4))
            .with_page(1, 2),
    )
    .await
    .unwrap();
    assert_eq!(ints(&page.items), [4, 5]);
    assert_eq!(page.total, 6);
}

#[tokio::test]
async fn test_repeated_request_on_same_store() {
    let store = setup_store().await;
    let resource = AggregationDocumentFilter::new();
    let request = GridRequest::default()
        .with_filter(single("int", Operator::Gte, 2))
        .with_order_by(vec![Sortation::desc("custom_string")])
        .with_search("String")
        .with_page(2, 3);

    let first = resource.get_data(&store, &request).await.unwrap();
    let second = resource.get_data(&store, &request).await.unwrap();

    assert_eq!(ints(&first.items), [6, 5, 4]);
    assert_eq!(first.total, 8);
    assert_eq!(first, second);
    assert!(second.items.iter().all(|item| !item.contains_key("customString")));
}

#[tokio::test]
async fn test_invalid_requests() {
    let err = fetch(GridRequest::default().with_filter(single("Unknown", Operator::Eq, "Unknown")))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Column 'Unknown' cannot be used as condition! Have you forgotten to add it to 'aggregation_documents' conditions?"
    );

    let err = fetch(GridRequest::default().with_filter(vec![vec![Condition {
        column: Some("int".to_string()),
        operator: None,
        value: Some(Bson::Int32(1)),
    }]]))
    .await
    .unwrap_err();
    assert!(matches!(err, GridError::MissingAdvancedFilterRequiredField));

    let err = fetch(
        GridRequest::default()
            .with_filter(vec![vec![Condition::without_value("int", Operator::Eq)]]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, GridError::MissingAdvancedFilterRequiredField));
}

#[tokio::test]
async fn test_search_without_searchable_columns() {
    struct Unsearchable {
        columns: ColumnConfig,
    }

    impl AggregationFilter for Unsearchable {
        const COLLECTION: &'static str = COLLECTION;

        fn columns(&self) -> &ColumnConfig {
            &self.columns
        }
    }

    let store = setup_store().await;
    let resource = Unsearchable {
        columns: ColumnConfig::new(COLLECTION).condition("int", "int"),
    };

    let err = resource
        .get_data(&store, &GridRequest::default().with_search("String"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Column cannot be used for searching! Have you forgotten to add searchable columns to 'aggregation_documents'?"
    );
}

/// Groups documents by `bool`, so the total must come from the count pipeline.
struct GroupedFilter {
    columns: ColumnConfig,
}

impl GroupedFilter {
    fn group_stage() -> gridcrate::bson::Document {
        doc! { "$group": { "_id": "$bool", "documents": { "$sum": 1 }, "maxInt": { "$max": "$int" } } }
    }
}

impl AggregationFilter for GroupedFilter {
    const COLLECTION: &'static str = COLLECTION;

    fn columns(&self) -> &ColumnConfig {
        &self.columns
    }

    fn configure_pipeline(
        &self,
        builder: &mut PipelineBuilder,
        compiler: &GridCompiler<'_>,
    ) -> Result<(), GridError> {
        compiler.add_conditions(builder)?;
        builder
            .add_stage(Self::group_stage())
            .add_stage(doc! { "$sort": { "_id": 1 } });
        compiler.add_pagination(builder);
        Ok(())
    }

    fn configure_count_pipeline(
        &self,
        builder: &mut PipelineBuilder,
        compiler: &GridCompiler<'_>,
    ) -> Result<(), GridError> {
        compiler.add_conditions(builder)?;
        builder.add_stage(Self::group_stage());
        Ok(())
    }
}

#[tokio::test]
async fn test_group_pipeline_counts_groups() {
    let store = setup_store().await;
    let resource = GroupedFilter {
        columns: ColumnConfig::new(COLLECTION).condition("int", "int"),
    };

    let page = resource.get_data(&store, &GridRequest::default()).await.unwrap();
    assert_eq!(
        page.items,
        vec![
            doc! { "_id": false, "documents": 5, "maxInt": 9 },
            doc! { "_id": true, "documents": 5, "maxInt": 8 },
        ]
    );
    assert_eq!(page.total, 2);

    let page = resource
        .get_data(
            &store,
            &GridRequest::default().with_filter(single("int", Operator::Gte, 9)),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}
